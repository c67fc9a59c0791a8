//! Cryptography module for the chat service
//!
//! This module provides:
//! - Modular arithmetic over arbitrary-precision integers
//! - Key pair generation (two random primes, fixed public exponent)
//! - Block encoding and string encryption/decryption
//!
//! Encryption binds no sender identity; trust decisions belong to the
//! authentication protocol.

pub mod cipher;
mod keys;
pub mod math;

pub use cipher::{decrypt, encrypt, Ciphertext};
pub use keys::{KeyPair, PublicKey, DEFAULT_KEY_BITS, MAX_KEY_BITS, MIN_KEY_BITS};
