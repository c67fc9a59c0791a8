//! # cipherchat
//!
//! Multi-user text chat secured end to end by a self-contained public-key
//! cryptosystem.
//!
//! ```text
//! Peer                                   Service
//!   |<------- exponent, modulus (clear) ----|
//!   |-------- exponent, modulus (clear) --->|
//!   |-------- enc(name), enc(password) ---->|
//!   |<------- enc(LOGIN_ACCEPTED | ...) ----|
//!   |<======= encrypted chat lines ========>|
//! ```
//!
//! The service decrypts all traffic with one fixed key pair and encrypts each
//! outgoing line with the recipient's own public key.

pub mod client;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod network;
pub mod server;
pub mod ui;

pub use client::ChatClient;
pub use credentials::CredentialStore;
pub use crypto::{KeyPair, PublicKey};
pub use error::{ChatError, ChatResult};
pub use network::{ChatServer, LoginResponse};
pub use server::{AdminOperations, ServiceState, SessionRegistry};
