//! String-level encryption over numeric blocks.
//!
//! Block policy: plaintext is taken as UTF-8 bytes and cut into chunks of
//! `block_payload_len(n)` bytes. Each chunk is prefixed with a `0x01` sentinel
//! byte and read as a big-endian integer, so the block value is always below
//! `2^(bits(n) - 1)` and therefore below `n`. The sentinel keeps leading zero
//! bytes intact. Encrypted blocks travel as decimal integers separated by a
//! single space; the empty string encrypts to the empty line.

use std::fmt;

use num_bigint_dig::BigUint;

use super::math;
use crate::error::{ChatError, ChatResult};

/// Smallest modulus that leaves room for one payload byte after the sentinel
pub const MIN_MODULUS_BITS: usize = 17;

const BLOCK_SENTINEL: u8 = 0x01;
const BLOCK_DELIMITER: char = ' ';

/// Payload bytes carried by a single block under `modulus`.
pub fn block_payload_len(modulus: &BigUint) -> usize {
    (modulus.bits().saturating_sub(1) / 8).saturating_sub(1)
}

/// Ordered encrypted blocks, each strictly below the encrypting modulus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    blocks: Vec<BigUint>,
}

impl Ciphertext {
    pub fn blocks(&self) -> &[BigUint] {
        &self.blocks
    }

    /// Parse a transport line, rejecting any block that is not below `modulus`
    pub fn parse(line: &str, modulus: &BigUint) -> ChatResult<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Ok(Self { blocks: Vec::new() });
        }

        let mut blocks = Vec::new();
        for (index, token) in line.split(BLOCK_DELIMITER).enumerate() {
            if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ChatError::CryptoDecode(format!(
                    "block {} is not a decimal integer",
                    index
                )));
            }
            let value = token
                .parse::<BigUint>()
                .map_err(|e| ChatError::CryptoDecode(format!("block {}: {}", index, e)))?;
            if &value >= modulus {
                return Err(ChatError::CryptoDecode(format!(
                    "block {} is not below the modulus",
                    index
                )));
            }
            blocks.push(value);
        }
        Ok(Self { blocks })
    }
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", BLOCK_DELIMITER)?;
            }
            write!(f, "{}", block)?;
        }
        Ok(())
    }
}

fn check_modulus(modulus: &BigUint) -> ChatResult<usize> {
    let payload = block_payload_len(modulus);
    if modulus.bits() < MIN_MODULUS_BITS || payload == 0 {
        return Err(ChatError::Encryption(format!(
            "modulus of {} bits is too small for the block policy",
            modulus.bits()
        )));
    }
    Ok(payload)
}

/// Encrypt into structured ciphertext
pub fn encrypt_blocks(plaintext: &str, exponent: &BigUint, modulus: &BigUint) -> ChatResult<Ciphertext> {
    let payload = check_modulus(modulus)?;

    let blocks = plaintext
        .as_bytes()
        .chunks(payload)
        .map(|chunk| {
            let mut bytes = Vec::with_capacity(chunk.len() + 1);
            bytes.push(BLOCK_SENTINEL);
            bytes.extend_from_slice(chunk);
            let block = BigUint::from_bytes_be(&bytes);
            math::mod_pow(&block, exponent, modulus)
        })
        .collect();

    Ok(Ciphertext { blocks })
}

/// Encrypt `plaintext` under (`exponent`, `modulus`) into one transport line
pub fn encrypt(plaintext: &str, exponent: &BigUint, modulus: &BigUint) -> ChatResult<String> {
    Ok(encrypt_blocks(plaintext, exponent, modulus)?.to_string())
}

/// Decrypt one transport line with the private exponent
pub fn decrypt(ciphertext_line: &str, private_exponent: &BigUint, modulus: &BigUint) -> ChatResult<String> {
    let ciphertext = Ciphertext::parse(ciphertext_line, modulus)?;
    decrypt_blocks(&ciphertext, private_exponent, modulus)
}

fn decrypt_blocks(ciphertext: &Ciphertext, private_exponent: &BigUint, modulus: &BigUint) -> ChatResult<String> {
    let mut plaintext = Vec::new();

    for (index, block) in ciphertext.blocks.iter().enumerate() {
        let bytes = math::mod_pow(block, private_exponent, modulus).to_bytes_be();
        match bytes.split_first() {
            Some((&BLOCK_SENTINEL, payload)) if !payload.is_empty() => {
                plaintext.extend_from_slice(payload);
            }
            _ => {
                return Err(ChatError::CryptoDecode(format!(
                    "block {} has no valid sentinel",
                    index
                )));
            }
        }
    }

    Ok(String::from_utf8(plaintext)?)
}
