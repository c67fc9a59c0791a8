use std::fmt;

use num_bigint_dig::BigUint;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand::Rng;
use tracing::debug;
use zeroize::Zeroize;

use super::math;
use crate::error::{ChatError, ChatResult};

/// Fixed public exponent tried first for every candidate modulus
pub const DEFAULT_PUBLIC_EXPONENT: u64 = 65_537;

/// Prime pairs drawn before key generation gives up
pub const MAX_KEYGEN_ATTEMPTS: usize = 32;

pub const MIN_KEY_BITS: usize = 32;
pub const MAX_KEY_BITS: usize = 8192;
pub const DEFAULT_KEY_BITS: usize = 1024;

// Decimal digits of the largest MAX_KEY_BITS-bit integer
const MAX_KEY_DIGITS: usize = MAX_KEY_BITS * 30_103 / 100_000 + 1;

/// The shareable half of a key pair: exponent and modulus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub exponent: BigUint,
    pub modulus: BigUint,
}

impl PublicKey {
    pub fn new(exponent: BigUint, modulus: BigUint) -> Self {
        Self { exponent, modulus }
    }

    /// Parse the two cleartext handshake fields (decimal exponent, decimal modulus).
    ///
    /// The modulus must fit in `MAX_KEY_BITS` and the exponent must be below it,
    /// otherwise every line sent to this peer costs unbounded work.
    pub fn from_decimal(exponent: &str, modulus: &str) -> ChatResult<Self> {
        let exponent = parse_decimal(exponent, "public exponent")?;
        let modulus = parse_decimal(modulus, "modulus")?;

        if exponent.is_zero() {
            return Err(ChatError::Protocol("public exponent must be non-zero".to_string()));
        }
        if modulus.bits() < super::cipher::MIN_MODULUS_BITS {
            return Err(ChatError::Protocol(format!(
                "modulus too small: {} bits",
                modulus.bits()
            )));
        }
        if modulus.bits() > MAX_KEY_BITS {
            return Err(ChatError::Protocol(format!(
                "modulus too large: {} bits, limit {}",
                modulus.bits(),
                MAX_KEY_BITS
            )));
        }
        if exponent >= modulus {
            return Err(ChatError::Protocol("public exponent must be below the modulus".to_string()));
        }
        Ok(Self { exponent, modulus })
    }

    /// Encrypt a string for the holder of the matching private key
    pub fn encrypt(&self, plaintext: &str) -> ChatResult<String> {
        super::cipher::encrypt(plaintext, &self.exponent, &self.modulus)
    }
}

fn parse_decimal(field: &str, what: &str) -> ChatResult<BigUint> {
    let trimmed = field.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ChatError::Protocol(format!("{} is not a decimal integer: {:?}", what, field)));
    }
    if trimmed.len() > MAX_KEY_DIGITS {
        return Err(ChatError::Protocol(format!("{} has {} digits, limit {}", what, trimmed.len(), MAX_KEY_DIGITS)));
    }
    trimmed
        .parse::<BigUint>()
        .map_err(|e| ChatError::Protocol(format!("{}: {}", what, e)))
}

/// Asymmetric key pair. The private exponent is wiped when the pair is dropped.
pub struct KeyPair {
    public: PublicKey,
    private_exponent: BigUint,
}

impl KeyPair {
    /// Generate a key pair whose modulus has `bits` bits, using the OS RNG
    pub fn generate(bits: usize) -> ChatResult<Self> {
        Self::generate_with(&mut OsRng, bits)
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, bits: usize) -> ChatResult<Self> {
        if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&bits) {
            return Err(ChatError::KeyGeneration(format!(
                "key size {} outside [{}, {}]",
                bits, MIN_KEY_BITS, MAX_KEY_BITS
            )));
        }

        let half = bits / 2;
        let exponent = BigUint::from(DEFAULT_PUBLIC_EXPONENT);

        for attempt in 1..=MAX_KEYGEN_ATTEMPTS {
            let p = math::random_prime(rng, half);
            let q = math::random_prime(rng, bits - half);
            if p == q {
                continue;
            }

            let phi = (&p - BigUint::one()) * (&q - BigUint::one());
            if exponent >= phi || !math::gcd(&exponent, &phi).is_one() {
                debug!(attempt, "public exponent not coprime with totient, resampling");
                continue;
            }

            if let Some(private_exponent) = math::mod_inverse(&exponent, &phi) {
                let modulus = p * q;
                debug!(bits = modulus.bits(), attempt, "generated key pair");
                return Ok(Self {
                    public: PublicKey::new(exponent, modulus),
                    private_exponent,
                });
            }
        }

        Err(ChatError::KeyGeneration(format!(
            "no usable public exponent after {} attempts",
            MAX_KEYGEN_ATTEMPTS
        )))
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn public_exponent(&self) -> &BigUint {
        &self.public.exponent
    }

    pub fn modulus(&self) -> &BigUint {
        &self.public.modulus
    }

    pub fn private_exponent(&self) -> &BigUint {
        &self.private_exponent
    }

    /// Decrypt a ciphertext line produced under this pair's public key
    pub fn decrypt(&self, ciphertext_line: &str) -> ChatResult<String> {
        super::cipher::decrypt(ciphertext_line, &self.private_exponent, &self.public.modulus)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private_exponent", &"<redacted>")
            .finish()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.private_exponent.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_pair_satisfies_key_invariant() {
        let pair = KeyPair::generate(256).unwrap();
        assert_eq!(pair.modulus().bits(), 256);

        // m^(e*d) == m (mod n) for a few messages
        for m in [2u64, 42, 65_535, 1_234_567] {
            let m = BigUint::from(m);
            let c = math::mod_pow(&m, pair.public_exponent(), pair.modulus());
            let back = math::mod_pow(&c, pair.private_exponent(), pair.modulus());
            assert_eq!(back, m);
        }
    }

    #[test]
    fn test_generate_rejects_out_of_range_sizes() {
        assert!(matches!(KeyPair::generate(8), Err(ChatError::KeyGeneration(_))));
        assert!(matches!(KeyPair::generate(MAX_KEY_BITS + 1), Err(ChatError::KeyGeneration(_))));
    }

    #[test]
    fn test_two_pairs_differ() {
        let a = KeyPair::generate(128).unwrap();
        let b = KeyPair::generate(128).unwrap();
        assert_ne!(a.modulus(), b.modulus());
    }

    #[test]
    fn test_public_key_from_decimal() {
        let key = PublicKey::from_decimal("65537", " 3233000017 ").unwrap();
        assert_eq!(key.exponent, BigUint::from(65_537u32));
        assert_eq!(key.modulus, BigUint::from(3_233_000_017u64));

        assert!(matches!(PublicKey::from_decimal("abc", "3233000017"), Err(ChatError::Protocol(_))));
        assert!(matches!(PublicKey::from_decimal("17", ""), Err(ChatError::Protocol(_))));
        assert!(matches!(PublicKey::from_decimal("-17", "3233000017"), Err(ChatError::Protocol(_))));
        assert!(matches!(PublicKey::from_decimal("0", "3233000017"), Err(ChatError::Protocol(_))));
        assert!(matches!(PublicKey::from_decimal("17", "3233"), Err(ChatError::Protocol(_))));
    }

    #[test]
    fn test_public_key_from_decimal_bounds_peer_key_size() {
        // 30000 digits is far past any modulus we would generate
        let huge = "9".repeat(30_000);
        assert!(matches!(PublicKey::from_decimal("65537", &huge), Err(ChatError::Protocol(_))));
        assert!(matches!(PublicKey::from_decimal(&"7".repeat(30_000), &huge), Err(ChatError::Protocol(_))));

        // 2^8192 parses within the digit limit but has one bit too many
        let just_over = (BigUint::one() << MAX_KEY_BITS).to_string();
        assert!(just_over.len() <= MAX_KEY_DIGITS);
        assert!(matches!(PublicKey::from_decimal("65537", &just_over), Err(ChatError::Protocol(_))));

        let largest = ((BigUint::one() << MAX_KEY_BITS) - BigUint::one()).to_string();
        let key = PublicKey::from_decimal("65537", &largest).unwrap();
        assert_eq!(key.modulus.bits(), MAX_KEY_BITS);

        // Exponent at or above the modulus
        assert!(matches!(PublicKey::from_decimal("3233000017", "3233000017"), Err(ChatError::Protocol(_))));
        assert!(matches!(PublicKey::from_decimal("99999999999", "3233000017"), Err(ChatError::Protocol(_))));
    }

    #[test]
    fn test_generated_key_survives_handshake_parse() {
        let pair = KeyPair::generate(256).unwrap();
        let parsed = PublicKey::from_decimal(&pair.public_exponent().to_string(), &pair.modulus().to_string()).unwrap();
        assert_eq!(&parsed, pair.public_key());
    }

    #[test]
    fn test_debug_hides_private_exponent() {
        let pair = KeyPair::generate(64).unwrap();
        let rendered = format!("{:?}", pair);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&pair.private_exponent().to_string()));
    }
}
