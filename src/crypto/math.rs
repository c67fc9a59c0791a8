//! Arbitrary-precision modular arithmetic underlying the cryptosystem.

use num_bigint_dig::prime::probably_prime;
use num_bigint_dig::{BigInt, BigUint, RandPrime, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;

/// Miller-Rabin rounds used when testing candidates
pub const PRIMALITY_ROUNDS: usize = 20;

/// Computes `base^exponent mod modulus`. A zero modulus yields zero.
pub fn mod_pow(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    if modulus.is_zero() {
        return BigUint::zero();
    }
    base.modpow(exponent, modulus)
}

/// Multiplicative inverse of `a` modulo `m` via the extended Euclidean algorithm.
///
/// Returns `None` when `gcd(a, m) != 1`.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    if m.is_zero() {
        return None;
    }
    let modulus = BigInt::from_biguint(Sign::Plus, m.clone());
    let mut old_r = BigInt::from_biguint(Sign::Plus, a % m);
    let mut r = modulus.clone();
    let mut old_s = BigInt::one();
    let mut s = BigInt::zero();

    while !r.is_zero() {
        let q = &old_r / &r;
        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    if !old_r.is_one() {
        return None;
    }
    old_s.mod_floor(&modulus).to_biguint()
}

pub fn gcd(a: &BigUint, b: &BigUint) -> BigUint {
    a.gcd(b)
}

/// Probabilistic primality test
pub fn is_probable_prime(candidate: &BigUint) -> bool {
    probably_prime(candidate, PRIMALITY_ROUNDS)
}

/// Draws a random probable prime of exactly `bits` bits.
pub fn random_prime<R: Rng + ?Sized>(rng: &mut R, bits: usize) -> BigUint {
    rng.gen_prime(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn test_mod_pow_small_values() {
        assert_eq!(mod_pow(&big(4), &big(13), &big(497)), big(445));
        assert_eq!(mod_pow(&big(7), &big(0), &big(13)), big(1));
        assert_eq!(mod_pow(&big(7), &big(3), &big(0)), big(0));
    }

    #[test]
    fn test_mod_inverse() {
        assert_eq!(mod_inverse(&big(3), &big(11)), Some(big(4)));
        assert_eq!(mod_inverse(&big(17), &big(3120)), Some(big(2753)));
        assert_eq!(mod_inverse(&big(6), &big(9)), None);
    }

    #[test]
    fn test_mod_inverse_reduces_large_input() {
        // 14 = 3 mod 11
        assert_eq!(mod_inverse(&big(14), &big(11)), Some(big(4)));
    }

    #[test]
    fn test_primality() {
        assert!(is_probable_prime(&big(65537)));
        assert!(is_probable_prime(&big(1_000_000_007)));
        assert!(!is_probable_prime(&big(561))); // Carmichael number
        assert!(!is_probable_prime(&big(1_000_000_008)));
    }

    #[test]
    fn test_random_prime_has_requested_size() {
        let mut rng = thread_rng();
        let p = random_prime(&mut rng, 64);
        assert_eq!(p.bits(), 64);
        assert!(is_probable_prime(&p));
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(&big(48), &big(18)), big(6));
        assert_eq!(gcd(&big(17), &big(3120)), big(1));
    }
}
