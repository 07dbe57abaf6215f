//! Credential generation and the minimum-entropy policy.

use super::service::SecretString;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use std::collections::HashSet;

pub const DEFAULT_SECRET_LENGTH: usize = 32;

/// Generated and user-supplied secrets must reach this estimate.
pub const MIN_ENTROPY_BITS: f64 = 96.0;

/// Draws alphanumeric secrets from the operating system CSPRNG.
#[derive(Debug, Clone)]
pub struct SecretGenerator {
    length: usize,
}

impl Default for SecretGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_SECRET_LENGTH,
        }
    }
}

impl SecretGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn generate(&self) -> SecretString {
        let value: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        SecretString::new(value)
    }
}

/// Estimated entropy as length times log2 of the character pool implied by
/// the classes present. A value made of one repeated character scores zero.
pub fn estimate_entropy_bits(value: &str) -> f64 {
    let distinct: HashSet<char> = value.chars().collect();
    if distinct.len() <= 1 {
        return 0.0;
    }

    let mut pool = 0u32;
    if value.chars().any(|c| c.is_ascii_lowercase()) {
        pool += 26;
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        pool += 26;
    }
    if value.chars().any(|c| c.is_ascii_digit()) {
        pool += 10;
    }
    if value.chars().any(|c| c.is_ascii_punctuation() || c == ' ') {
        pool += 33;
    }
    if value.chars().any(|c| !c.is_ascii()) {
        pool += 64;
    }

    value.chars().count() as f64 * f64::from(pool).log2()
}

pub fn meets_entropy_policy(secret: &SecretString) -> bool {
    estimate_entropy_bits(secret.expose()) >= MIN_ENTROPY_BITS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_secrets_meet_policy() {
        let generator = SecretGenerator::default();
        let a = generator.generate();
        let b = generator.generate();

        assert_eq!(a.expose().len(), DEFAULT_SECRET_LENGTH);
        assert!(a.expose().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
        assert!(meets_entropy_policy(&a));
    }

    #[test]
    fn test_weak_values_fail_policy() {
        assert!(!meets_entropy_policy(&SecretString::new("")));
        assert!(!meets_entropy_policy(&SecretString::new("password")));
        assert!(!meets_entropy_policy(&SecretString::new("hunter2hunter2")));
        assert_eq!(estimate_entropy_bits(&"a".repeat(64)), 0.0);
    }

    #[test]
    fn test_entropy_estimate() {
        // 20 lowercase + digit characters: 20 * log2(36)
        let bits = estimate_entropy_bits("abcdefghij0123456789");
        assert!((bits - 20.0 * 36f64.log2()).abs() < 1e-9);
    }
}
