//! One-way hashing of credential secrets

use sha2::{Digest, Sha256};

/// SHA-256 of the secret, lowercase hex
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recompute the hash of `secret` and compare it with `digest` in constant time.
///
/// Empty inputs never verify.
pub fn verify_secret(secret: &str, digest: &str) -> bool {
    if secret.is_empty() || digest.is_empty() {
        return false;
    }

    constant_time_eq(hash_secret(secret).as_bytes(), digest.as_bytes())
}

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;

    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_lowercase_hex() {
        let digest = hash_secret("gk-abc");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_hash_known_vector() {
        assert_eq!(
            hash_secret("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash_secret("gk-test123"), hash_secret("gk-test123"));
    }

    #[test]
    fn test_verify_secret() {
        let digest = hash_secret("gk-secret");
        assert!(verify_secret("gk-secret", &digest));
        assert!(!verify_secret("gk-secreT", &digest));
        assert!(!verify_secret("", &digest));
        assert!(!verify_secret("gk-secret", ""));
    }

    #[test]
    fn test_single_bit_mutations_fail() {
        let secret = "gk-Zm9vYmFyYmF6cXV4";
        let digest = hash_secret(secret);
        let bytes = secret.as_bytes();

        for i in 0..bytes.len() {
            for bit in 0..7 {
                let mut mutated = bytes.to_vec();
                mutated[i] ^= 1 << bit;
                // stays ASCII since only the low seven bits are flipped
                let mutated = String::from_utf8(mutated).unwrap();
                assert!(!verify_secret(&mutated, &digest), "mutation at {}:{}", i, bit);
            }
        }
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
    }
}
