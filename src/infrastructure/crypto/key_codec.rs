//! API key generation, hashing and owner-scoped encryption

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::domain::credential::{hash_secret, verify_secret};
use crate::domain::CryptoError;

/// Version tag of the encrypted form
pub const ENCRYPTION_VERSION: &str = "v1";

/// Prefix used when none is supplied
pub const DEFAULT_PREFIX: &str = "gk";

const SECRET_BYTES: usize = 32;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const DISPLAY_CHARS: usize = 8;

/// Result of generating a new API key
#[derive(Clone)]
pub struct GeneratedKey {
    /// The full secret (only shown once at creation)
    pub secret: String,
    /// Non-secret leading characters for display
    pub display_prefix: String,
    /// Hex SHA-256 digest for storage
    pub hash: String,
}

impl std::fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("secret", &"[hidden]")
            .field("display_prefix", &self.display_prefix)
            .field("hash", &self.hash)
            .finish()
    }
}

impl Drop for GeneratedKey {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Generates, hashes and encrypts API key secrets
#[derive(Clone)]
pub struct KeyCodec {
    pepper: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for KeyCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCodec")
            .field("pepper", &"[hidden]")
            .finish()
    }
}

impl KeyCodec {
    /// Create a codec with the application-wide pepper
    pub fn new(pepper: impl AsRef<[u8]>) -> Self {
        Self {
            pepper: Zeroizing::new(pepper.as_ref().to_vec()),
        }
    }

    /// Trim trailing separators and end with exactly one `-`
    pub fn normalize_prefix(prefix: &str) -> String {
        let trimmed = prefix.trim().trim_end_matches(['-', '_']);

        if trimmed.is_empty() {
            format!("{}-", DEFAULT_PREFIX)
        } else {
            format!("{}-", trimmed)
        }
    }

    /// Normalized prefix a display prefix was generated with
    pub fn base_prefix(display_prefix: &str) -> String {
        let cut = display_prefix.len().saturating_sub(DISPLAY_CHARS);
        Self::normalize_prefix(display_prefix.get(..cut).unwrap_or_default())
    }

    /// Generate a new secret with 256 bits of entropy
    pub fn generate(&self, prefix: &str) -> GeneratedKey {
        let mut random_bytes = Zeroizing::new([0u8; SECRET_BYTES]);
        OsRng.fill_bytes(&mut *random_bytes);

        let encoded = Zeroizing::new(URL_SAFE_NO_PAD.encode(*random_bytes));
        let normalized = Self::normalize_prefix(prefix);
        let secret = format!("{}{}", normalized, encoded.as_str());

        let display_prefix = format!(
            "{}{}",
            normalized,
            &encoded[..DISPLAY_CHARS.min(encoded.len())]
        );
        let hash = self.hash(&secret);

        GeneratedKey {
            secret,
            display_prefix,
            hash,
        }
    }

    /// Wrap an operator-supplied secret as if it had been generated.
    ///
    /// The display prefix never covers more than half of the secret.
    pub fn adopt(&self, secret: &str) -> GeneratedKey {
        let start = secret.find('-').map(|i| i + 1).unwrap_or(0);
        let end = (start + DISPLAY_CHARS).min(secret.len() / 2);

        GeneratedKey {
            secret: secret.to_string(),
            display_prefix: secret.get(..end).unwrap_or_default().to_string(),
            hash: self.hash(secret),
        }
    }

    /// Hash a secret for storage
    pub fn hash(&self, secret: &str) -> String {
        hash_secret(secret)
    }

    /// Verify a secret against a stored digest in constant time
    pub fn verify(&self, secret: &str, digest: &str) -> bool {
        verify_secret(secret, digest)
    }

    /// Encrypt a secret so that only `owner_id` can recover it.
    ///
    /// Output: `v1:salt:iv:ciphertext:tag`, each field base64. A fresh salt
    /// and IV per call make the output non-deterministic.
    pub fn encrypt(&self, secret: &str, owner_id: &str) -> Result<String, CryptoError> {
        if secret.is_empty() {
            return Err(CryptoError::EmptyInput("secret"));
        }
        if owner_id.is_empty() {
            return Err(CryptoError::EmptyInput("owner id"));
        }

        let mut salt = Zeroizing::new([0u8; SALT_LEN]);
        OsRng.fill_bytes(&mut *salt);

        let mut iv = Zeroizing::new([0u8; IV_LEN]);
        OsRng.fill_bytes(&mut *iv);

        let key = self.derive_key(owner_id, &*salt);
        let cipher = Aes256Gcm::new_from_slice(&*key)
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;

        let plaintext = Zeroizing::new(secret.as_bytes().to_vec());
        let mut sealed = cipher
            .encrypt(Nonce::from_slice(&*iv), plaintext.as_slice())
            .map_err(|_| CryptoError::Cipher("encryption failed".to_string()))?;

        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}:{}:{}:{}:{}",
            ENCRYPTION_VERSION,
            STANDARD.encode(*salt),
            STANDARD.encode(*iv),
            STANDARD.encode(&sealed),
            STANDARD.encode(&tag)
        ))
    }

    /// Recover a secret encrypted for `owner_id`
    pub fn decrypt(&self, encrypted: &str, owner_id: &str) -> Result<Zeroizing<String>, CryptoError> {
        if encrypted.is_empty() {
            return Err(CryptoError::EmptyInput("encrypted form"));
        }
        if owner_id.is_empty() {
            return Err(CryptoError::EmptyInput("owner id"));
        }

        let fields: Vec<&str> = encrypted.split(':').collect();

        if fields.len() != 5 {
            return Err(CryptoError::Malformed(format!(
                "expected 5 fields, got {}",
                fields.len()
            )));
        }

        if fields[0] != ENCRYPTION_VERSION {
            return Err(CryptoError::UnsupportedVersion(fields[0].to_string()));
        }

        let salt = Zeroizing::new(decode_field("salt", fields[1], Some(SALT_LEN))?);
        let iv = Zeroizing::new(decode_field("iv", fields[2], Some(IV_LEN))?);
        let ciphertext = decode_field("ciphertext", fields[3], None)?;
        let tag = decode_field("tag", fields[4], Some(TAG_LEN))?;

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let key = self.derive_key(owner_id, &salt);
        let cipher = Aes256Gcm::new_from_slice(&*key)
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;

        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
                .map_err(|_| CryptoError::TagMismatch)?,
        );

        let secret = std::str::from_utf8(&plaintext)
            .map_err(|_| CryptoError::Malformed("plaintext is not UTF-8".to_string()))?;

        Ok(Zeroizing::new(secret.to_string()))
    }

    /// `SHA-256(owner_id || pepper || salt)`
    fn derive_key(&self, owner_id: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
        let mut hasher = Sha256::new();
        hasher.update(owner_id.as_bytes());
        hasher.update(self.pepper.as_slice());
        hasher.update(salt);

        let mut digest = hasher.finalize();
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&digest);
        digest.as_mut_slice().zeroize();

        key
    }
}

fn decode_field(name: &str, value: &str, expected_len: Option<usize>) -> Result<Vec<u8>, CryptoError> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|_| CryptoError::Malformed(format!("{} is not valid base64", name)))?;

    if let Some(len) = expected_len {
        if bytes.len() != len {
            return Err(CryptoError::Malformed(format!(
                "{} must be {} bytes, got {}",
                name,
                len,
                bytes.len()
            )));
        }
    }

    Ok(bytes)
}
