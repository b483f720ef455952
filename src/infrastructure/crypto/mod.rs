//! Cryptographic helpers for credential secrets

mod key_codec;

pub use key_codec::{GeneratedKey, KeyCodec, DEFAULT_PREFIX, ENCRYPTION_VERSION};
