//! Codec parameters
//!
//! The defaults (SHA-1, two iterations) are weak. They are kept because every
//! existing `.cnp` file was written with them and changing a default would
//! make those files unreadable with default settings. Callers that control
//! both ends should raise `iterations` and pick a SHA-2 hash.

use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use std::fmt;
use std::str::FromStr;

/// Salt used on decrypt when a file has no header.
pub const DEFAULT_FALLBACK_SALT: &str = "Kosher";

/// Default key derivation stretch count.
pub const DEFAULT_ITERATIONS: u32 = 2;

/// Hash driving the key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    Md5,
    #[default]
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha384 => "SHA384",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = NotecryptError;

    /// Accepts .NET-style names ("SHA", "SHA256", "sha-512"), case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "MD5" => Ok(HashAlgorithm::Md5),
            "SHA" | "SHA1" => Ok(HashAlgorithm::Sha1),
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA384" => Ok(HashAlgorithm::Sha384),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            _ => Err(NotecryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::UnsupportedHashAlgorithm,
                format!("unsupported hash algorithm: {:?}", s),
            )),
        }
    }
}

/// AES key length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySize {
    Bits128,
    Bits192,
    #[default]
    Bits256,
}

impl KeySize {
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            128 => Ok(KeySize::Bits128),
            192 => Ok(KeySize::Bits192),
            256 => Ok(KeySize::Bits256),
            _ => Err(NotecryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidKeySize,
                format!("key size must be 128, 192 or 256 bits, got {}", bits),
            )),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            KeySize::Bits128 => 128,
            KeySize::Bits192 => 192,
            KeySize::Bits256 => 256,
        }
    }

    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

/// Everything besides the password that encrypt and decrypt need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecParams {
    /// Salt text for encryption. `None` or empty means 64 random bytes.
    pub salt: Option<String>,
    /// Salt text used when decrypting a headerless (legacy) file.
    pub fallback_salt: String,
    pub hash_algorithm: HashAlgorithm,
    pub iterations: u32,
    pub key_size: KeySize,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            salt: None,
            fallback_salt: DEFAULT_FALLBACK_SALT.to_string(),
            hash_algorithm: HashAlgorithm::default(),
            iterations: DEFAULT_ITERATIONS,
            key_size: KeySize::default(),
        }
    }
}

impl CodecParams {
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn with_fallback_salt(mut self, salt: impl Into<String>) -> Self {
        self.fallback_salt = salt.into();
        self
    }

    pub fn with_hash_algorithm(mut self, hash_algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = hash_algorithm;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_key_size(mut self, key_size: KeySize) -> Self {
        self.key_size = key_size;
        self
    }

    /// The explicit encryption salt, if one is set and non-empty.
    pub fn explicit_salt(&self) -> Option<&str> {
        self.salt.as_deref().filter(|s| !s.is_empty())
    }
}

/// Bytes of `text` with every non-ASCII character replaced by `?`.
///
/// Salts in existing files were produced this way, so the substitution must
/// be reproduced exactly.
pub fn ascii_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}
