//! Password-based key derivation
//!
//! This is PBKDF1 with the output extension used by .NET's
//! `PasswordDeriveBytes`, which is what existing `.cnp` files were written
//! with:
//!
//! - `base = H(password || salt)`, then hashed again `iterations - 2` times
//! - block 0 is `H(base)`, block n is `H(decimal(n) || base)`
//! - blocks are concatenated and cut to the key length
//!
//! The first block is plain PBKDF1. Everything beyond the hash output length
//! is non-standard and only kept for compatibility.

use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use crate::params::HashAlgorithm;
use digest::Digest;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

/// Highest block counter the extension can encode (three decimal digits).
const MAX_BLOCK_COUNTER: u32 = 999;

/// Derive `key_len` bytes from a password and salt.
///
/// The password is hashed as UTF-8.
pub fn derive_key(
    password: &str,
    salt: &[u8],
    hash_algorithm: HashAlgorithm,
    iterations: u32,
    key_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    if iterations == 0 {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidIterations,
            "key derivation iterations must be at least 1",
        ));
    }

    let password = password.as_bytes();
    match hash_algorithm {
        HashAlgorithm::Md5 => derive::<Md5>(password, salt, iterations, key_len),
        HashAlgorithm::Sha1 => derive::<Sha1>(password, salt, iterations, key_len),
        HashAlgorithm::Sha256 => derive::<Sha256>(password, salt, iterations, key_len),
        HashAlgorithm::Sha384 => derive::<Sha384>(password, salt, iterations, key_len),
        HashAlgorithm::Sha512 => derive::<Sha512>(password, salt, iterations, key_len),
    }
}

fn derive<D: Digest>(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    key_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let mut hasher = D::new();
    hasher.update(password);
    hasher.update(salt);
    let mut base = Zeroizing::new(hasher.finalize().to_vec());

    for _ in 2..iterations {
        base = Zeroizing::new(D::digest(base.as_slice()).to_vec());
    }

    let block_len = <D as Digest>::output_size();
    let mut key = Zeroizing::new(Vec::with_capacity(key_len + block_len));
    let mut counter = 0u32;
    while key.len() < key_len {
        if counter > MAX_BLOCK_COUNTER {
            return Err(NotecryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidKeySize,
                format!("cannot derive {} bytes with this hash", key_len),
            ));
        }

        let mut hasher = D::new();
        if counter > 0 {
            hasher.update(counter.to_string().as_bytes());
        }
        hasher.update(base.as_slice());
        key.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    key.truncate(key_len);

    Ok(key)
}
