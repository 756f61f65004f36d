//! notecrypt - password-based text encryption for Crypto Notepad `.cnp` files
//!
//! Text is encrypted with AES-CBC under a key derived from a password and a
//! salt, prefixed by a small header carrying the IV and salt, and stored as
//! base64. See [`codec`] for the format and [`params`] for the (weak, but
//! compatibility-bound) defaults.

#![forbid(unsafe_code)]

pub mod cbc;
pub mod codec;
pub mod error;
pub mod file_ops;
pub mod header;
pub mod kdf;
pub mod params;
pub mod passphrase;
pub mod prompt;
pub mod session;

pub use codec::{Decrypted, Format, decrypt, encrypt};
pub use error::{ErrorCategory, ErrorKind, NotecryptError, Result};
pub use params::{CodecParams, HashAlgorithm, KeySize};
