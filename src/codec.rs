//! Text encryption/decryption using AES-CBC with a password-derived key
//!
//! Encrypted text is the standard base64 encoding of:
//!
//! - iv: 16 bytes, then a zero byte
//! - salt: variable length (64 random bytes by default), then a zero byte
//! - ciphertext: AES-CBC with PKCS#7 padding, key from [`kdf::derive_key`]
//!
//! Legacy files are the base64 of the ciphertext alone, encrypted with the
//! fixed IV [`LEGACY_IV`] and a salt taken from configuration. Decrypting
//! them requires the caller's [`LegacyPrompt`] to agree. Input whose first
//! field is not exactly 16 bytes is treated as legacy.
//!
//! The codec performs no I/O beyond asking that prompt, keeps no state
//! between calls and never logs.

use crate::cbc::{self, BLOCK_LEN};
use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use crate::header::{EncryptionHeader, strip_header};
use crate::kdf;
use crate::params::{CodecParams, ascii_bytes};
use crate::prompt::LegacyPrompt;
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use rand::rngs::OsRng;

/// IV used by files written before the metadata header existed.
pub const LEGACY_IV: &[u8; BLOCK_LEN] = b"16CHARSLONG12345";

/// Length of a generated salt in bytes.
pub const RANDOM_SALT_LEN: usize = 64;

/// Which layout the decrypted input turned out to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// IV and salt were read from the metadata header.
    Framed,
    /// No header; the legacy IV and fallback salt were used.
    Legacy,
}

/// Result of a decryption that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decrypted {
    Text { plaintext: String, format: Format },
    /// The input was empty; there was nothing to decrypt.
    Empty,
    /// The input had no header and the prompt declined the legacy path.
    Cancelled,
}

impl Decrypted {
    /// The plaintext, if decryption produced any.
    pub fn into_plaintext(self) -> Option<String> {
        match self {
            Decrypted::Text { plaintext, .. } => Some(plaintext),
            Decrypted::Empty | Decrypted::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Decrypted::Cancelled)
    }
}

/// `len` random bytes from the OS generator, none of them zero.
///
/// Zero bytes would terminate a header field early.
fn random_nonzero_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    for byte in bytes.iter_mut() {
        while *byte == 0 {
            let mut replacement = [0u8; 1];
            OsRng.fill_bytes(&mut replacement);
            *byte = replacement[0];
        }
    }
    bytes
}

/// Encrypt `plaintext` with `password`, returning base64 text.
///
/// Empty plaintext encrypts to the empty string. The salt is the ASCII form
/// of `params.salt`, or 64 random bytes when that is unset or empty. A fresh
/// random IV is generated on every call.
pub fn encrypt(plaintext: &str, password: &str, params: &CodecParams) -> Result<String> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }

    let salt = match params.explicit_salt() {
        Some(salt) => ascii_bytes(salt),
        None => random_nonzero_bytes(RANDOM_SALT_LEN),
    };

    let iv: [u8; BLOCK_LEN] = random_nonzero_bytes(BLOCK_LEN)
        .try_into()
        .map_err(|_| {
            NotecryptError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "generated IV has the wrong length",
            )
        })?;

    encrypt_deterministic(plaintext, password, params, &salt, &iv)
}

/// Encrypt with a caller-provided salt and IV.
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates a
/// random IV. Unlike `encrypt()`, empty plaintext still produces a padded block.
pub fn encrypt_deterministic(
    plaintext: &str,
    password: &str,
    params: &CodecParams,
    salt: &[u8],
    iv: &[u8; BLOCK_LEN],
) -> Result<String> {
    let header = EncryptionHeader::new(iv.to_vec(), salt.to_vec());
    if !header.is_representable() {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::BinaryFormat,
            "salt and IV must not contain zero bytes",
        ));
    }

    let key = kdf::derive_key(
        password,
        salt,
        params.hash_algorithm,
        params.iterations,
        params.key_size.bytes(),
    )?;
    let ciphertext = cbc::encrypt(&key, iv, plaintext.as_bytes())?;

    let mut output = Vec::with_capacity(header.encoded_len() + ciphertext.len());
    output.extend_from_slice(&header.encode());
    output.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(output))
}

/// Decode base64 text, ignoring ASCII whitespace such as a trailing newline.
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Base64Decode,
            format!("base64 decoding failed: {}", e),
            e,
        )
    })
}

/// Decrypt base64 text produced by [`encrypt`] or by the legacy format.
///
/// Input that is empty (or only whitespace) yields [`Decrypted::Empty`].
/// Input without a metadata header goes through `prompt`; if it declines the
/// result is [`Decrypted::Cancelled`]. An incorrect password surfaces as an
/// error of kind [`ErrorKind::WrongKey`], never as garbage text.
pub fn decrypt(
    text: &str,
    password: &str,
    params: &CodecParams,
    prompt: &mut dyn LegacyPrompt,
) -> Result<Decrypted> {
    if text.trim().is_empty() {
        return Ok(Decrypted::Empty);
    }

    let raw = decode_base64(text)?;

    // A header only counts when its IV field is exactly one block. Legacy
    // ciphertext routinely contains stray zero bytes that parse as fields.
    let framed = EncryptionHeader::decode(&raw).and_then(|(header, offset)| {
        let iv: [u8; BLOCK_LEN] = header.iv.as_slice().try_into().ok()?;
        Some((iv, header.salt, offset))
    });

    let (iv, salt, payload, format) = match framed {
        Some((iv, salt, offset)) => (iv, salt, strip_header(&raw, offset), Format::Framed),
        None => {
            if !prompt.confirm_legacy()? {
                return Ok(Decrypted::Cancelled);
            }
            (
                *LEGACY_IV,
                ascii_bytes(&params.fallback_salt),
                raw,
                Format::Legacy,
            )
        }
    };

    let key = kdf::derive_key(
        password,
        &salt,
        params.hash_algorithm,
        params.iterations,
        params.key_size.bytes(),
    )?;
    let plaintext = cbc::decrypt(&key, &iv, &payload)?;

    let plaintext = std::str::from_utf8(&plaintext).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::WrongKey,
            "decrypted data is not UTF-8 text; incorrect key or corrupt data",
            e,
        )
    })?;

    Ok(Decrypted::Text {
        plaintext: plaintext.to_owned(),
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{HashAlgorithm, KeySize};
    use crate::prompt::{AlwaysAccept, AlwaysDecline};

    fn decrypt_text(text: &str, password: &str, params: &CodecParams) -> Result<Decrypted> {
        decrypt(text, password, params, &mut AlwaysDecline)
    }

    /// Ciphertext in the pre-header layout: no IV or salt embedded.
    fn legacy_encrypt(plaintext: &str, password: &str, salt: &str) -> String {
        let params = CodecParams::default();
        let key = kdf::derive_key(
            password,
            &ascii_bytes(salt),
            params.hash_algorithm,
            params.iterations,
            params.key_size.bytes(),
        )
        .unwrap();
        STANDARD.encode(cbc::encrypt(&key, LEGACY_IV, plaintext.as_bytes()).unwrap())
    }

    #[test]
    fn test_hello_world() {
        let params = CodecParams::default();
        let encrypted = encrypt("hello world", "pw123", &params).unwrap();

        let decrypted = decrypt_text(&encrypted, "pw123", &params).unwrap();
        assert_eq!(
            decrypted,
            Decrypted::Text {
                plaintext: "hello world".to_string(),
                format: Format::Framed,
            }
        );

        let err = decrypt_text(&encrypted, "wrongpw", &params).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::WrongKey));
    }

    #[test]
    fn test_empty_input() {
        let params = CodecParams::default();
        assert_eq!(encrypt("", "pw", &params).unwrap(), "");
        assert_eq!(decrypt_text("", "pw", &params).unwrap(), Decrypted::Empty);
        assert_eq!(decrypt_text(" \r\n", "pw", &params).unwrap(), Decrypted::Empty);
    }

    #[test]
    fn test_roundtrip_unicode_and_multiline() {
        let params = CodecParams::default();
        let plaintext = "line one\r\nline two\n\tüñíçødé ✓ 漢字\n";
        let encrypted = encrypt(plaintext, "pässwörd", &params).unwrap();
        let decrypted = decrypt_text(&encrypted, "pässwörd", &params).unwrap();
        assert_eq!(decrypted.into_plaintext().unwrap(), plaintext);
    }

    #[test]
    fn test_roundtrip_all_parameter_combinations() {
        for hash in [
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            for key_size in [KeySize::Bits128, KeySize::Bits192, KeySize::Bits256] {
                let params = CodecParams::default()
                    .with_hash_algorithm(hash)
                    .with_key_size(key_size)
                    .with_iterations(5);
                let encrypted = encrypt("parameter check", "pw", &params).unwrap();
                let decrypted = decrypt_text(&encrypted, "pw", &params).unwrap();
                assert_eq!(decrypted.into_plaintext().unwrap(), "parameter check");
            }
        }
    }

    #[test]
    fn test_fresh_salt_and_iv() {
        let params = CodecParams::default();
        let a = encrypt("same text", "same pw", &params).unwrap();
        let b = encrypt("same text", "same pw", &params).unwrap();
        assert_ne!(a, b);

        let (ha, _) = EncryptionHeader::decode(&decode_base64(&a).unwrap()).unwrap();
        let (hb, _) = EncryptionHeader::decode(&decode_base64(&b).unwrap()).unwrap();
        assert_ne!(ha.iv, hb.iv);
        assert_ne!(ha.salt, hb.salt);
        assert_eq!(ha.iv.len(), BLOCK_LEN);
        assert_eq!(ha.salt.len(), RANDOM_SALT_LEN);
    }

    #[test]
    fn test_explicit_salt_is_embedded() {
        let params = CodecParams::default().with_salt("MySalt");
        let encrypted = encrypt("text", "pw", &params).unwrap();
        let (header, _) = EncryptionHeader::decode(&decode_base64(&encrypted).unwrap()).unwrap();
        assert_eq!(header.salt, b"MySalt");

        // The embedded salt wins over whatever the decrypting side configures.
        let other = CodecParams::default().with_salt("Different");
        let decrypted = decrypt_text(&encrypted, "pw", &other).unwrap();
        assert_eq!(decrypted.into_plaintext().unwrap(), "text");
    }

    #[test]
    fn test_explicit_salt_with_zero_byte_rejected() {
        let params = CodecParams::default().with_salt("bad\0salt");
        let err = encrypt("text", "pw", &params).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
    }

    #[test]
    fn test_parameters_must_match() {
        let params = CodecParams::default();
        let encrypted = encrypt("some longer text to decrypt", "pw", &params).unwrap();
        let other = CodecParams::default().with_hash_algorithm(HashAlgorithm::Sha256);
        let err = decrypt_text(&encrypted, "pw", &other).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::WrongKey));
    }

    #[test]
    fn test_wrong_password_never_returns_text() {
        let params = CodecParams::default();
        let encrypted = encrypt("secret data", "correct", &params).unwrap();
        for i in 0..20 {
            let result = decrypt_text(&encrypted, &format!("wrong{}", i), &params);
            match result {
                Err(e) => assert!(e.is_wrong_key()),
                Ok(d) => assert_ne!(d.into_plaintext().as_deref(), Some("secret data")),
            }
        }
    }

    #[test]
    fn test_deterministic_encryption() {
        let params = CodecParams::default();
        let salt = [0x42u8; 8];
        let iv = [0x24u8; BLOCK_LEN];
        let ct1 = encrypt_deterministic("hello world", "pw", &params, &salt, &iv).unwrap();
        let ct2 = encrypt_deterministic("hello world", "pw", &params, &salt, &iv).unwrap();
        assert_eq!(ct1, ct2);

        let raw = decode_base64(&ct1).unwrap();
        assert_eq!(&raw[..BLOCK_LEN], &iv);
        assert_eq!(raw[BLOCK_LEN], 0);
        assert_eq!(&raw[BLOCK_LEN + 1..BLOCK_LEN + 9], &salt);
        assert_eq!(raw[BLOCK_LEN + 9], 0);
        assert_eq!(raw.len(), BLOCK_LEN + 10 + BLOCK_LEN);
    }

    #[test]
    fn test_deterministic_rejects_zero_in_iv() {
        let mut iv = [0x24u8; BLOCK_LEN];
        iv[3] = 0;
        let err = encrypt_deterministic("x", "pw", &CodecParams::default(), b"salt", &iv)
            .unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
    }

    #[test]
    fn test_legacy_accepted() {
        let legacy = legacy_encrypt("old file contents", "pw", "Kosher");
        let params = CodecParams::default();
        let decrypted = decrypt(&legacy, "pw", &params, &mut AlwaysAccept).unwrap();
        assert_eq!(
            decrypted,
            Decrypted::Text {
                plaintext: "old file contents".to_string(),
                format: Format::Legacy,
            }
        );
    }

    #[test]
    fn test_legacy_with_configured_fallback_salt() {
        let legacy = legacy_encrypt("old file contents", "pw", "001122AABBCC");
        let params = CodecParams::default().with_fallback_salt("001122AABBCC");
        let decrypted = decrypt(&legacy, "pw", &params, &mut AlwaysAccept).unwrap();
        assert_eq!(decrypted.into_plaintext().unwrap(), "old file contents");
    }

    #[test]
    fn test_legacy_declined() {
        let legacy = legacy_encrypt("old file contents", "pw", "Kosher");
        let decrypted = decrypt_text(&legacy, "pw", &CodecParams::default()).unwrap();
        assert!(decrypted.is_cancelled());
        assert_eq!(decrypted.into_plaintext(), None);
    }

    #[test]
    fn test_prompt_only_asked_for_headerless_input() {
        struct CountingPrompt(usize);

        impl LegacyPrompt for CountingPrompt {
            fn confirm_legacy(&mut self) -> Result<bool> {
                self.0 += 1;
                Ok(true)
            }
        }

        let params = CodecParams::default();
        let mut prompt = CountingPrompt(0);

        let framed = encrypt("framed", "pw", &params).unwrap();
        decrypt(&framed, "pw", &params, &mut prompt).unwrap();
        assert_eq!(prompt.0, 0);

        let legacy = legacy_encrypt("legacy", "pw", "Kosher");
        decrypt(&legacy, "pw", &params, &mut prompt).unwrap();
        assert_eq!(prompt.0, 1);
    }

    #[test]
    fn test_prompt_error_propagates() {
        struct BrokenPrompt;

        impl LegacyPrompt for BrokenPrompt {
            fn confirm_legacy(&mut self) -> Result<bool> {
                Err(NotecryptError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::PromptUnavailable,
                    "simulated",
                ))
            }
        }

        let legacy = legacy_encrypt("legacy", "pw", "Kosher");
        let err = decrypt(&legacy, "pw", &CodecParams::default(), &mut BrokenPrompt).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::PromptUnavailable));
    }

    #[test]
    fn test_malformed_base64() {
        let err = decrypt_text("this is not base64!!", "pw", &CodecParams::default()).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Base64Decode));
        assert_eq!(err.category, ErrorCategory::User);
    }

    #[test]
    fn test_trailing_newline_ignored() {
        let params = CodecParams::default();
        let encrypted = encrypt("saved by the editor", "pw", &params).unwrap();
        let with_newline = format!("{}\r\n", encrypted);
        let decrypted = decrypt_text(&with_newline, "pw", &params).unwrap();
        assert_eq!(decrypted.into_plaintext().unwrap(), "saved by the editor");
    }

    #[test]
    fn test_header_with_short_iv_is_headerless() {
        let mut raw = EncryptionHeader::new(b"short".to_vec(), b"salt".to_vec()).encode();
        raw.extend_from_slice(&[0x11u8; BLOCK_LEN]);
        let decrypted = decrypt_text(&STANDARD.encode(raw), "pw", &CodecParams::default()).unwrap();
        assert_eq!(decrypted, Decrypted::Cancelled);
    }

    #[test]
    fn test_legacy_ciphertext_with_zero_bytes() {
        let legacy = legacy_encrypt("shopping list 78", "pw", "Kosher");
        let raw = decode_base64(&legacy).unwrap();
        assert!(raw.iter().filter(|&&b| b == 0).count() >= 2);
        let (header, _) = EncryptionHeader::decode(&raw).unwrap();
        assert_ne!(header.iv.len(), BLOCK_LEN);

        let params = CodecParams::default();
        let declined = decrypt(&legacy, "pw", &params, &mut AlwaysDecline).unwrap();
        assert_eq!(declined, Decrypted::Cancelled);

        let accepted = decrypt(&legacy, "pw", &params, &mut AlwaysAccept).unwrap();
        assert_eq!(
            accepted,
            Decrypted::Text {
                plaintext: "shopping list 78".to_string(),
                format: Format::Legacy,
            }
        );
    }

    #[test]
    fn test_long_legacy_files_readable() {
        let params = CodecParams::default();
        let mut with_zero_fields = 0;
        for n in 0..100 {
            let body = "a long note written by an old release.".repeat(20);
            let plaintext = format!("{} {}", body, n);
            let legacy = legacy_encrypt(&plaintext, "pw", "Kosher");
            if EncryptionHeader::decode(&decode_base64(&legacy).unwrap()).is_some() {
                with_zero_fields += 1;
            }
            let decrypted = decrypt(&legacy, "pw", &params, &mut AlwaysAccept).unwrap();
            assert_eq!(decrypted.into_plaintext().unwrap(), plaintext);
        }
        assert!(with_zero_fields > 0);
    }

    #[test]
    fn test_truncated_ciphertext() {
        let params = CodecParams::default();
        let encrypted = encrypt("some text", "pw", &params).unwrap();
        let mut raw = decode_base64(&encrypted).unwrap();
        raw.pop();
        let err = decrypt_text(&STANDARD.encode(raw), "pw", &params).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
    }

    #[test]
    fn test_random_nonzero_bytes() {
        for _ in 0..50 {
            let bytes = random_nonzero_bytes(RANDOM_SALT_LEN);
            assert_eq!(bytes.len(), RANDOM_SALT_LEN);
            assert!(!bytes.contains(&0));
        }
    }

    #[test]
    fn test_concurrent_calls() {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                std::thread::spawn(move || {
                    let params = CodecParams::default();
                    let plaintext = format!("thread {}", i);
                    let password = format!("pw{}", i);
                    let encrypted = encrypt(&plaintext, &password, &params).unwrap();
                    let decrypted = decrypt_text(&encrypted, &password, &params).unwrap();
                    assert_eq!(decrypted.into_plaintext().unwrap(), plaintext);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
