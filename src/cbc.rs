//! AES in CBC mode with PKCS#7 padding
//!
//! Key length selects AES-128, AES-192 or AES-256. The IV is always one
//! block.

use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256, Block as AesBlock};
use zeroize::Zeroizing;

/// AES block length in bytes.
pub const BLOCK_LEN: usize = 16;

enum AesCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesCipher {
    fn new(key: &[u8]) -> Result<Self> {
        let cipher = match key.len() {
            16 => Aes128::new_from_slice(key).map(AesCipher::Aes128),
            24 => Aes192::new_from_slice(key).map(AesCipher::Aes192),
            32 => Aes256::new_from_slice(key).map(AesCipher::Aes256),
            n => {
                return Err(NotecryptError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::InvalidKeySize,
                    format!("AES key must be 16, 24 or 32 bytes, got {}", n),
                ));
            }
        };
        cipher.map_err(|e| {
            NotecryptError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                format!("failed to initialize AES: {}", e),
            )
        })
    }

    fn encrypt_block(&self, block: &mut AesBlock) {
        match self {
            AesCipher::Aes128(c) => c.encrypt_block(block),
            AesCipher::Aes192(c) => c.encrypt_block(block),
            AesCipher::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut AesBlock) {
        match self {
            AesCipher::Aes128(c) => c.decrypt_block(block),
            AesCipher::Aes192(c) => c.decrypt_block(block),
            AesCipher::Aes256(c) => c.decrypt_block(block),
        }
    }
}

fn xor_in_place(block: &mut [u8], other: &[u8]) {
    for (b, o) in block.iter_mut().zip(other) {
        *b ^= o;
    }
}

/// Encrypt `plaintext`, padding the last block with PKCS#7.
///
/// The output is always a whole number of blocks and at least one block long.
pub fn encrypt(key: &[u8], iv: &[u8; BLOCK_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = AesCipher::new(key)?;

    let pad = BLOCK_LEN - plaintext.len() % BLOCK_LEN;
    let mut padded = Zeroizing::new(Vec::with_capacity(plaintext.len() + pad));
    padded.extend_from_slice(plaintext);
    padded.resize(plaintext.len() + pad, pad as u8);

    let mut output = Vec::with_capacity(padded.len());
    let mut prev_block = *iv;
    for chunk in padded.chunks_exact(BLOCK_LEN) {
        let mut block = AesBlock::clone_from_slice(chunk);
        xor_in_place(&mut block, &prev_block);
        cipher.encrypt_block(&mut block);
        prev_block.copy_from_slice(&block);
        output.extend_from_slice(&block);
    }

    Ok(output)
}

/// Decrypt `ciphertext` and remove its PKCS#7 padding.
///
/// The returned buffer holds exactly the plaintext bytes produced. A padding
/// mismatch is reported as `WrongKey`: with CBC that is what an incorrect key
/// looks like.
pub fn decrypt(key: &[u8], iv: &[u8; BLOCK_LEN], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::BinaryFormat,
            format!(
                "ciphertext length {} is not a positive multiple of {}",
                ciphertext.len(),
                BLOCK_LEN
            ),
        ));
    }

    let cipher = AesCipher::new(key)?;

    let mut output = Zeroizing::new(Vec::with_capacity(ciphertext.len()));
    let mut prev_block = *iv;
    for chunk in ciphertext.chunks_exact(BLOCK_LEN) {
        let mut block = AesBlock::clone_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        xor_in_place(&mut block, &prev_block);
        prev_block.copy_from_slice(chunk);
        output.extend_from_slice(&block);
    }

    let pad = output[output.len() - 1] as usize;
    let valid_padding = (1..=BLOCK_LEN).contains(&pad)
        && output[output.len() - pad..]
            .iter()
            .all(|&b| b as usize == pad);
    if !valid_padding {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::WrongKey,
            "padding is invalid; incorrect key or corrupt data",
        ));
    }

    let produced = output.len() - pad;
    output.truncate(produced);
    Ok(output)
}
