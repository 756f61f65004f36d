//! Metadata header preceding the cipher stream
//!
//! The header is two fields, each terminated by a single zero byte:
//!
//! ```text
//! [iv bytes] 0x00 [salt bytes] 0x00 [ciphertext bytes]
//! ```
//!
//! There are no length prefixes and no checksum. A field containing a zero
//! byte cannot be represented: it would be cut short at that byte when read
//! back. Files produced before this header existed carry no header at all,
//! and a missing header is indistinguishable from a malformed one.

/// Field terminator.
const TERMINATOR: u8 = 0x00;

/// The metadata needed to decrypt the payload that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionHeader {
    pub iv: Vec<u8>,
    pub salt: Vec<u8>,
}

impl EncryptionHeader {
    pub fn new(iv: impl Into<Vec<u8>>, salt: impl Into<Vec<u8>>) -> Self {
        Self {
            iv: iv.into(),
            salt: salt.into(),
        }
    }

    /// Whether both fields survive an encode/decode cycle unchanged.
    pub fn is_representable(&self) -> bool {
        !self.iv.contains(&TERMINATOR) && !self.salt.contains(&TERMINATOR)
    }

    /// Number of bytes `encode` produces.
    pub fn encoded_len(&self) -> usize {
        self.iv.len() + self.salt.len() + 2
    }

    /// Serialize as `iv || 0x00 || salt || 0x00`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.iv);
        out.push(TERMINATOR);
        out.extend_from_slice(&self.salt);
        out.push(TERMINATOR);
        out
    }

    /// Parse a header from the front of `raw`.
    ///
    /// Returns the header together with the offset of the first payload byte,
    /// or `None` if either terminator is missing.
    pub fn decode(raw: &[u8]) -> Option<(Self, usize)> {
        let (iv, after_iv) = read_field(raw, 0)?;
        let (salt, offset) = read_field(raw, after_iv)?;
        Some((Self::new(iv, salt), offset))
    }
}

/// Read bytes from `offset` up to the next terminator.
///
/// Returns the field and the offset just past its terminator.
fn read_field(raw: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    let rest = raw.get(offset..)?;
    let len = rest.iter().position(|&b| b == TERMINATOR)?;
    Some((&rest[..len], offset + len + 1))
}

/// Copy of `raw` with the first `offset` bytes removed.
pub fn strip_header(raw: &[u8], offset: usize) -> Vec<u8> {
    raw.get(offset..).unwrap_or_default().to_vec()
}
