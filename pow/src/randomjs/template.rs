//! Block template
//!
//! Opaque byte buffer carrying a little-endian 32-bit nonce at a fixed
//! offset. The nonce field is the only part the miner ever interprets.

use core::fmt;

use crate::randomjs::error::TemplateError;

/// Size of a hashing blob in bytes
pub const BLOCK_TEMPLATE_SIZE: usize = 76;

/// Offset of the nonce field
pub const NONCE_OFFSET: usize = 39;

/// Size of the nonce field in bytes
pub const NONCE_SIZE: usize = 4;

/// Sample hashing blob with a zero nonce
pub const DEFAULT_TEMPLATE: [u8; BLOCK_TEMPLATE_SIZE] = [
    0x07, 0x07, 0xf7, 0xa4, 0xf0, 0xd6, 0x05, 0xb3, 0x03, 0x26, 0x08, 0x16,
    0xba, 0x3f, 0x10, 0x90, 0x2e, 0x1a, 0x14, 0x5a, 0xc5, 0xfa, 0xd3, 0xaa,
    0x3a, 0xf6, 0xea, 0x44, 0xc1, 0x18, 0x69, 0xdc, 0x4f, 0x85, 0x3f, 0x00,
    0x2b, 0x2e, 0xea, 0x00, 0x00, 0x00, 0x00, 0x77, 0xb2, 0x06, 0xa0, 0x2c,
    0xa5, 0xb1, 0xd4, 0xce, 0x6b, 0xbf, 0xdf, 0x0a, 0xca, 0xc3, 0x8b, 0xde,
    0xd3, 0x4d, 0x2d, 0xcd, 0xee, 0xf9, 0x5c, 0xd2, 0x0c, 0xef, 0xc1, 0x2f,
    0x61, 0xd5, 0x61, 0x09,
];

/// Block buffer with a nonce field
#[derive(Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    bytes: Vec<u8>,
    nonce_offset: usize,
}

impl Default for BlockTemplate {
    fn default() -> Self {
        Self {
            bytes: DEFAULT_TEMPLATE.to_vec(),
            nonce_offset: NONCE_OFFSET,
        }
    }
}

impl BlockTemplate {
    /// Wrap raw bytes; the nonce field must fit inside them
    pub fn new(bytes: Vec<u8>, nonce_offset: usize) -> Result<Self, TemplateError> {
        if nonce_offset
            .checked_add(NONCE_SIZE)
            .map_or(true, |end| end > bytes.len())
        {
            return Err(TemplateError::NonceOffset {
                offset: nonce_offset,
                len: bytes.len(),
            });
        }
        Ok(Self {
            bytes,
            nonce_offset,
        })
    }

    /// Parse a 76-byte template written as exactly 152 lowercase hex digits
    pub fn from_hex(text: &str, nonce_offset: usize) -> Result<Self, TemplateError> {
        let expected = BLOCK_TEMPLATE_SIZE * 2;
        if text.len() != expected {
            return Err(TemplateError::HexLength {
                expected,
                actual: text.len(),
            });
        }
        if let Some(c) = text.chars().find(|c| !matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(TemplateError::HexCharset(c));
        }
        // Charset checked above, decoding cannot fail
        let bytes = hex::decode(text).map_err(|_| TemplateError::HexLength {
            expected,
            actual: text.len(),
        })?;
        Self::new(bytes, nonce_offset)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn nonce_offset(&self) -> usize {
        self.nonce_offset
    }

    pub fn nonce(&self) -> u32 {
        let mut field = [0u8; NONCE_SIZE];
        field.copy_from_slice(&self.bytes[self.nonce_offset..self.nonce_offset + NONCE_SIZE]);
        u32::from_le_bytes(field)
    }

    pub fn set_nonce(&mut self, nonce: u32) {
        self.bytes[self.nonce_offset..self.nonce_offset + NONCE_SIZE]
            .copy_from_slice(&nonce.to_le_bytes());
    }

    /// Add `step` to the nonce and return the new value, or `None` when the
    /// counter would wrap
    pub fn advance_nonce(&mut self, step: u32) -> Option<u32> {
        let next = self.nonce().checked_add(step)?;
        self.set_nonce(next);
        Some(next)
    }

    /// Copy with a different nonce
    pub fn with_nonce(&self, nonce: u32) -> Self {
        let mut copy = self.clone();
        copy.set_nonce(nonce);
        copy
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for BlockTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockTemplate")
            .field("bytes", &self.to_hex())
            .field("nonce", &self.nonce())
            .finish()
    }
}
