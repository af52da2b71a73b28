//! Chain-specific constants and error definitions.

use thiserror::Error;

/// Transaction format version written at the head of a start transaction.
pub const START_TX_VERSION: u32 = 5;

/// Record type byte identifying a node start.
pub const START_TX_TYPE: u8 = 2;

/// Prefix hashed in front of every signed message.
pub const MESSAGE_MAGIC: &[u8] = b"\x18Zelcash Signed Message:\n";

/// Length of a compact recoverable signature.
pub const COMPACT_SIGNATURE_LEN: usize = 65;

/// Errors from the binary codec.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before the value was complete.
    #[error("unexpected end of input: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    /// Input was not valid hex.
    #[error("invalid hex: {0}")]
    Hex(String),

    /// Trailing bytes after the last field.
    #[error("{0} trailing bytes after signature")]
    TrailingBytes(usize),

    /// A field had the wrong size.
    #[error("{field} must be {expected} bytes, got {actual}")]
    FieldLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Errors decoding or using secret keys.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// WIF text failed base58check decoding or had the wrong length.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// The 32 bytes are not a valid secp256k1 scalar.
    #[error("invalid secret key: {0}")]
    InvalidSecret(String),
}

/// Errors produced while building or checking a signed start transaction.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Signature bytes could not be interpreted.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_prefix_carries_its_length() {
        assert_eq!(MESSAGE_MAGIC[0] as usize, MESSAGE_MAGIC.len() - 1);
    }

    #[test]
    fn test_error_display() {
        let err = CodecError::Truncated { offset: 4, needed: 2 };
        assert_eq!(err.to_string(), "unexpected end of input: needed 2 bytes at offset 4");

        let err = KeyError::InvalidKeyEncoding("bad checksum".into());
        assert!(err.to_string().contains("bad checksum"));
    }
}
