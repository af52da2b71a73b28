//! Binary encoding helpers shared by the signer and the transaction parser.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::blockchain::types::CodecError;

/// Encode `n` as a compact-size varint.
pub fn encode_varint(n: u64) -> Vec<u8> {
    if n < 253 {
        vec![n as u8]
    } else if n < 0x1_0000 {
        let mut buf = Vec::with_capacity(3);
        buf.push(253);
        buf.extend_from_slice(&(n as u16).to_le_bytes());
        buf
    } else if n < 0x1_0000_0000 {
        let mut buf = Vec::with_capacity(5);
        buf.push(254);
        buf.extend_from_slice(&(n as u32).to_le_bytes());
        buf
    } else {
        let mut buf = Vec::with_capacity(9);
        buf.push(255);
        buf.extend_from_slice(&n.to_le_bytes());
        buf
    }
}

/// Decode a varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(bytes: &[u8]) -> Result<(u64, usize), CodecError> {
    let marker = *bytes
        .first()
        .ok_or(CodecError::Truncated { offset: 0, needed: 1 })?;

    let width = match marker {
        253 => 2,
        254 => 4,
        255 => 8,
        n => return Ok((n as u64, 1)),
    };

    let body = bytes
        .get(1..1 + width)
        .ok_or(CodecError::Truncated { offset: 1, needed: width })?;
    let mut le = [0u8; 8];
    le[..width].copy_from_slice(body);
    Ok((u64::from_le_bytes(le), 1 + width))
}

/// SHA-256 applied twice.
pub fn double_hash(bytes: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(bytes);
    let second = Sha256::digest(first);
    second.into()
}

/// RIPEMD-160 of SHA-256.
pub fn hash160(bytes: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(bytes);
    Ripemd160::digest(sha).into()
}

/// Hex of `bytes` in reverse order, the canonical display form of ids.
pub fn reversed_hex(bytes: &[u8]) -> String {
    let mut reversed = bytes.to_vec();
    reversed.reverse();
    hex::encode(reversed)
}

/// Decode a hex string, mapping failures into [`CodecError`].
pub fn decode_hex(text: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(text).map_err(|e| CodecError::Hex(e.to_string()))
}

/// Base58check P2SH address for a redeem script.
pub fn script_hash_address(redeem_script: &[u8], version: [u8; 2]) -> String {
    let mut payload = Vec::with_capacity(22);
    payload.extend_from_slice(&version);
    payload.extend_from_slice(&hash160(redeem_script));
    bs58::encode(payload).with_check().into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        for n in [0u64, 1, 252, 253, 255, 65_535, 65_536, u32::MAX as u64] {
            let encoded = encode_varint(n);
            let (decoded, used) = decode_varint(&encoded).unwrap();
            assert_eq!(decoded, n, "value {}", n);
            assert_eq!(used, encoded.len());
        }
    }

    #[test]
    fn test_varint_widths() {
        assert_eq!(encode_varint(252), vec![252]);
        assert_eq!(encode_varint(253), vec![253, 253, 0]);
        assert_eq!(encode_varint(65_536), vec![254, 0, 0, 1, 0]);
        assert_eq!(
            encode_varint(0x1_0000_0001),
            vec![255, 1, 0, 0, 0, 1, 0, 0, 0]
        );
    }

    #[test]
    fn test_varint_large_values() {
        let n = (1u64 << 53) - 1;
        let (decoded, used) = decode_varint(&encode_varint(n)).unwrap();
        assert_eq!(decoded, n);
        assert_eq!(used, 9);
    }

    #[test]
    fn test_varint_truncated() {
        assert!(decode_varint(&[]).is_err());
        assert_eq!(
            decode_varint(&[254, 1, 2]),
            Err(CodecError::Truncated { offset: 1, needed: 4 })
        );
    }

    #[test]
    fn test_double_hash_empty() {
        assert_eq!(
            hex::encode(double_hash(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_reversed_hex() {
        assert_eq!(reversed_hex(&[0x01, 0x02, 0xff]), "ff0201");
    }
}
