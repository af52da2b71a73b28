//! Node-start transaction building, signing and parsing.
//!
//! # Layout
//! ```text
//! version (u32 LE) | type (u8) | collateral txid (32, reversed) | output index (u32 LE)
//! | varint + collateral pubkey | varint + operator pubkey (uncompressed)
//! | timestamp (u32 LE) | varint + compact signature
//! ```
//!
//! The signature covers the canonical id of every byte before it, so the
//! broadcast id of a signed transaction is the id of its unsigned prefix.

use crate::blockchain::encoding::{decode_hex, decode_varint, double_hash, encode_varint, reversed_hex};
use crate::blockchain::types::{
    CodecError, SigningError, MESSAGE_MAGIC, START_TX_TYPE, START_TX_VERSION,
};
use crate::blockchain::wallet::{decode_wif_private_key, recover_message_signer, sign_message};

/// Inputs for one start transaction.
#[derive(Debug, Clone, Copy)]
pub struct StartRequest<'a> {
    /// Collateral transaction id in display (big-endian hex) order.
    pub collateral_txid: &'a str,
    pub output_index: u32,
    pub collateral_wif: &'a str,
    pub operator_wif: &'a str,
    /// Unix seconds. Truncated to 32 bits on the wire.
    pub timestamp: u64,
    pub collateral_compressed: bool,
}

/// A signed start transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedStartTransaction {
    raw: Vec<u8>,
    txid: String,
}

impl SignedStartTransaction {
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Hex encoding used on the broadcast endpoint.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.raw)
    }

    /// Id the network will assign to this transaction.
    pub fn txid(&self) -> &str {
        &self.txid
    }
}

/// Builds and signs start transactions.
pub trait TransactionSigner: Send + Sync {
    fn build_start_transaction(
        &self,
        request: &StartRequest<'_>,
    ) -> Result<SignedStartTransaction, SigningError>;
}

/// Hand-rolled encoder for the start transaction format.
#[derive(Debug, Clone)]
pub struct NativeStartSigner {
    magic: Vec<u8>,
}

impl NativeStartSigner {
    pub fn new(magic: impl Into<Vec<u8>>) -> Self {
        Self { magic: magic.into() }
    }
}

impl Default for NativeStartSigner {
    fn default() -> Self {
        Self::new(MESSAGE_MAGIC)
    }
}

impl TransactionSigner for NativeStartSigner {
    fn build_start_transaction(
        &self,
        request: &StartRequest<'_>,
    ) -> Result<SignedStartTransaction, SigningError> {
        let collateral_key = decode_wif_private_key(request.collateral_wif)?;
        let operator_key = decode_wif_private_key(request.operator_wif)?;

        let mut txid_bytes = decode_hex(request.collateral_txid)?;
        if txid_bytes.len() != 32 {
            return Err(CodecError::FieldLength {
                field: "collateral txid",
                expected: 32,
                actual: txid_bytes.len(),
            }
            .into());
        }
        txid_bytes.reverse();

        let collateral_pubkey = collateral_key.public_key(request.collateral_compressed)?;
        let operator_pubkey = operator_key.public_key(false)?;

        let mut raw = Vec::with_capacity(256);
        raw.extend_from_slice(&START_TX_VERSION.to_le_bytes());
        raw.push(START_TX_TYPE);
        raw.extend_from_slice(&txid_bytes);
        raw.extend_from_slice(&request.output_index.to_le_bytes());
        raw.extend_from_slice(&encode_varint(collateral_pubkey.len() as u64));
        raw.extend_from_slice(&collateral_pubkey);
        raw.extend_from_slice(&encode_varint(operator_pubkey.len() as u64));
        raw.extend_from_slice(&operator_pubkey);
        raw.extend_from_slice(&(request.timestamp as u32).to_le_bytes());

        let txid = reversed_hex(&double_hash(&raw));
        let signature = sign_message(
            txid.as_bytes(),
            collateral_key.secret_bytes(),
            request.collateral_compressed,
            &self.magic,
        )?;

        raw.extend_from_slice(&encode_varint(signature.len() as u64));
        raw.extend_from_slice(&signature);

        Ok(SignedStartTransaction { raw, txid })
    }
}

/// Build a signed start transaction and return its hex encoding.
pub fn build_start_transaction(
    collateral_txid: &str,
    output_index: u32,
    collateral_wif: &str,
    operator_wif: &str,
    timestamp: u64,
    collateral_compressed: bool,
) -> Result<String, SigningError> {
    let request = StartRequest {
        collateral_txid,
        output_index,
        collateral_wif,
        operator_wif,
        timestamp,
        collateral_compressed,
    };
    Ok(NativeStartSigner::default()
        .build_start_transaction(&request)?
        .to_hex())
}

/// Fields of a parsed start transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStartTransaction {
    pub version: u32,
    pub record_type: u8,
    /// Display-order hex.
    pub collateral_txid: String,
    pub output_index: u32,
    pub collateral_public_key: Vec<u8>,
    pub operator_public_key: Vec<u8>,
    pub timestamp: u32,
    pub signature: Vec<u8>,
    /// Length of the prefix covered by the signature.
    pub unsigned_len: usize,
}

impl ParsedStartTransaction {
    /// Check the embedded signature against the embedded collateral key.
    pub fn verify_signature(&self, raw: &[u8], magic: &[u8]) -> Result<bool, SigningError> {
        let prefix = raw.get(..self.unsigned_len).ok_or(CodecError::Truncated {
            offset: 0,
            needed: self.unsigned_len,
        })?;
        let message = reversed_hex(&double_hash(prefix));
        let signer = recover_message_signer(message.as_bytes(), &self.signature, magic)?;
        Ok(signer == self.collateral_public_key)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let truncated = CodecError::Truncated { offset: self.pos, needed: n };
        let end = self.pos.checked_add(n).ok_or(truncated.clone())?;
        let slice = self.bytes.get(self.pos..end).ok_or(truncated)?;
        self.pos += n;
        Ok(slice)
    }

    fn u32_le(&mut self) -> Result<u32, CodecError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn var_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let rest = self.bytes.get(self.pos..).unwrap_or_default();
        let (len, used) = decode_varint(rest).map_err(|_| CodecError::Truncated {
            offset: self.pos,
            needed: 1,
        })?;
        self.pos += used;
        self.take(len as usize)
    }
}

/// Parse a serialized start transaction.
///
/// The signature length comes from its own prefix; bytes after it are an error.
pub fn parse_start_transaction(bytes: &[u8]) -> Result<ParsedStartTransaction, CodecError> {
    let mut reader = Reader { bytes, pos: 0 };

    let version = reader.u32_le()?;
    let record_type = reader.take(1)?[0];
    let collateral_txid = reversed_hex(reader.take(32)?);
    let output_index = reader.u32_le()?;
    let collateral_public_key = reader.var_bytes()?.to_vec();
    let operator_public_key = reader.var_bytes()?.to_vec();
    let timestamp = reader.u32_le()?;
    let unsigned_len = reader.pos;
    let signature = reader.var_bytes()?.to_vec();

    if reader.pos != bytes.len() {
        return Err(CodecError::TrailingBytes(bytes.len() - reader.pos));
    }

    Ok(ParsedStartTransaction {
        version,
        record_type,
        collateral_txid,
        output_index,
        collateral_public_key,
        operator_public_key,
        timestamp,
        signature,
        unsigned_len,
    })
}

/// Id of a serialized start transaction, as the network computes it.
pub fn compute_broadcast_txid(raw_hex: &str) -> Result<String, CodecError> {
    let raw = decode_hex(raw_hex)?;
    let parsed = parse_start_transaction(&raw)?;
    Ok(reversed_hex(&double_hash(&raw[..parsed.unsigned_len])))
}
