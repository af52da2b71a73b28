//! Path parameter validation for start requests.

use thiserror::Error;

/// Highest accepted output index.
pub const MAX_OUTPUT_INDEX: u32 = 9999;

/// Longest accepted profile name.
pub const MAX_PROFILE_NAME_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("Invalid transaction ID format. Must be 64 character hex string.")]
    Txid,

    #[error("Invalid index. Must be a non-negative integer.")]
    Index,

    #[error("Invalid address name format.")]
    ProfileName,
}

/// 64 hex digits, either case.
pub fn validate_txid(txid: &str) -> Result<(), ParamError> {
    if txid.len() == 64 && txid.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ParamError::Txid)
    }
}

/// Canonical decimal in `0..=9999`: no sign, no leading zeros.
pub fn parse_output_index(raw: &str) -> Result<u32, ParamError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParamError::Index);
    }
    if raw.len() > 1 && raw.starts_with('0') {
        return Err(ParamError::Index);
    }
    match raw.parse::<u32>() {
        Ok(index) if index <= MAX_OUTPUT_INDEX => Ok(index),
        _ => Err(ParamError::Index),
    }
}

/// 1 to 50 of `[A-Za-z0-9 _-]`.
pub fn validate_profile_name(name: &str) -> Result<(), ParamError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_PROFILE_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b' ' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(ParamError::ProfileName)
    }
}
