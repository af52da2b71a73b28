//! Collateral validation types.

use serde::Serialize;
use thiserror::Error;

use crate::blockchain::ChainError;

/// Node class funded by a collateral output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Stratus,
    Nimbus,
}

impl Tier {
    /// Tier for an exact eight-decimal amount string.
    pub fn from_amount(amount: &str) -> Option<Self> {
        match amount {
            "40000.00000000" => Some(Tier::Stratus),
            "12500.00000000" => Some(Tier::Nimbus),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Stratus => "Stratus",
            Tier::Nimbus => "Nimbus",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a collateral output was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("transaction not found on the explorer")]
    TxNotFound,

    #[error("explorer returned txid {actual}")]
    TxidMismatch { actual: String },

    #[error("output index {index} out of range ({outputs} outputs)")]
    OutputIndexOutOfRange { index: u32, outputs: usize },

    #[error("output script type is {0:?}, expected scripthash")]
    NotScriptHash(Option<String>),

    #[error("output has no address")]
    MissingAddress,

    #[error("amount {0:?} is not a valid collateral amount")]
    InvalidAmount(Option<String>),
}

impl RejectionReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::TxNotFound => "TX_NOT_FOUND",
            RejectionReason::TxidMismatch { .. } => "TXID_MISMATCH",
            RejectionReason::OutputIndexOutOfRange { .. } => "OUTPUT_INDEX_OUT_OF_RANGE",
            RejectionReason::NotScriptHash(_) => "NOT_SCRIPTHASH",
            RejectionReason::MissingAddress => "MISSING_ADDRESS",
            RejectionReason::InvalidAmount(_) => "INVALID_AMOUNT",
        }
    }
}

/// A collateral output that may fund a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedCollateral {
    pub address: String,
    pub amount: String,
    pub tier: Tier,
}

#[derive(Debug, Error)]
pub enum CollateralError {
    /// The output exists but cannot fund a node.
    #[error("invalid collateral ({code}): {0}", code = .0.code())]
    Rejected(RejectionReason),

    /// The explorer could not be consulted.
    #[error("collateral lookup failed: {0}")]
    Lookup(#[from] ChainError),
}

impl From<RejectionReason> for CollateralError {
    fn from(reason: RejectionReason) -> Self {
        CollateralError::Rejected(reason)
    }
}
