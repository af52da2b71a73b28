//! Collateral validation against the block explorer.

pub mod types;
pub mod validator;

pub use types::{CollateralError, RejectionReason, Tier, ValidatedCollateral};
pub use validator::{validate_output, CollateralValidator};
