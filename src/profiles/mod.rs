//! Signing identities loaded from configuration.

pub mod redeem;
pub mod store;

pub use redeem::check_redeem_scripts;
pub use store::{
    AddressProfile, ProfileError, ProfileSelection, ProfileStore, ProfileSummary, ResolveError,
};
