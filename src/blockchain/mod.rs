//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Profile WIF keys
//!     → wallet.rs (key decoding, message signing, signer recovery)
//!     → transaction.rs (build, sign, parse start transactions)
//!     → client.rs (explorer lookup, daemon broadcast via the resilient client)
//! ```
//!
//! # Security Constraints
//! - Never log private keys or sensitive data
//! - All upstream calls have configurable timeouts
//! - Encoding primitives (encoding.rs) are pure and allocation-light

pub mod client;
pub mod encoding;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{BroadcastReply, ChainClient, ChainError, ExplorerTransaction};
pub use transaction::{
    build_start_transaction, compute_broadcast_txid, parse_start_transaction,
    NativeStartSigner, SignedStartTransaction, StartRequest, TransactionSigner,
};
pub use types::{CodecError, KeyError, SigningError, MESSAGE_MAGIC};
pub use wallet::{decode_wif_private_key, WifKey};
