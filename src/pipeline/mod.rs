//! Start-request orchestration.
//!
//! # Data Flow
//! ```text
//! StartCommand
//!     → collateral validation (explorer lookup)
//!     → profile resolution (explicit name or address scan)
//!     → signing (TransactionSigner)
//!     → broadcast (daemon API)
//!     → notification, audit event, metrics
//!     → StartOutcome
//! ```

pub mod orchestrator;
pub mod outcome;

pub use orchestrator::{BuildError, Orchestrator, StartCommand};
pub use outcome::{PipelineState, StartOutcome};
