//! Pipeline states and caller-facing outcomes.

use serde::Serialize;
use serde_json::{json, Value};

/// Stage reached by a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Received,
    ValidatingCollateral,
    RejectedInvalidCollateral,
    LookupFailure,
    MatchingAddress,
    RejectedNoAddressMatch,
    Signing,
    Signed,
    Broadcasting,
    BroadcastSuccess,
    BroadcastFailure,
    InternalError,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Received => "RECEIVED",
            PipelineState::ValidatingCollateral => "VALIDATING_COLLATERAL",
            PipelineState::RejectedInvalidCollateral => "REJECTED_INVALID_COLLATERAL",
            PipelineState::LookupFailure => "LOOKUP_FAILURE",
            PipelineState::MatchingAddress => "MATCHING_ADDRESS",
            PipelineState::RejectedNoAddressMatch => "REJECTED_NO_ADDRESS_MATCH",
            PipelineState::Signing => "SIGNING",
            PipelineState::Signed => "SIGNED",
            PipelineState::Broadcasting => "BROADCASTING",
            PipelineState::BroadcastSuccess => "BROADCAST_SUCCESS",
            PipelineState::BroadcastFailure => "BROADCAST_FAILURE",
            PipelineState::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::RejectedInvalidCollateral
                | PipelineState::LookupFailure
                | PipelineState::RejectedNoAddressMatch
                | PipelineState::BroadcastSuccess
                | PipelineState::BroadcastFailure
                | PipelineState::InternalError
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one start request.
///
/// Rejections are client-correctable, failures are transient or
/// infrastructure problems, internal errors are bugs or bad local state.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// The daemon answered. `accepted` is false when it reported an error.
    Broadcast {
        accepted: bool,
        txid: String,
        profile: String,
        payload: Value,
    },
    Rejected {
        state: PipelineState,
        code: &'static str,
        message: String,
    },
    Failed {
        state: PipelineState,
        message: String,
        circuit_open: bool,
    },
    Internal {
        message: String,
    },
}

impl StartOutcome {
    pub fn state(&self) -> PipelineState {
        match self {
            StartOutcome::Broadcast { accepted: true, .. } => PipelineState::BroadcastSuccess,
            StartOutcome::Broadcast { accepted: false, .. } => PipelineState::BroadcastFailure,
            StartOutcome::Rejected { state, .. } | StartOutcome::Failed { state, .. } => *state,
            StartOutcome::Internal { .. } => PipelineState::InternalError,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state() == PipelineState::BroadcastSuccess
    }

    /// Reason code for rejections.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            StartOutcome::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// JSON body describing the outcome. Daemon replies are returned verbatim.
    pub fn to_json(&self) -> Value {
        match self {
            StartOutcome::Broadcast { payload, .. } => payload.clone(),
            StartOutcome::Rejected {
                state,
                code,
                message,
            } => json!({
                "status": "error",
                "state": state,
                "code": code,
                "error": message,
            }),
            StartOutcome::Failed { state, message, .. } => json!({
                "status": "error",
                "state": state,
                "error": message,
            }),
            StartOutcome::Internal { message } => json!({
                "status": "error",
                "state": PipelineState::InternalError,
                "error": message,
            }),
        }
    }
}
