//! Start-request pipeline.
//!
//! # Stages
//! ```text
//! RECEIVED
//!     → VALIDATING_COLLATERAL ── rejected ──→ REJECTED_INVALID_COLLATERAL
//!                             ── lookup failed ──→ LOOKUP_FAILURE
//!     → MATCHING_ADDRESS ── no profile ──→ REJECTED_NO_ADDRESS_MATCH
//!     → SIGNING → SIGNED
//!     → BROADCASTING ──→ BROADCAST_SUCCESS | BROADCAST_FAILURE
//! ```
//! `INTERNAL_ERROR` may end any stage.
//!
//! Each request runs on its own task, so a caller that goes away does not
//! cancel a broadcast already in flight. Requests are independent: two
//! requests for the same collateral are both broadcast.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::blockchain::{
    ChainClient, ChainError, NativeStartSigner, SignedStartTransaction, StartRequest,
    TransactionSigner,
};
use crate::collateral::{CollateralError, CollateralValidator, ValidatedCollateral};
use crate::config::StarterConfig;
use crate::notifications::{LogNotifier, NotificationSink, StartNotification, WebhookNotifier};
use crate::observability::logging::AUDIT_TARGET;
use crate::observability::metrics;
use crate::pipeline::outcome::{PipelineState, StartOutcome};
use crate::profiles::{AddressProfile, ProfileError, ProfileSelection, ProfileStore};
use crate::resilience::{CircuitBreakerRegistry, ResilientClient, ResponseCache};

/// One start request, syntax already checked.
#[derive(Debug, Clone)]
pub struct StartCommand {
    pub txid: String,
    pub output_index: u32,
    pub profile: Option<String>,
    pub caller_ip: Option<IpAddr>,
}

/// Failure to assemble an orchestrator from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Profiles(#[from] ProfileError),
}

/// Runs start requests through validation, signing and broadcast.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Pipeline>,
}

struct Pipeline {
    validator: CollateralValidator,
    chain: ChainClient,
    profiles: Arc<ProfileStore>,
    signer: Arc<dyn TransactionSigner>,
    notifier: Arc<dyn NotificationSink>,
}

impl Orchestrator {
    pub fn new(
        chain: ChainClient,
        profiles: Arc<ProfileStore>,
        signer: Arc<dyn TransactionSigner>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Pipeline {
                validator: CollateralValidator::new(chain.clone()),
                chain,
                profiles,
                signer,
                notifier,
            }),
        }
    }

    /// Wire up every collaborator from configuration.
    pub fn from_config(config: &StarterConfig) -> Result<Self, BuildError> {
        let cache = Arc::new(ResponseCache::new(&config.cache));
        let breakers = Arc::new(CircuitBreakerRegistry::new(&config.circuit_breaker));
        let http = ResilientClient::new(&config.http, cache, breakers)?;
        let chain = ChainClient::new(http, &config.explorer, &config.daemon);
        let profiles = Arc::new(ProfileStore::from_config(&config.profiles)?);

        let notifier: Arc<dyn NotificationSink> =
            match WebhookNotifier::from_config(&config.notifications)? {
                Some(webhook) => Arc::new(webhook),
                None => Arc::new(LogNotifier),
            };

        Ok(Self::new(
            chain,
            profiles,
            Arc::new(NativeStartSigner::default()),
            notifier,
        ))
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.inner.profiles
    }

    pub fn chain(&self) -> &ChainClient {
        &self.inner.chain
    }

    /// Run one request to a terminal state.
    pub async fn start_node(&self, command: StartCommand) -> StartOutcome {
        let request_id = Uuid::new_v4();
        let pipeline = self.inner.clone();
        let task_command = command.clone();
        let span = tracing::info_span!(
            "start_node",
            request_id = %request_id,
            txid = %command.txid,
            index = command.output_index
        );

        let started = Instant::now();
        let task = async move { pipeline.run(request_id, task_command, started).await };
        match tokio::spawn(task.instrument(span)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Start pipeline task failed");
                let outcome = StartOutcome::Internal {
                    message: "internal error while processing start request".to_string(),
                };
                let profile_name = command.profile.clone();
                self.inner.finish(request_id, &command, profile_name, started, &outcome);
                outcome
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("chain", &self.inner.chain)
            .field("profiles", &self.inner.profiles.len())
            .finish()
    }
}

impl Pipeline {
    async fn run(&self, request_id: Uuid, command: StartCommand, started: Instant) -> StartOutcome {
        tracing::info!(state = %PipelineState::Received, "Start request received");

        let mut profile_name = command.profile.clone();
        let outcome = match self.stages(&command, &mut profile_name).await {
            Ok(outcome) | Err(outcome) => outcome,
        };

        self.finish(request_id, &command, profile_name, started, &outcome);
        outcome
    }

    /// Audit, measure and notify a terminal outcome.
    fn finish(
        &self,
        request_id: Uuid,
        command: &StartCommand,
        profile_name: Option<String>,
        started: Instant,
        outcome: &StartOutcome,
    ) {
        let state = outcome.state();
        tracing::info!(
            target: AUDIT_TARGET,
            request_id = %request_id,
            txid = %command.txid,
            index = command.output_index,
            profile = profile_name.as_deref().unwrap_or("-"),
            caller_ip = ?command.caller_ip,
            state = state.as_str(),
            code = outcome.code().unwrap_or("-"),
            duration_ms = started.elapsed().as_millis() as u64,
            "start request finished"
        );
        metrics::record_pipeline(state.as_str(), started);

        self.notify(command, profile_name, outcome);
    }

    /// The staged pipeline. `Err` carries an early terminal outcome.
    async fn stages(
        &self,
        command: &StartCommand,
        profile_name: &mut Option<String>,
    ) -> Result<StartOutcome, StartOutcome> {
        let collateral = self.validate(command).await?;

        let profile = self.match_address(command, &collateral)?;
        *profile_name = Some(profile.name().to_string());

        let signed = self.sign(command, profile)?;
        self.broadcast(command, profile, signed).await
    }

    async fn validate(&self, command: &StartCommand) -> Result<ValidatedCollateral, StartOutcome> {
        tracing::debug!(state = %PipelineState::ValidatingCollateral, txid = %command.txid);
        self.validator
            .fetch_collateral_info(&command.txid, command.output_index)
            .await
            .map_err(|e| match e {
                CollateralError::Rejected(reason) => StartOutcome::Rejected {
                    state: PipelineState::RejectedInvalidCollateral,
                    code: reason.code(),
                    message: format!("Failed validating collateral: {}", reason),
                },
                CollateralError::Lookup(lookup) => {
                    tracing::warn!(txid = %command.txid, error = %lookup, "Collateral lookup failed");
                    failure(PipelineState::LookupFailure, "Collateral lookup failed", &lookup)
                }
            })
    }

    fn match_address<'a>(
        &'a self,
        command: &StartCommand,
        collateral: &ValidatedCollateral,
    ) -> Result<&'a AddressProfile, StartOutcome> {
        tracing::debug!(state = %PipelineState::MatchingAddress, address = %collateral.address);
        let selection = ProfileSelection::from_name(command.profile.as_deref());
        self.profiles
            .resolve(&selection, &collateral.address)
            .map_err(|e| {
                tracing::info!(txid = %command.txid, code = e.code(), error = %e, "No signing profile");
                StartOutcome::Rejected {
                    state: PipelineState::RejectedNoAddressMatch,
                    code: e.code(),
                    message: format!("Failed validating collateral: {}", e),
                }
            })
    }

    fn sign(
        &self,
        command: &StartCommand,
        profile: &AddressProfile,
    ) -> Result<SignedStartTransaction, StartOutcome> {
        tracing::debug!(state = %PipelineState::Signing, profile = %profile.name());
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| internal("system clock before Unix epoch", &e))?
            .as_secs();

        let request = StartRequest {
            collateral_txid: &command.txid,
            output_index: command.output_index,
            collateral_wif: profile.collateral_private_key(),
            operator_wif: profile.node_operator_private_key(),
            timestamp,
            collateral_compressed: profile.collateral_compressed(),
        };
        let signed = self
            .signer
            .build_start_transaction(&request)
            .map_err(|e| internal("failed to sign start transaction", &e))?;

        tracing::info!(
            state = %PipelineState::Signed,
            profile = %profile.name(),
            start_txid = %signed.txid(),
            "Start transaction signed"
        );
        Ok(signed)
    }

    async fn broadcast(
        &self,
        command: &StartCommand,
        profile: &AddressProfile,
        signed: SignedStartTransaction,
    ) -> Result<StartOutcome, StartOutcome> {
        tracing::debug!(state = %PipelineState::Broadcasting, start_txid = %signed.txid());
        let reply = self
            .chain
            .send_raw_transaction(&signed.to_hex())
            .await
            .map_err(|e| {
                tracing::error!(txid = %command.txid, error = %e, "Broadcast failed");
                failure(PipelineState::BroadcastFailure, "Broadcast failed", &e)
            })?;

        let accepted = reply.is_accepted();
        if accepted {
            tracing::info!(start_txid = %signed.txid(), attempts = reply.attempts, "Start transaction broadcast");
        } else {
            tracing::warn!(start_txid = %signed.txid(), response = %reply.payload, "Daemon refused start transaction");
        }

        Ok(StartOutcome::Broadcast {
            accepted,
            txid: signed.txid().to_string(),
            profile: profile.name().to_string(),
            payload: reply.payload,
        })
    }

    fn notify(&self, command: &StartCommand, profile_name: Option<String>, outcome: &StartOutcome) {
        self.notifier.notify(StartNotification {
            txid: command.txid.clone(),
            output_index: command.output_index,
            success: outcome.is_success(),
            profile_name,
            payload: outcome.to_json(),
            caller_ip: command.caller_ip,
        });
    }
}

fn failure(state: PipelineState, context: &str, error: &ChainError) -> StartOutcome {
    StartOutcome::Failed {
        state,
        message: format!("{}: {}", context, error),
        circuit_open: error.is_circuit_open(),
    }
}

fn internal(context: &str, error: &dyn std::error::Error) -> StartOutcome {
    tracing::error!(error = %error, "{}", context);
    StartOutcome::Internal {
        message: context.to_string(),
    }
}
