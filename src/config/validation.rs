//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every profile field present, keys decodable, names unique
//! - Validate value ranges (timeouts > 0, probabilities in [0, 1])
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: StarterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::blockchain::encoding::decode_hex;
use crate::blockchain::wallet::decode_wif_private_key;
use crate::config::schema::{ProfileConfig, StarterConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no address profiles configured")]
    NoProfiles,

    #[error("profile #{index} ({name}): missing {field}")]
    MissingField {
        index: usize,
        name: String,
        field: &'static str,
    },

    #[error("duplicate profile name '{0}'")]
    DuplicateProfile(String),

    #[error("profile '{name}': {field} is not a valid WIF key: {reason}")]
    InvalidKey {
        name: String,
        field: &'static str,
        reason: String,
    },

    #[error("profile '{0}': redeem_script is not valid hex")]
    InvalidRedeemScript(String),

    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("cache.sweep_probability must be within [0, 1], got {0}")]
    SweepProbability(String),

    #[error("network.p2sh_version_hex must be two bytes of hex, got '{0}'")]
    P2shVersion(String),

    #[error("auth is enabled but auth.api_keys is empty")]
    NoApiKeys,

    #[error("auth.api_keys.{0} is empty")]
    EmptyApiKey(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &StarterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_profiles(&config.profiles, &mut errors);

    for (field, value) in [
        ("explorer.base_url", &config.explorer.base_url),
        ("daemon.base_url", &config.daemon.base_url),
    ] {
        if url::Url::parse(value).is_err() {
            errors.push(ValidationError::InvalidUrl {
                field,
                value: value.clone(),
            });
        }
    }
    if let Some(webhook) = &config.notifications.webhook_url {
        if url::Url::parse(webhook).is_err() {
            errors.push(ValidationError::InvalidUrl {
                field: "notifications.webhook_url",
                value: webhook.clone(),
            });
        }
    }

    for (field, value) in [
        ("http.request_timeout_ms", config.http.request_timeout_ms),
        ("http.max_retries", config.http.max_retries as u64),
        ("circuit_breaker.failure_threshold", config.circuit_breaker.failure_threshold as u64),
        ("server.request_timeout_secs", config.server.request_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.rate_limit.enabled {
        for (field, value) in [
            ("rate_limit.api_max_requests", config.rate_limit.api_max_requests as u64),
            ("rate_limit.api_window_secs", config.rate_limit.api_window_secs),
            ("rate_limit.start_max_requests", config.rate_limit.start_max_requests as u64),
            ("rate_limit.start_window_secs", config.rate_limit.start_window_secs),
        ] {
            if value == 0 {
                errors.push(ValidationError::Zero { field });
            }
        }
    }

    if config.auth.enabled && config.auth.api_keys.is_empty() {
        errors.push(ValidationError::NoApiKeys);
    }
    for (name, key) in &config.auth.api_keys {
        if key.trim().is_empty() {
            errors.push(ValidationError::EmptyApiKey(name.clone()));
        }
    }

    let p = config.cache.sweep_probability;
    if !(0.0..=1.0).contains(&p) {
        errors.push(ValidationError::SweepProbability(p.to_string()));
    }

    match decode_hex(&config.network.p2sh_version_hex) {
        Ok(bytes) if bytes.len() == 2 => {}
        _ => errors.push(ValidationError::P2shVersion(
            config.network.p2sh_version_hex.clone(),
        )),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_profiles(profiles: &[ProfileConfig], errors: &mut Vec<ValidationError>) {
    if profiles.is_empty() {
        errors.push(ValidationError::NoProfiles);
        return;
    }

    let mut seen = HashSet::new();
    for (index, profile) in profiles.iter().enumerate() {
        let label = if profile.name.trim().is_empty() {
            "<unnamed>".to_string()
        } else {
            profile.name.clone()
        };

        for (field, value) in [
            ("name", &profile.name),
            ("collateral_address", &profile.collateral_address),
            ("node_operator_private_key", &profile.node_operator_private_key),
            ("collateral_private_key", &profile.collateral_private_key),
            ("redeem_script", &profile.redeem_script),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::MissingField {
                    index: index + 1,
                    name: label.clone(),
                    field,
                });
            }
        }

        if !profile.name.is_empty() && !seen.insert(profile.name.as_str()) {
            errors.push(ValidationError::DuplicateProfile(profile.name.clone()));
        }

        for (field, value) in [
            ("node_operator_private_key", &profile.node_operator_private_key),
            ("collateral_private_key", &profile.collateral_private_key),
        ] {
            if value.trim().is_empty() {
                continue;
            }
            if let Err(e) = decode_wif_private_key(value) {
                errors.push(ValidationError::InvalidKey {
                    name: label.clone(),
                    field,
                    reason: e.to_string(),
                });
            }
        }

        if !profile.redeem_script.trim().is_empty() && decode_hex(&profile.redeem_script).is_err() {
            errors.push(ValidationError::InvalidRedeemScript(label.clone()));
        }
    }
}
