//! Address profiles and collateral address resolution.
//!
//! # Resolution Modes
//! - Explicit: look the profile up by name, then require its collateral
//!   address to equal the validated one
//! - Scan: first profile, in configured order, whose collateral address equals
//!   the validated one
//!
//! Profiles are loaded once at startup and never change afterwards.

use serde::Serialize;
use thiserror::Error;

use crate::blockchain::wallet::decode_wif_private_key;
use crate::blockchain::KeyError;
use crate::config::ProfileConfig;

/// A signing identity able to start nodes funded by one collateral address.
#[derive(Clone)]
pub struct AddressProfile {
    name: String,
    collateral_address: String,
    node_operator_private_key: String,
    collateral_private_key: String,
    redeem_script: String,
    collateral_compressed: bool,
}

impl AddressProfile {
    /// Build a profile, decoding both keys to catch bad encodings early.
    pub fn from_config(config: &ProfileConfig) -> Result<Self, ProfileError> {
        let collateral_key =
            decode_wif_private_key(&config.collateral_private_key).map_err(|source| {
                ProfileError::Key {
                    name: config.name.clone(),
                    field: "collateral_private_key",
                    source,
                }
            })?;
        decode_wif_private_key(&config.node_operator_private_key).map_err(|source| {
            ProfileError::Key {
                name: config.name.clone(),
                field: "node_operator_private_key",
                source,
            }
        })?;

        Ok(Self {
            name: config.name.clone(),
            collateral_address: config.collateral_address.clone(),
            node_operator_private_key: config.node_operator_private_key.clone(),
            collateral_private_key: config.collateral_private_key.clone(),
            redeem_script: config.redeem_script.clone(),
            collateral_compressed: collateral_key.is_compressed(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collateral_address(&self) -> &str {
        &self.collateral_address
    }

    pub fn node_operator_private_key(&self) -> &str {
        &self.node_operator_private_key
    }

    pub fn collateral_private_key(&self) -> &str {
        &self.collateral_private_key
    }

    pub fn redeem_script(&self) -> &str {
        &self.redeem_script
    }

    /// Whether the collateral WIF carries the compression flag.
    pub fn collateral_compressed(&self) -> bool {
        self.collateral_compressed
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            name: self.name.clone(),
            collateral_address: self.collateral_address.clone(),
        }
    }
}

impl std::fmt::Debug for AddressProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressProfile")
            .field("name", &self.name)
            .field("collateral_address", &self.collateral_address)
            .field("node_operator_private_key", &"<redacted>")
            .field("collateral_private_key", &"<redacted>")
            .field("collateral_compressed", &self.collateral_compressed)
            .finish()
    }
}

/// Public view of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub name: String,
    pub collateral_address: String,
}

/// How the caller picked a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSelection {
    Explicit(String),
    Scan,
}

impl ProfileSelection {
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some(name) => ProfileSelection::Explicit(name.to_string()),
            None => ProfileSelection::Scan,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("no address profiles configured")]
    Empty,

    #[error("profile '{name}': {field}: {source}")]
    Key {
        name: String,
        field: &'static str,
        #[source]
        source: KeyError,
    },
}

/// Why no profile could sign for a collateral address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("profile '{profile}' expects address {expected}, collateral pays {actual}")]
    AddressMismatch {
        profile: String,
        expected: String,
        actual: String,
    },

    #[error("no profile matches collateral address {0}")]
    NoMatch(String),
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::UnknownProfile(_) => "UNKNOWN_PROFILE",
            ResolveError::AddressMismatch { .. } => "ADDRESS_MISMATCH",
            ResolveError::NoMatch(_) => "NO_PROFILE_MATCH",
        }
    }
}

/// Immutable, ordered set of profiles. The first is the default.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    profiles: Vec<AddressProfile>,
}

impl ProfileStore {
    pub fn from_config(configs: &[ProfileConfig]) -> Result<Self, ProfileError> {
        let profiles = configs
            .iter()
            .map(AddressProfile::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(profiles)
    }

    pub fn new(profiles: Vec<AddressProfile>) -> Result<Self, ProfileError> {
        if profiles.is_empty() {
            return Err(ProfileError::Empty);
        }
        Ok(Self { profiles })
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddressProfile> {
        self.profiles.iter()
    }

    /// The first configured profile.
    pub fn default_profile(&self) -> &AddressProfile {
        &self.profiles[0]
    }

    pub fn get(&self, name: &str) -> Option<&AddressProfile> {
        self.profiles.iter().find(|profile| profile.name == name)
    }

    /// Names and addresses only.
    pub fn list_profiles(&self) -> Vec<ProfileSummary> {
        self.profiles.iter().map(AddressProfile::summary).collect()
    }

    /// Pick the profile that signs for `collateral_address`.
    pub fn resolve(
        &self,
        selection: &ProfileSelection,
        collateral_address: &str,
    ) -> Result<&AddressProfile, ResolveError> {
        match selection {
            ProfileSelection::Explicit(name) => {
                let profile = self
                    .get(name)
                    .ok_or_else(|| ResolveError::UnknownProfile(name.clone()))?;
                if profile.collateral_address != collateral_address {
                    return Err(ResolveError::AddressMismatch {
                        profile: profile.name.clone(),
                        expected: profile.collateral_address.clone(),
                        actual: collateral_address.to_string(),
                    });
                }
                Ok(profile)
            }
            ProfileSelection::Scan => self
                .profiles
                .iter()
                .find(|profile| profile.collateral_address == collateral_address)
                .ok_or_else(|| ResolveError::NoMatch(collateral_address.to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Private key 1, compressed.
    pub(crate) const COMPRESSED_WIF: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
    /// Private key 1, uncompressed.
    pub(crate) const UNCOMPRESSED_WIF: &str = "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf";

    pub(crate) fn profile_config(name: &str, address: &str) -> ProfileConfig {
        ProfileConfig {
            name: name.to_string(),
            collateral_address: address.to_string(),
            node_operator_private_key: UNCOMPRESSED_WIF.to_string(),
            collateral_private_key: COMPRESSED_WIF.to_string(),
            redeem_script: "5221".to_string(),
        }
    }

    fn store() -> ProfileStore {
        ProfileStore::from_config(&[
            profile_config("primary", "t3aaa"),
            profile_config("secondary", "t3bbb"),
            profile_config("shadow", "t3bbb"),
        ])
        .unwrap()
    }

    #[test]
    fn test_default_is_first() {
        assert_eq!(store().default_profile().name(), "primary");
    }

    #[test]
    fn test_compression_flag_from_wif() {
        let profile = store().default_profile().clone();
        assert!(profile.collateral_compressed());

        let mut config = profile_config("u", "t3ccc");
        config.collateral_private_key = UNCOMPRESSED_WIF.to_string();
        assert!(!AddressProfile::from_config(&config).unwrap().collateral_compressed());
    }

    #[test]
    fn test_scan_returns_first_match() {
        let store = store();
        let found = store.resolve(&ProfileSelection::Scan, "t3bbb").unwrap();
        assert_eq!(found.name(), "secondary");
        assert_eq!(
            store.resolve(&ProfileSelection::Scan, "t3zzz").unwrap_err(),
            ResolveError::NoMatch("t3zzz".into())
        );
    }

    #[test]
    fn test_explicit_resolution() {
        let store = store();
        let explicit = ProfileSelection::from_name(Some("shadow"));
        assert_eq!(store.resolve(&explicit, "t3bbb").unwrap().name(), "shadow");

        let mismatch = store.resolve(&explicit, "t3aaa").unwrap_err();
        assert_eq!(mismatch.code(), "ADDRESS_MISMATCH");

        let unknown = store
            .resolve(&ProfileSelection::Explicit("ghost".into()), "t3aaa")
            .unwrap_err();
        assert_eq!(unknown, ResolveError::UnknownProfile("ghost".into()));
    }

    #[test]
    fn test_listing_and_debug_hide_secrets() {
        let store = store();
        let listing = serde_json::to_string(&store.list_profiles()).unwrap();
        assert!(listing.contains("collateralAddress"));
        assert!(!listing.contains(COMPRESSED_WIF));
        assert!(!listing.contains(UNCOMPRESSED_WIF));

        let debug = format!("{:?}", store);
        assert!(!debug.contains(COMPRESSED_WIF));
        assert!(!debug.contains(UNCOMPRESSED_WIF));
    }

    #[test]
    fn test_bad_key_and_empty_store() {
        let mut config = profile_config("broken", "t3aaa");
        config.node_operator_private_key = "not-a-key".into();
        assert!(matches!(
            AddressProfile::from_config(&config),
            Err(ProfileError::Key { field: "node_operator_private_key", .. })
        ));
        assert!(matches!(ProfileStore::new(Vec::new()), Err(ProfileError::Empty)));
    }
}
