//! Startup cross-check of redeem scripts against collateral addresses.

use crate::blockchain::encoding::{decode_hex, script_hash_address};
use crate::profiles::store::AddressProfile;

/// P2SH address of the profile's redeem script, if the script is valid hex.
pub fn redeem_script_address(profile: &AddressProfile, version: [u8; 2]) -> Option<String> {
    decode_hex(profile.redeem_script())
        .ok()
        .map(|script| script_hash_address(&script, version))
}

/// Warn for every profile whose redeem script does not hash to its address.
///
/// Returns the names of the mismatching profiles.
pub fn check_redeem_scripts<'a>(
    profiles: impl IntoIterator<Item = &'a AddressProfile>,
    version: [u8; 2],
) -> Vec<String> {
    let mut mismatched = Vec::new();
    for profile in profiles {
        match redeem_script_address(profile, version) {
            Some(derived) if derived == profile.collateral_address() => {}
            derived => {
                tracing::warn!(
                    profile = %profile.name(),
                    collateral_address = %profile.collateral_address(),
                    derived_address = ?derived,
                    "Redeem script does not match collateral address"
                );
                mismatched.push(profile.name().to_string());
            }
        }
    }
    mismatched
}
