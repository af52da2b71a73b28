//! Collateral output validation.
//!
//! An explorer 404 means the transaction does not exist and is a rejection.
//!
//! Rules, checked in order:
//! 1. The explorer's txid equals the requested one (ASCII case-insensitive)
//! 2. The output index exists
//! 3. The output script is `scripthash`
//! 4. The output has a first address
//! 5. The amount is an exact tier amount

use crate::blockchain::{ChainClient, ExplorerTransaction};
use crate::collateral::types::{CollateralError, RejectionReason, Tier, ValidatedCollateral};

/// Fetches collateral transactions and checks the requested output.
#[derive(Debug, Clone)]
pub struct CollateralValidator {
    chain: ChainClient,
}

impl CollateralValidator {
    pub fn new(chain: ChainClient) -> Self {
        Self { chain }
    }

    /// Look up `txid` and validate output `output_index`.
    pub async fn fetch_collateral_info(
        &self,
        txid: &str,
        output_index: u32,
    ) -> Result<ValidatedCollateral, CollateralError> {
        tracing::info!(txid = %txid, index = output_index, "Fetching collateral");

        let transaction = match self.chain.fetch_transaction(txid).await {
            Ok(transaction) => transaction,
            Err(e) if e.is_not_found() => {
                tracing::info!(txid = %txid, code = "TX_NOT_FOUND", "Collateral transaction unknown");
                return Err(RejectionReason::TxNotFound.into());
            }
            Err(e) => return Err(e.into()),
        };
        match validate_output(&transaction, txid, output_index) {
            Ok(collateral) => {
                tracing::info!(
                    txid = %txid,
                    index = output_index,
                    address = %collateral.address,
                    tier = %collateral.tier,
                    "Collateral valid"
                );
                Ok(collateral)
            }
            Err(reason) => {
                tracing::info!(
                    txid = %txid,
                    index = output_index,
                    code = reason.code(),
                    reason = %reason,
                    "Collateral rejected"
                );
                Err(reason.into())
            }
        }
    }
}

/// Apply the collateral rules to an already fetched transaction.
pub fn validate_output(
    transaction: &ExplorerTransaction,
    txid: &str,
    output_index: u32,
) -> Result<ValidatedCollateral, RejectionReason> {
    if !transaction.txid.eq_ignore_ascii_case(txid) {
        return Err(RejectionReason::TxidMismatch {
            actual: transaction.txid.clone(),
        });
    }

    let output = transaction
        .vout
        .get(output_index as usize)
        .ok_or(RejectionReason::OutputIndexOutOfRange {
            index: output_index,
            outputs: transaction.vout.len(),
        })?;

    let script = &output.script_pub_key;
    if script.script_type.as_deref() != Some("scripthash") {
        return Err(RejectionReason::NotScriptHash(script.script_type.clone()));
    }

    let address = script
        .addresses
        .first()
        .filter(|address| !address.is_empty())
        .ok_or(RejectionReason::MissingAddress)?;

    let amount = output.value.as_ref().map(|value| value.to_decimal_string());
    let tier = amount
        .as_deref()
        .and_then(Tier::from_amount)
        .ok_or_else(|| RejectionReason::InvalidAmount(amount.clone()))?;

    Ok(ValidatedCollateral {
        address: address.clone(),
        amount: amount.unwrap_or_default(),
        tier,
    })
}
