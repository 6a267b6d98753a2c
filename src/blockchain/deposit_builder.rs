use chrono::{SecondsFormat, TimeZone, Utc};

use crate::blockchain::units::{format_ether, format_gwei};
use crate::error::MalformedInput;
use crate::models::{DepositRecord, ResolvedTx};

/// Turns a resolved transaction into the canonical deposit record. No I/O.
pub struct DepositRecordBuilder;

impl DepositRecordBuilder {
    pub fn build(resolved: &ResolvedTx) -> Result<DepositRecord, MalformedInput> {
        let tx = &resolved.transaction;

        Ok(DepositRecord {
            block_number: resolved.block.number,
            block_timestamp: resolved.block.timestamp,
            fee: format_ether(resolved.gas_fee),
            hash: tx.hash.clone(),
            pubkey: tx.from.clone(),
            from: tx.from.clone(),
            to: tx.to.clone(),
            value: format_ether(tx.value),
            gas_price: format_gwei(tx.gas_price)
                .map_err(|e| MalformedInput::new("gasPrice", e.to_string()))?,
            formatted_timestamp: iso_timestamp(resolved.block.timestamp)?,
        })
    }
}

/// UTC ISO-8601 with millisecond precision and a `Z` suffix
pub fn iso_timestamp(unix_seconds: u64) -> Result<String, MalformedInput> {
    let seconds = i64::try_from(unix_seconds).map_err(|_| out_of_range(unix_seconds))?;

    Utc.timestamp_opt(seconds, 0)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| out_of_range(unix_seconds))
}

fn out_of_range(unix_seconds: u64) -> MalformedInput {
    MalformedInput::new(
        "blockTimestamp",
        format!("{} is outside the representable date range", unix_seconds),
    )
}
