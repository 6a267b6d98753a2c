use prometheus::{
    register_gauge_with_registry, register_int_counter_with_registry, Gauge, IntCounter, Registry,
};

use crate::error::SinkError;
use crate::logging::LogContext;
use crate::models::DepositRecord;

pub const TRANSACTIONS_TOTAL: &str = "deposit_transactions_total";
pub const GAS_PRICE_GWEI: &str = "deposit_gas_price_gwei";
pub const TRANSACTION_VALUE_NATIVE: &str = "deposit_transaction_value_native";

#[derive(Clone, Debug)]
pub struct DepositMetrics {
    pub(crate) transactions_total: IntCounter,
    pub(crate) gas_price_gwei: Gauge,
    pub(crate) transaction_value_native: Gauge,
}

impl DepositMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            transactions_total: register_int_counter_with_registry!(
                TRANSACTIONS_TOTAL,
                "Total number of deposit transactions resolved",
                registry,
            )?,
            gas_price_gwei: register_gauge_with_registry!(
                GAS_PRICE_GWEI,
                "Gas price of the latest deposit transaction in gwei",
                registry,
            )?,
            transaction_value_native: register_gauge_with_registry!(
                TRANSACTION_VALUE_NATIVE,
                "Value of the latest deposit transaction in native units",
                registry,
            )?,
        })
    }

    /// Count the deposit and set both gauges.
    ///
    /// The counter always advances. A gauge whose source value does not parse
    /// to a finite number keeps its previous value and the first such value is
    /// reported back.
    pub fn record(&self, record: &DepositRecord) -> Result<(), SinkError> {
        self.transactions_total.inc();

        let gas_price = set_gauge(&self.gas_price_gwei, GAS_PRICE_GWEI, &record.gas_price, &record.hash);
        let value = set_gauge(
            &self.transaction_value_native,
            TRANSACTION_VALUE_NATIVE,
            &record.value,
            &record.hash,
        );

        gas_price.and(value)
    }

    pub fn transactions_total(&self) -> u64 {
        self.transactions_total.get()
    }

    pub fn gas_price_gwei(&self) -> f64 {
        self.gas_price_gwei.get()
    }

    pub fn transaction_value_native(&self) -> f64 {
        self.transaction_value_native.get()
    }
}

fn set_gauge(gauge: &Gauge, metric: &str, raw: &str, tx_hash: &str) -> Result<(), SinkError> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => {
            gauge.set(value);
            Ok(())
        }
        _ => {
            LogContext::new("metrics", "set_gauge")
                .with_transaction_hash(tx_hash)
                .with_metadata("metric", serde_json::json!(metric))
                .warn(&format!("Skipping invalid value '{}' for {}", raw, metric));
            Err(SinkError::InvalidMetric {
                metric: metric.to_string(),
                value: raw.to_string(),
            })
        }
    }
}
