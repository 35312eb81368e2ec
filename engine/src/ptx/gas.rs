//! Pluggable gas pricing (spec section 4.2, "Gas pricing"). The default
//! strategy reads the chain's last observed base fee and applies a
//! configurable multiplier; callers supply their own `GasPricer` for
//! chains with different fee markets.

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::ptx::error::PtxError;

#[derive(Debug, Clone)]
pub enum GasPrice {
    Eip1559 { max_fee_per_gas: BigDecimal, max_priority_fee_per_gas: BigDecimal },
    Legacy { gas_price: BigDecimal },
}

#[async_trait]
pub trait GasPricer: Send + Sync {
    async fn price(&self) -> Result<GasPrice, PtxError>;

    /// Bumps a previous price by at least 12.5%, rounded up (spec
    /// section 4.2, "Resubmission").
    fn bump(&self, previous: &GasPrice) -> GasPrice {
        bump_by_min_percent(previous, 1250)
    }
}

/// `basis_points` is hundredths of a percent; 1250 == 12.5%.
fn bump_by_min_percent(previous: &GasPrice, basis_points: u32) -> GasPrice {
    let factor_num = BigDecimal::from(10_000 + basis_points);
    let factor_den = BigDecimal::from(10_000);
    let bump = |value: &BigDecimal| -> BigDecimal {
        let scaled = value * &factor_num / &factor_den;
        scaled.round(0)
    };
    match previous {
        GasPrice::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => GasPrice::Eip1559 {
            max_fee_per_gas: bump(max_fee_per_gas),
            max_priority_fee_per_gas: bump(max_priority_fee_per_gas),
        },
        GasPrice::Legacy { gas_price } => GasPrice::Legacy { gas_price: bump(gas_price) },
    }
}

/// Base fee times a configurable multiplier for `maxFeePerGas`, a fixed
/// tip for `maxPriorityFeePerGas`. Falls back to `Legacy` when the node's
/// last-seen base fee is unavailable.
pub struct Eip1559GasPricer {
    pub rpc_url: String,
    pub base_fee_multiplier: f64,
    pub priority_fee_gwei: u64,
}

#[async_trait]
impl GasPricer for Eip1559GasPricer {
    async fn price(&self) -> Result<GasPrice, PtxError> {
        use alloy::providers::{Provider, ProviderBuilder};

        let url = self.rpc_url.parse().map_err(|e| PtxError::GasPricing(format!("{e}")))?;
        let provider = ProviderBuilder::new().on_http(url);
        let base_fee = provider
            .get_gas_price()
            .await
            .map_err(|e| PtxError::GasPricing(e.to_string()))?;

        let base = BigDecimal::from(base_fee);
        let multiplier = BigDecimal::try_from(self.base_fee_multiplier)
            .map_err(|e| PtxError::GasPricing(e.to_string()))?;
        let max_fee = (base * multiplier).round(0);
        let tip = BigDecimal::from(self.priority_fee_gwei) * BigDecimal::from(1_000_000_000u64);

        Ok(GasPrice::Eip1559 { max_fee_per_gas: max_fee, max_priority_fee_per_gas: tip })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn bump_rounds_up_to_at_least_12_5_percent() {
        let previous = GasPrice::Legacy { gas_price: BigDecimal::from_str("100").unwrap() };
        let bumped = bump_by_min_percent(&previous, 1250);
        match bumped {
            GasPrice::Legacy { gas_price } => {
                assert_eq!(gas_price, BigDecimal::from_str("113").unwrap());
            }
            _ => panic!("expected legacy"),
        }
    }

    #[test]
    fn bump_scales_both_eip1559_fields() {
        let previous = GasPrice::Eip1559 {
            max_fee_per_gas: BigDecimal::from_str("1000").unwrap(),
            max_priority_fee_per_gas: BigDecimal::from_str("20").unwrap(),
        };
        match bump_by_min_percent(&previous, 1250) {
            GasPrice::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => {
                assert_eq!(max_fee_per_gas, BigDecimal::from_str("1125").unwrap());
                assert_eq!(max_priority_fee_per_gas, BigDecimal::from_str("23").unwrap());
            }
            _ => panic!("expected eip1559"),
        }
    }
}
