//! Signs and submits a prepared public transaction to the base ledger,
//! grounded in the teacher's `writers/evm.rs::submit_approval`.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use std::str::FromStr;

use crate::ptx::error::PtxError;
use crate::ptx::gas::GasPrice;
use crate::ptx::models::PublicTransactionRow;

/// Builds, signs and sends the transaction described by `row` at `nonce`
/// with `gas`; returns the submitted transaction hash without waiting for
/// a receipt (confirmation is reconciled separately via the indexer).
pub async fn submit(
    rpc_url: &str,
    signer: &PrivateKeySigner,
    row: &PublicTransactionRow,
    nonce: u64,
    gas: &GasPrice,
) -> Result<String, PtxError> {
    let wallet = EthereumWallet::from(signer.clone());
    let provider = ProviderBuilder::new()
        .wallet(wallet)
        .on_http(rpc_url.parse().map_err(|e| PtxError::Submission(format!("{e}")))?);

    let to = Address::from_str(&row.to_address)
        .map_err(|e| PtxError::Submission(format!("invalid to address: {e}")))?;

    let mut tx = TransactionRequest::default()
        .with_to(to)
        .with_nonce(nonce)
        .with_gas_limit(row.gas_limit as u64)
        .with_input(Bytes::from(row.data.clone()));

    tx = match gas {
        GasPrice::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => tx
            .with_max_fee_per_gas(big_decimal_to_u128(max_fee_per_gas))
            .with_max_priority_fee_per_gas(big_decimal_to_u128(max_priority_fee_per_gas)),
        GasPrice::Legacy { gas_price } => tx.with_gas_price(big_decimal_to_u128(gas_price)),
    };

    let pending = provider
        .send_transaction(tx)
        .await
        .map_err(|e| PtxError::Submission(e.to_string()))?;

    Ok(format!("{:#x}", *pending.tx_hash()))
}

fn big_decimal_to_u128(value: &bigdecimal::BigDecimal) -> u128 {
    value.to_string().parse::<U256>().map(|v| v.to::<u128>()).unwrap_or(0)
}
