//! Hand-written queries against the public transaction tables, same style
//! as the state store's `db.rs`.

use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::ptx::error::PtxError;
use crate::ptx::models::{NewPublicTransaction, PublicTransactionRow, SubStatusAction};

pub async fn insert(
    pool: &PgPool,
    new_tx: &NewPublicTransaction,
    nonce: i64,
    max_fee_per_gas: Option<&BigDecimal>,
    max_priority_fee_per_gas: Option<&BigDecimal>,
    gas_price: Option<&BigDecimal>,
) -> Result<(), PtxError> {
    sqlx::query(
        "INSERT INTO public_transactions \
         (id, signer, nonce, from_address, to_address, data, max_fee_per_gas, \
          max_priority_fee_per_gas, gas_price, gas_limit, status, submitted_hashes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', '[]')",
    )
    .bind(new_tx.id)
    .bind(&new_tx.signer)
    .bind(nonce)
    .bind(&new_tx.from_address)
    .bind(&new_tx.to_address)
    .bind(&new_tx.data)
    .bind(max_fee_per_gas)
    .bind(max_priority_fee_per_gas)
    .bind(gas_price)
    .bind(new_tx.gas_limit)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<PublicTransactionRow>, PtxError> {
    let row = sqlx::query_as::<_, PublicTransactionRow>(
        "SELECT id, signer, nonce, from_address, to_address, data, max_fee_per_gas, \
         max_priority_fee_per_gas, gas_price, gas_limit, status, submitted_hashes, \
         created_at, updated_at FROM public_transactions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn pending_for_signer(
    pool: &PgPool,
    signer: &str,
) -> Result<Vec<PublicTransactionRow>, PtxError> {
    let rows = sqlx::query_as::<_, PublicTransactionRow>(
        "SELECT id, signer, nonce, from_address, to_address, data, max_fee_per_gas, \
         max_priority_fee_per_gas, gas_price, gas_limit, status, submitted_hashes, \
         created_at, updated_at FROM public_transactions \
         WHERE signer = $1 AND status = 'pending' ORDER BY nonce ASC",
    )
    .bind(signer)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn append_submitted_hash(
    pool: &PgPool,
    id: Uuid,
    hash: &str,
    gas_price: Option<&BigDecimal>,
    max_fee_per_gas: Option<&BigDecimal>,
) -> Result<(), PtxError> {
    sqlx::query(
        "UPDATE public_transactions \
         SET submitted_hashes = submitted_hashes || to_jsonb($2::text), \
             gas_price = COALESCE($3, gas_price), \
             max_fee_per_gas = COALESCE($4, max_fee_per_gas), \
             updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(hash)
    .bind(gas_price)
    .bind(max_fee_per_gas)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_status(pool: &PgPool, id: Uuid, status: &str) -> Result<(), PtxError> {
    sqlx::query("UPDATE public_transactions SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn append_substatus(
    pool: &PgPool,
    id: Uuid,
    action: SubStatusAction,
    payload: Option<serde_json::Value>,
) -> Result<(), PtxError> {
    sqlx::query(
        "INSERT INTO public_tx_substatus (pub_tx_id, seq, sub_status, action, payload) \
         VALUES ($1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM public_tx_substatus WHERE pub_tx_id = $1), \
          $2, $2, $3)",
    )
    .bind(id)
    .bind(action.as_str())
    .bind(payload)
    .execute(pool)
    .await?;
    Ok(())
}
