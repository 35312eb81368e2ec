//! The content-addressed state store. Writes for a given `(domain,
//! contract)` pair are queued into an in-memory pending batch and flushed
//! to Postgres by that pair's owning writer; a read within the same domain
//! context also consults the pending batch so callers observe their own
//! writes before the flush returns (spec section 4.1, "Concurrency").

use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use paladin_types::{derive_label, derive_state_id, LabelValue, Schema, SchemaField};

use crate::state::db;
use crate::state::error::StateStoreError;
use crate::state::models::{NullifierRow, SchemaRow, StateRow, StateStatus};
use crate::state::query::{self, StateQuery};

#[derive(Clone)]
struct PendingWrite {
    row: StateRow,
    labels: Vec<(SchemaField, Option<LabelValue>)>,
}

pub struct StateStore {
    pool: PgPool,
    pending: DashMap<(String, String), Vec<PendingWrite>>,
}

impl StateStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            pending: DashMap::new(),
        }
    }

    /// Registers a schema if it is not already known. Idempotent: the same
    /// definition always produces the same id and registering it twice is
    /// a no-op.
    pub async fn ensure_schema(
        &self,
        domain: &str,
        schema: &Schema,
    ) -> Result<String, StateStoreError> {
        let id_bytes = schema.id();
        let id = format!("0x{}", hex::encode(id_bytes));
        let row = SchemaRow {
            domain: domain.to_string(),
            id: id.clone(),
            struct_name: schema.struct_name.clone(),
            definition: serde_json::to_value(&schema.fields).unwrap_or(serde_json::Value::Null),
            canonical_sig: schema.canonical_signature(),
            created_at: chrono::Utc::now(),
        };
        db::insert_schema(&self.pool, &row).await?;
        Ok(id)
    }

    async fn load_schema(&self, domain: &str, schema_id: &str) -> Result<Schema, StateStoreError> {
        let row = db::get_schema(&self.pool, domain, schema_id)
            .await?
            .ok_or_else(|| StateStoreError::SchemaNotFound {
                domain: domain.to_string(),
                id: schema_id.to_string(),
            })?;
        let fields: Vec<SchemaField> = serde_json::from_value(row.definition)
            .map_err(|e| StateStoreError::InvalidStateData(e.to_string()))?;
        Schema::new(row.struct_name, fields).map_err(StateStoreError::Types)
    }

    /// Parses `data` through the schema, computes the content-addressed
    /// state id (unless `id_override` is given), derives labels, and
    /// queues the write. Returns the state id.
    pub async fn persist_state(
        &self,
        domain: &str,
        contract: &str,
        schema_id: &str,
        data: &serde_json::Value,
        id_override: Option<[u8; 32]>,
    ) -> Result<String, StateStoreError> {
        let schema = self.load_schema(domain, schema_id).await?;

        let canonical = paladin_types::abi::canonicalise(&schema, data)?;
        let state_id_bytes = match id_override {
            Some(id) => id,
            None => derive_state_id(&schema, data)?,
        };
        let state_id = format!("0x{}", hex::encode(state_id_bytes));

        let mut labels = Vec::new();
        for field in &schema.fields {
            let raw = data.get(&field.name);
            let label = match raw {
                Some(v) => derive_label(field, v)?,
                None => None,
            };
            labels.push((field.clone(), label));
        }

        let row = StateRow {
            domain: domain.to_string(),
            contract: contract.to_string(),
            id: state_id.clone(),
            schema_id: schema_id.to_string(),
            data: canonical,
            created_at: chrono::Utc::now(),
        };

        self.pending
            .entry((domain.to_string(), contract.to_string()))
            .or_default()
            .push(PendingWrite {
                row: row.clone(),
                labels,
            });

        crate::metrics::record_state_persisted(domain);
        Ok(state_id)
    }

    /// Flushes every pending write queued for `(domain, contract)` to
    /// Postgres. Idempotent: conflicting state ids are silently ignored
    /// (the row already exists with identical content by construction).
    pub async fn flush(&self, domain: &str, contract: &str) -> Result<(), StateStoreError> {
        let key = (domain.to_string(), contract.to_string());
        let Some((_, writes)) = self.pending.remove(&key) else {
            return Ok(());
        };

        for write in writes {
            let inserted = db::insert_state(&self.pool, &write.row).await?;
            if !inserted {
                continue;
            }
            for (field, label) in &write.labels {
                match label {
                    Some(LabelValue::Str(s)) => {
                        db::insert_string_label(&self.pool, domain, &write.row.id, &field.name, s)
                            .await?;
                    }
                    Some(LabelValue::Int64(i)) => {
                        db::insert_int64_label(&self.pool, domain, &write.row.id, &field.name, *i)
                            .await?;
                    }
                    None => {}
                }
            }
        }
        Ok(())
    }

    /// Reads matching states, consulting both the durable table and this
    /// caller's own not-yet-flushed writes for the same `(domain,
    /// contract)` (read-your-writes).
    pub async fn find_states(
        &self,
        domain: &str,
        contract: &str,
        schema_id: &str,
        query: &StateQuery,
        status: StateStatus,
        querying_tx: Uuid,
    ) -> Result<Vec<StateRow>, StateStoreError> {
        let compiled = query::compile(domain, contract, schema_id, query, status, querying_tx);
        let mut rows = db::run_compiled_query(&self.pool, &compiled).await?;

        if let Some(pending) = self.pending.get(&(domain.to_string(), contract.to_string())) {
            for write in pending.iter() {
                if write.row.schema_id == schema_id
                    && matches_query(write, query)
                    && !rows.iter().any(|r| r.id == write.row.id)
                {
                    rows.push(write.row.clone());
                }
            }
        }
        Ok(rows)
    }

    pub async fn mark_confirmed(
        &self,
        domain: &str,
        state_id: &str,
        transaction_id: Uuid,
    ) -> Result<(), StateStoreError> {
        db::mark_confirmed(&self.pool, domain, state_id, transaction_id).await
    }

    pub async fn mark_spent(
        &self,
        domain: &str,
        state_id: &str,
        transaction_id: Uuid,
    ) -> Result<(), StateStoreError> {
        db::mark_spent(&self.pool, domain, state_id, transaction_id).await
    }

    pub async fn mark_locked(
        &self,
        domain: &str,
        state_id: &str,
        transaction_id: Uuid,
        creating: bool,
        spending: bool,
    ) -> Result<(), StateStoreError> {
        db::mark_locked(&self.pool, domain, state_id, transaction_id, creating, spending).await
    }

    /// Clears every lock held by `transaction_id`, per the Assemble stage's
    /// reset-and-requeue path on state conflict.
    pub async fn reset_transaction(&self, transaction_id: Uuid) -> Result<(), StateStoreError> {
        db::reset_transaction_locks(&self.pool, transaction_id).await
    }

    pub async fn is_locked_spending_by_other(
        &self,
        domain: &str,
        state_id: &str,
        transaction_id: Uuid,
    ) -> Result<bool, StateStoreError> {
        db::is_locked_spending_by_other(&self.pool, domain, state_id, transaction_id).await
    }

    /// Records a nullifier disclosed against `state_id`, per the "written
    /// when disclosed" behavior of the Nullifier entity (spec section 4.1).
    pub async fn publish_nullifier(
        &self,
        domain: &str,
        state_id: &str,
        nullifier_id: &str,
        opaque_bytes: &[u8],
    ) -> Result<(), StateStoreError> {
        db::insert_nullifier(&self.pool, domain, state_id, nullifier_id, opaque_bytes).await
    }

    /// `FindAvailableNullifiers`: nullifiers disclosed against states of
    /// `schema_id` that have not yet been recorded spent.
    pub async fn find_available_nullifiers(
        &self,
        domain: &str,
        contract: &str,
        schema_id: &str,
    ) -> Result<Vec<NullifierRow>, StateStoreError> {
        db::find_available_nullifiers(&self.pool, domain, contract, schema_id).await
    }
}

/// Best-effort in-memory filter over a pending (not-yet-flushed) write, for
/// read-your-writes visibility only; the durable query does the real work.
fn matches_query(write: &PendingWrite, query: &StateQuery) -> bool {
    query.eq.iter().all(|filter| {
        if filter.field.starts_with('.') {
            return true;
        }
        write.row.data.get(&filter.field) == Some(&filter.value)
            || write
                .row
                .data
                .get(&filter.field)
                .and_then(|v| v.as_str())
                .map(|s| Some(s) == filter.value.as_str())
                .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use paladin_types::AbiType;

    fn sample_schema() -> Schema {
        Schema::new(
            "Token",
            vec![
                SchemaField { name: "owner".into(), ty: AbiType::Address, indexed: true },
                SchemaField { name: "amount".into(), ty: AbiType::Uint(256), indexed: true },
            ],
        )
        .unwrap()
    }

    #[test]
    fn schema_id_is_deterministic_across_instances() {
        let a = sample_schema();
        let b = sample_schema();
        assert_eq!(a.id(), b.id());
    }
}
