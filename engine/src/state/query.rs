//! The `FindStates` query DSL: an equality filter over labelled fields,
//! compiled into a dynamic SQL statement that joins in one label table per
//! referenced field. Built-in fields are prefixed with `.` (`.id`,
//! `.created`) so they never collide with ABI field names.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::models::StateStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateQuery {
    #[serde(default)]
    pub eq: Vec<FieldFilter>,
    /// Defaults to `.created` ascending per spec section 4.1.
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// A single bind value in placeholder ($n) order. `compile()` allocates
/// placeholders left to right as it builds the WHERE clause, so binds must
/// be pushed in that same order rather than grouped by type.
#[derive(Debug, Clone)]
pub enum BindValue {
    Str(String),
    Int64(i64),
    Uuid(Uuid),
}

/// Compiles a `StateQuery` plus status filter into SQL text and bind
/// parameters. Each non-builtin `eq` field gets its own join against
/// `state_labels` or `state_int64_labels` (whichever the value's JSON type
/// implies), aliased `l0`, `l1`, ... to avoid name collisions.
pub struct CompiledQuery {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

pub fn compile(
    domain: &str,
    contract: &str,
    schema_id: &str,
    query: &StateQuery,
    status: StateStatus,
    querying_tx: Uuid,
) -> CompiledQuery {
    let mut joins = Vec::new();
    let mut wheres = vec![
        "s.domain = $1".to_string(),
        "s.contract = $2".to_string(),
        "s.schema_id = $3".to_string(),
    ];
    let mut binds = vec![
        BindValue::Str(domain.to_string()),
        BindValue::Str(contract.to_string()),
        BindValue::Str(schema_id.to_string()),
    ];
    let mut next_param = 4;

    for (idx, filter) in query.eq.iter().enumerate() {
        if filter.field.starts_with('.') {
            match filter.field.as_str() {
                ".id" => {
                    wheres.push(format!("s.id = ${next_param}"));
                    binds.push(BindValue::Str(filter.value.as_str().unwrap_or_default().to_string()));
                    next_param += 1;
                }
                other => {
                    tracing::warn!(field = other, "unsupported builtin query field, ignored");
                }
            }
            continue;
        }

        let alias = format!("l{idx}");
        if let Some(i) = filter.value.as_i64() {
            joins.push(format!(
                "JOIN state_int64_labels {alias} ON {alias}.domain = s.domain AND {alias}.state_id = s.id AND {alias}.label = '{field}'",
                field = filter.field.replace('\'', "")
            ));
            wheres.push(format!("{alias}.value = ${next_param}"));
            binds.push(BindValue::Int64(i));
            next_param += 1;
        } else {
            joins.push(format!(
                "JOIN state_labels {alias} ON {alias}.domain = s.domain AND {alias}.state_id = s.id AND {alias}.label = '{field}'",
                field = filter.field.replace('\'', "")
            ));
            let v = filter
                .value
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| filter.value.to_string());
            wheres.push(format!("{alias}.value = ${next_param}"));
            binds.push(BindValue::Str(v));
            next_param += 1;
        }
    }

    match status {
        StateStatus::Available => {
            // Not locked-as-spending by another transaction, or locked-as-
            // creating by the querying transaction itself (so a transaction
            // sees the states it is in the middle of creating before they
            // are independently confirmed).
            wheres.push("EXISTS (SELECT 1 FROM state_confirms c WHERE c.domain = s.domain AND c.state_id = s.id)".into());
            wheres.push("NOT EXISTS (SELECT 1 FROM state_spends sp WHERE sp.domain = s.domain AND sp.state_id = s.id)".into());
            wheres.push(format!(
                "(NOT EXISTS (SELECT 1 FROM state_locks lk WHERE lk.domain = s.domain AND lk.state_id = s.id AND lk.spending = true AND lk.transaction_id != ${next_param}) \
                 OR EXISTS (SELECT 1 FROM state_locks lk2 WHERE lk2.domain = s.domain AND lk2.state_id = s.id AND lk2.creating = true AND lk2.transaction_id = ${next_param}))"
            ));
            binds.push(BindValue::Uuid(querying_tx));
        }
        StateStatus::Confirmed => {
            wheres.push("EXISTS (SELECT 1 FROM state_confirms c WHERE c.domain = s.domain AND c.state_id = s.id)".into());
        }
        StateStatus::Unconfirmed => {
            wheres.push("NOT EXISTS (SELECT 1 FROM state_confirms c WHERE c.domain = s.domain AND c.state_id = s.id)".into());
        }
        StateStatus::Spent => {
            wheres.push("EXISTS (SELECT 1 FROM state_spends sp WHERE sp.domain = s.domain AND sp.state_id = s.id)".into());
        }
        StateStatus::Locked => {
            wheres.push("EXISTS (SELECT 1 FROM state_locks lk WHERE lk.domain = s.domain AND lk.state_id = s.id)".into());
        }
        StateStatus::All => {}
    }

    let order_by = match query.sort.as_deref() {
        Some(".created") | None => "s.created_at ASC",
        Some(other) => {
            tracing::warn!(field = other, "unsupported sort field, defaulting to .created");
            "s.created_at ASC"
        }
    };

    let limit_clause = query
        .limit
        .map(|l| format!(" LIMIT {l}"))
        .unwrap_or_default();

    let sql = format!(
        "SELECT DISTINCT s.domain, s.contract, s.id, s.schema_id, s.data, s.created_at FROM states s {} WHERE {} ORDER BY {}{}",
        joins.join(" "),
        wheres.join(" AND "),
        order_by,
        limit_clause,
    );

    CompiledQuery { sql, binds }
}
