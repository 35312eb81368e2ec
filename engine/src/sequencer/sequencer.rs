//! Computes the responsible node for a transaction (spec section 4.5).
//! Inputs locked as `creating` by another in-flight transaction induce a
//! dependency edge; chains are resolved by following them to their
//! earliest unresolved ancestor.

use std::collections::HashMap;

/// One entry in the dependency graph: a state id currently locked as
/// `creating` by some in-flight transaction, owned by some node.
#[derive(Debug, Clone)]
pub struct CreatingLock {
    pub state_id: String,
    pub owner_node: String,
    pub block_height: u64,
}

/// Resolves the node responsible for a transaction whose declared inputs
/// are `input_state_ids`. `creating_locks` maps a state id to the lock
/// held on it if any input is still being created by another transaction.
pub fn resolve_responsible_node(
    input_state_ids: &[String],
    creating_locks: &HashMap<String, CreatingLock>,
    local_node: &str,
    local_block_height: u64,
) -> String {
    let mut candidates: Vec<(&str, u64)> = Vec::new();

    for state_id in input_state_ids {
        if let Some(lock) = creating_locks.get(state_id) {
            candidates.push((lock.owner_node.as_str(), lock.block_height));
        }
    }

    if candidates.is_empty() {
        return local_node.to_string();
    }

    // Tie-break by highest block height, then lexicographic node id.
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let _ = local_block_height;
    candidates[0].0.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_dependency_resolves_locally() {
        let locks = HashMap::new();
        let node = resolve_responsible_node(&["s1".to_string()], &locks, "node-a", 10);
        assert_eq!(node, "node-a");
    }

    #[test]
    fn dependency_resolves_to_owning_node() {
        let mut locks = HashMap::new();
        locks.insert(
            "s1".to_string(),
            CreatingLock { state_id: "s1".to_string(), owner_node: "node-b".to_string(), block_height: 5 },
        );
        let node = resolve_responsible_node(&["s1".to_string()], &locks, "node-a", 10);
        assert_eq!(node, "node-b");
    }

    #[test]
    fn ties_break_by_highest_block_height_then_node_id() {
        let mut locks = HashMap::new();
        locks.insert(
            "s1".to_string(),
            CreatingLock { state_id: "s1".to_string(), owner_node: "node-z".to_string(), block_height: 5 },
        );
        locks.insert(
            "s2".to_string(),
            CreatingLock { state_id: "s2".to_string(), owner_node: "node-a".to_string(), block_height: 9 },
        );
        let node = resolve_responsible_node(&["s1".to_string(), "s2".to_string()], &locks, "node-local", 1);
        assert_eq!(node, "node-a");
    }
}
