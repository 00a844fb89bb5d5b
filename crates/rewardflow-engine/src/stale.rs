//! Stale-Object Selection
//!
//! Decides which history objects a worker re-reads for a pass. The listing
//! of incoming markers is available to implementations so a future policy
//! can restrict reads to the time region the incoming events touch. The
//! exact windowing semantics are still undecided, so the only shipped
//! implementation is the identity pass.

use rewardflow_storage::StoredObject;

/// Strategy seam for narrowing the set of history objects a pass reads.
pub trait StaleObjectFilter: Send + Sync {
    /// Select the objects to process. `incoming_markers` holds the pending
    /// marker keys for the shard; implementations may use them to bound the
    /// read set.
    fn select(&self, objects: Vec<StoredObject>, incoming_markers: &[String]) -> Vec<StoredObject>;
}

/// Read everything. The reward window spans object boundaries, so the safe
/// default is to re-read the whole shard.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadAll;

impl StaleObjectFilter for ReadAll {
    fn select(&self, objects: Vec<StoredObject>, _incoming_markers: &[String]) -> Vec<StoredObject> {
        objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_all_is_identity() {
        let objects = vec![
            StoredObject {
                key: "histories/p/0/2024/03/01/a.jsonl.gz".to_string(),
                size: 10,
            },
            StoredObject {
                key: "histories/p/0/2024/03/02/b.jsonl.gz".to_string(),
                size: 20,
            },
        ];
        let selected = ReadAll.select(objects.clone(), &["incoming/p/0/x.json".to_string()]);
        assert_eq!(selected, objects);
    }
}
