//! Object-Store Adapter
//!
//! [`RecordStore`] wraps an injected `Arc<dyn ObjectStore>` with the
//! operations the pipeline needs: shard enumeration, size-aware object
//! listing, gzip-JSONL and plain-JSON reads/writes, and bulk deletes.
//!
//! Shards are enumerated as the first level of common prefixes below a
//! project, so a shard exists exactly as long as it holds at least one
//! object.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde_json::Value;

use crate::error::Result;
use crate::jsonl;
use crate::naming;

/// A stored object key with its size in bytes, as returned by listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
}

/// Thin adapter over the object store. Cheap to clone.
#[derive(Clone)]
pub struct RecordStore {
    store: Arc<dyn ObjectStore>,
}

impl RecordStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// All shards with history objects for a project, sorted.
    pub async fn list_all_shards(&self, project: &str) -> Result<Vec<String>> {
        self.list_child_prefixes(&format!("{}/{project}", naming::HISTORIES_PREFIX))
            .await
    }

    /// All shards with pending incoming markers for a project, sorted.
    pub async fn list_all_incoming_history_shards(&self, project: &str) -> Result<Vec<String>> {
        self.list_child_prefixes(&format!("{}/{project}", naming::INCOMING_PREFIX))
            .await
    }

    /// All history objects for a shard, with size metadata, sorted by key.
    pub async fn list_history_shard_objects(
        &self,
        project: &str,
        shard: &str,
    ) -> Result<Vec<StoredObject>> {
        let prefix = ObjectPath::from(naming::history_shard_prefix(project, shard));
        let mut objects: Vec<StoredObject> = self
            .store
            .list(Some(&prefix))
            .map_ok(|meta| StoredObject {
                key: meta.location.to_string(),
                size: meta.size as u64,
            })
            .try_collect()
            .await?;
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    /// All incoming marker keys for a shard, sorted.
    pub async fn list_incoming_marker_keys(
        &self,
        project: &str,
        shard: &str,
    ) -> Result<Vec<String>> {
        let prefix = ObjectPath::from(naming::incoming_shard_prefix(project, shard));
        let mut keys: Vec<String> = self
            .store
            .list(Some(&prefix))
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await?;
        keys.sort();
        Ok(keys)
    }

    /// All object keys under an arbitrary prefix, sorted.
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = ObjectPath::from(prefix);
        let mut keys: Vec<String> = self
            .store
            .list(Some(&prefix))
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await?;
        keys.sort();
        Ok(keys)
    }

    /// Read a gzip-JSONL object.
    pub async fn get_json_lines(&self, key: &str) -> Result<Vec<Value>> {
        let bytes = self
            .store
            .get(&ObjectPath::from(key))
            .await?
            .bytes()
            .await?;
        jsonl::decode_lines(&bytes)
    }

    /// Write a gzip-JSONL object.
    pub async fn put_json_lines(&self, key: &str, records: &[Value]) -> Result<()> {
        let bytes = jsonl::encode_lines(records)?;
        self.store
            .put(&ObjectPath::from(key), bytes.into())
            .await?;
        Ok(())
    }

    /// Read a plain JSON object (markers, registry entries).
    pub async fn get_json(&self, key: &str) -> Result<Value> {
        let bytes = self
            .store
            .get(&ObjectPath::from(key))
            .await?
            .bytes()
            .await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write a plain JSON object.
    pub async fn put_json(&self, key: &str, value: &Value) -> Result<()> {
        let bytes = Bytes::from(serde_json::to_vec(value)?);
        self.store
            .put(&ObjectPath::from(key), bytes.into())
            .await?;
        Ok(())
    }

    /// Delete every listed key, concurrently.
    pub async fn delete_keys(&self, keys: &[String]) -> Result<()> {
        try_join_all(keys.iter().map(|key| {
            let store = self.store.clone();
            let path = ObjectPath::from(key.as_str());
            async move { store.delete(&path).await }
        }))
        .await?;
        Ok(())
    }

    async fn list_child_prefixes(&self, parent: &str) -> Result<Vec<String>> {
        let parent = ObjectPath::from(parent);
        let listing = self.store.list_with_delimiter(Some(&parent)).await?;
        let mut children: Vec<String> = listing
            .common_prefixes
            .iter()
            .filter_map(|prefix| prefix.parts().last().map(|part| part.as_ref().to_string()))
            .collect();
        children.sort();
        Ok(children)
    }
}
