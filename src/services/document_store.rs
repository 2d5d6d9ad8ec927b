use async_trait::async_trait;
use serde_json::Value;

use crate::error::SyncResult;

/// Result of a create-if-absent write. Both variants are success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    AlreadyExists,
}

/// Document store partitioned into named collections (indices).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Best-effort check; may report `false` for a document that exists.
    async fn exists(&self, collection: &str, id: &str) -> SyncResult<bool>;

    /// Write `document` under `id` unless one is already there.
    ///
    /// A create that loses to an existing document resolves to
    /// [`WriteOutcome::AlreadyExists`], never to an error.
    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        document: &Value,
    ) -> SyncResult<WriteOutcome>;

    async fn get(&self, collection: &str, id: &str) -> SyncResult<Option<Value>>;

    /// Replace the document stored under `id`, creating it if missing.
    async fn update(&self, collection: &str, id: &str, document: &Value) -> SyncResult<()>;
}
