//! Replicating store that writes to two backends at once.
//!
//! [`TeeStore`] is used to migrate between backends or to keep a redundant
//! copy. Every operation runs against both inner stores concurrently and
//! waits for both. There is no cross-backend transaction: when one side fails
//! and the other succeeds, the stores diverge and the caller gets a single
//! [`StoreErrorKind::PartialReplication`] error without a rollback.
//!
//! Result precedence is fixed: `first` wins whenever it succeeds, and its
//! error is the one reported when both fail.

use std::sync::Arc;

use async_trait::async_trait;

use crate::id::PostingId;
use crate::storage::{PostingStore, StoreError, StoreErrorKind, StoredPosting, WalkFn};

/// Backend identifier for error messages.
const BACKEND: &str = "Tee";

/// Store that fans every operation out to two inner stores.
pub struct TeeStore {
    first: Arc<dyn PostingStore>,
    second: Arc<dyn PostingStore>,
}

impl TeeStore {
    /// Wrap two stores. Naming implies no preference beyond result precedence.
    #[must_use]
    pub fn new(first: Arc<dyn PostingStore>, second: Arc<dyn PostingStore>) -> Self {
        Self { first, second }
    }

    /// Combine the outcomes of a mutation applied to both stores.
    fn merge_writes<T>(
        first: Result<T, StoreError>,
        second: Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match (first, second) {
            (Ok(value), Ok(_)) => Ok(value),
            (Err(e1), Err(e2)) => {
                tracing::warn!(second = %e2, "both replicas failed");
                Err(e1)
            }
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => {
                tracing::warn!(error = %e, "replicas diverged");
                let id = e.id();
                let mut err = StoreError::new(StoreErrorKind::PartialReplication)
                    .with_backend(BACKEND)
                    .with_source(e);
                if let Some(id) = id {
                    err = err.with_id(id);
                }
                Err(err)
            }
        }
    }

    /// Combine the outcomes of a read: `first` wins if it succeeded.
    fn merge_reads<T>(
        first: Result<T, StoreError>,
        second: Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match first {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!(error = %e, "first replica failed, using second");
                second
            }
        }
    }
}

#[async_trait]
impl PostingStore for TeeStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn create(&self, posting: &StoredPosting) -> Result<usize, StoreError> {
        let (a, b) = tokio::join!(self.first.create(posting), self.second.create(posting));
        Self::merge_writes(a, b)
    }

    async fn read(&self, id: PostingId) -> Result<StoredPosting, StoreError> {
        let (a, b) = tokio::join!(self.first.read(id), self.second.read(id));
        Self::merge_reads(a, b)
    }

    async fn update(&self, posting: &StoredPosting) -> Result<usize, StoreError> {
        let (a, b) = tokio::join!(self.first.update(posting), self.second.update(posting));
        Self::merge_writes(a, b)
    }

    async fn delete(&self, id: PostingId) -> Result<(), StoreError> {
        let (a, b) = tokio::join!(self.first.delete(id), self.second.delete(id));
        Self::merge_writes(a, b)
    }

    // Reads are served from either replica, so existence in either counts.
    async fn exists(&self, id: PostingId) -> bool {
        let (a, b) = tokio::join!(self.first.exists(id), self.second.exists(id));
        a || b
    }

    async fn rename(&self, old: PostingId, new: PostingId) -> Result<(), StoreError> {
        let (a, b) = tokio::join!(self.first.rename(old, new), self.second.rename(old, new));
        Self::merge_writes(a, b)
    }

    async fn search(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredPosting>, StoreError> {
        let (a, b) = tokio::join!(
            self.first.search(text, offset, limit),
            self.second.search(text, offset, limit)
        );
        Self::merge_reads(a, b)
    }

    fn location(&self, id: PostingId) -> String {
        format!(
            "tee:{}|{}",
            self.first.location(id),
            self.second.location(id)
        )
    }

    async fn count(&self) -> Result<u32, StoreError> {
        let (a, b) = tokio::join!(self.first.count(), self.second.count());
        match (a, b) {
            (Ok(a), Ok(b)) => Ok(a.max(b)),
            (Ok(n), Err(e)) | (Err(e), Ok(n)) => {
                tracing::debug!(error = %e, "count failed on one replica");
                Ok(n)
            }
            (Err(e), Err(_)) => Err(e),
        }
    }

    async fn walk(&self, f: &WalkFn<'_>) -> Result<(), StoreError> {
        let (a, b) = tokio::join!(self.first.walk(f), self.second.walk(f));
        Self::merge_writes(a, b)
    }

    async fn newest(&self, limit: usize, offset: usize) -> Result<Vec<StoredPosting>, StoreError> {
        let (a, b) = tokio::join!(
            self.first.newest(limit, offset),
            self.second.newest(limit, offset)
        );
        Self::merge_reads(a, b)
    }

    async fn range(&self, lo: PostingId, hi: PostingId) -> Result<Vec<StoredPosting>, StoreError> {
        let (a, b) = tokio::join!(self.first.range(lo, hi), self.second.range(lo, hi));
        Self::merge_reads(a, b)
    }
}
