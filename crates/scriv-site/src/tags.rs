//! Hashtag and mention index hooks.
//!
//! The index itself lives outside this crate. Postings notify it after every
//! successful mutation from a detached task; failures are logged and never
//! reach the caller.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use scriv_storage::PostingId;

/// Error type returned by [`TagIndex`] implementations.
pub type TagIndexError = Box<dyn std::error::Error + Send + Sync>;

/// Receiver of posting lifecycle events.
#[async_trait]
pub trait TagIndex: Send + Sync {
    /// A posting was created with `markdown`.
    async fn parse(&self, id: PostingId, markdown: &str) -> Result<(), TagIndexError>;

    /// A posting was deleted.
    async fn remove(&self, id: PostingId) -> Result<(), TagIndexError>;

    /// A posting moved to a new identifier.
    async fn rename(&self, old: PostingId, new: PostingId) -> Result<(), TagIndexError>;

    /// A posting's content was replaced with `markdown`.
    async fn update(&self, id: PostingId, markdown: &str) -> Result<(), TagIndexError>;
}

/// Index that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTagIndex;

#[async_trait]
impl TagIndex for NullTagIndex {
    async fn parse(&self, _id: PostingId, _markdown: &str) -> Result<(), TagIndexError> {
        Ok(())
    }

    async fn remove(&self, _id: PostingId) -> Result<(), TagIndexError> {
        Ok(())
    }

    async fn rename(&self, _old: PostingId, _new: PostingId) -> Result<(), TagIndexError> {
        Ok(())
    }

    async fn update(&self, _id: PostingId, _markdown: &str) -> Result<(), TagIndexError> {
        Ok(())
    }
}

/// Run a tag index call on a detached task, logging its failure.
pub(crate) fn notify<F, Fut>(tags: &Arc<dyn TagIndex>, event: &'static str, call: F)
where
    F: FnOnce(Arc<dyn TagIndex>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), TagIndexError>> + Send + 'static,
{
    let tags = Arc::clone(tags);
    tokio::spawn(async move {
        if let Err(e) = call(tags).await {
            tracing::warn!(event, error = %e, "tag index update failed");
        }
    });
}
