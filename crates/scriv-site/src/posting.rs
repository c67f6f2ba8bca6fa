//! A single posting bound to its journal.
//!
//! [`Posting`] is a façade over [`PostingStore`](scriv_storage::PostingStore):
//! it buffers the Markdown, routes every durable operation through the
//! journal's store and tells the tag index about changes.
//!
//! Content is loaded lazily. [`Posting::markdown`] and [`Posting::len`] load
//! from the store whenever the buffer is empty, so an empty posting and one
//! that was never loaded look the same from outside.

use std::time::SystemTime;

use scriv_storage::{PostingId, StoreError, StoredPosting};

use crate::journal::Journal;
use crate::tags::notify;

/// A posting and its in-memory content.
#[derive(Clone, Debug)]
pub struct Posting {
    journal: Journal,
    id: PostingId,
    last_modified: Option<SystemTime>,
    markdown: String,
    /// Buffer differs from what the store holds.
    dirty: bool,
}

impl Posting {
    pub(crate) fn new(journal: Journal, id: PostingId) -> Self {
        Self {
            journal,
            id,
            last_modified: None,
            markdown: String::new(),
            dirty: false,
        }
    }

    pub(crate) fn from_stored(journal: Journal, stored: StoredPosting) -> Self {
        Self {
            journal,
            id: stored.id,
            last_modified: Some(stored.last_modified),
            markdown: stored.markdown,
            dirty: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> PostingId {
        self.id
    }

    /// Modification time reported by the store, once loaded.
    #[must_use]
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Replace the buffered Markdown. Nothing is written until
    /// [`create`](Self::create) or [`update`](Self::update).
    pub fn set_markdown(&mut self, markdown: impl Into<String>) {
        self.markdown = markdown.into();
        self.dirty = true;
    }

    /// Buffered Markdown, loading it first if the buffer is empty.
    pub async fn markdown(&mut self) -> Result<&str, StoreError> {
        if self.markdown.is_empty() {
            self.load().await?;
        }
        Ok(&self.markdown)
    }

    /// Length of the Markdown in bytes, loading it first if needed.
    pub async fn len(&mut self) -> Result<usize, StoreError> {
        Ok(self.markdown().await?.len())
    }

    /// Whether the posting has no content, loading it first if needed.
    pub async fn is_empty(&mut self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    /// Read the posting from the store, replacing the buffer.
    pub async fn load(&mut self) -> Result<(), StoreError> {
        let stored = self.journal.store().read(self.id).await?;
        self.last_modified = Some(stored.last_modified);
        self.markdown = stored.markdown;
        self.dirty = false;
        Ok(())
    }

    /// Adopt the store's timestamp after a write. `None` when the write
    /// removed the posting.
    async fn refresh_last_modified(&mut self) {
        self.last_modified = match self.journal.store().read(self.id).await {
            Ok(stored) => Some(stored.last_modified),
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(id = %self.id, error = %e, "failed to read back posting");
                }
                None
            }
        };
        self.dirty = false;
    }

    fn to_stored(&self) -> StoredPosting {
        StoredPosting {
            id: self.id,
            last_modified: self.last_modified.unwrap_or_else(SystemTime::now),
            markdown: self.markdown.clone(),
        }
    }

    /// Persist the buffered Markdown as a new posting.
    pub async fn create(&mut self) -> Result<usize, StoreError> {
        let written = self.journal.store().create(&self.to_stored()).await?;
        self.refresh_last_modified().await;

        let (id, markdown) = (self.id, self.markdown.clone());
        notify(self.journal.tags(), "parse", move |tags| async move {
            tags.parse(id, &markdown).await
        });
        Ok(written)
    }

    /// Overwrite the stored posting with the buffered Markdown.
    pub async fn update(&mut self) -> Result<usize, StoreError> {
        let written = self.journal.store().update(&self.to_stored()).await?;
        self.drop_cached(self.id).await;
        self.refresh_last_modified().await;

        let (id, markdown) = (self.id, self.markdown.clone());
        notify(self.journal.tags(), "update", move |tags| async move {
            tags.update(id, &markdown).await
        });
        Ok(written)
    }

    /// Remove the posting and its cached HTML.
    pub async fn delete(&self) -> Result<(), StoreError> {
        self.journal.store().delete(self.id).await?;
        self.drop_cached(self.id).await;

        let id = self.id;
        notify(self.journal.tags(), "remove", move |tags| async move {
            tags.remove(id).await
        });
        Ok(())
    }

    pub async fn exists(&self) -> bool {
        self.journal.store().exists(self.id).await
    }

    /// Move the posting to `new_id`, overwriting anything stored there.
    pub async fn rename(&mut self, new_id: PostingId) -> Result<(), StoreError> {
        let old = self.id;
        self.journal.store().rename(old, new_id).await?;
        self.drop_cached(old).await;
        self.drop_cached(new_id).await;
        self.id = new_id;

        notify(self.journal.tags(), "rename", move |tags| async move {
            tags.rename(old, new_id).await
        });
        Ok(())
    }

    /// Rendered HTML, through the render cache when one is configured.
    ///
    /// Unsaved content is rendered directly and never cached.
    pub async fn html(&mut self) -> Result<String, StoreError> {
        if self.markdown.is_empty() && !self.dirty {
            self.load().await?;
        }
        match (self.journal.cache(), self.last_modified) {
            (Some(cache), Some(_)) if !self.dirty => Ok(cache.render(&self.to_stored()).await),
            _ => Ok(self.journal.renderer().render(&self.markdown)),
        }
    }

    /// Backend-specific location of the posting.
    #[must_use]
    pub fn location(&self) -> String {
        self.journal.store().location(self.id)
    }

    async fn drop_cached(&self, id: PostingId) {
        if let Some(cache) = self.journal.cache()
            && let Err(e) = cache.invalidate(id).await
        {
            tracing::warn!(%id, error = %e, "failed to drop cached html");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use scriv_cache::{RenderCache, Renderer};
    use scriv_storage::{MockStore, PostingStore, StoreErrorKind};

    use super::*;
    use crate::tags::{TagIndex, TagIndexError};

    /// Tag index that records events as strings.
    #[derive(Default)]
    struct RecordingTags {
        events: Mutex<Vec<String>>,
    }

    impl RecordingTags {
        async fn wait_for(&self, n: usize) -> Vec<String> {
            for _ in 0..100 {
                if self.events.lock().unwrap().len() >= n {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TagIndex for RecordingTags {
        async fn parse(&self, id: PostingId, markdown: &str) -> Result<(), TagIndexError> {
            self.events.lock().unwrap().push(format!("parse {} {markdown}", id.as_u64()));
            Ok(())
        }

        async fn remove(&self, id: PostingId) -> Result<(), TagIndexError> {
            self.events.lock().unwrap().push(format!("remove {}", id.as_u64()));
            Ok(())
        }

        async fn rename(&self, old: PostingId, new: PostingId) -> Result<(), TagIndexError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("rename {} {}", old.as_u64(), new.as_u64()));
            Ok(())
        }

        async fn update(&self, _id: PostingId, _markdown: &str) -> Result<(), TagIndexError> {
            Err("index offline".into())
        }
    }

    fn journal() -> (Arc<MockStore>, Journal) {
        let store = Arc::new(MockStore::new());
        let journal = Journal::new(Arc::clone(&store) as Arc<dyn PostingStore>);
        (store, journal)
    }

    #[tokio::test]
    async fn test_create_then_lazy_load() {
        let (_store, journal) = journal();
        let mut posting = journal.posting(PostingId::new(10));
        posting.set_markdown("  # Title \n");
        posting.create().await.unwrap();

        let mut fresh = journal.posting(PostingId::new(10));
        assert_eq!(fresh.last_modified(), None);
        assert_eq!(fresh.len().await.unwrap(), "# Title".len());
        assert_eq!(fresh.markdown().await.unwrap(), "# Title");
        assert!(fresh.last_modified().is_some());
    }

    #[tokio::test]
    async fn test_lazy_load_of_missing_posting_fails() {
        let (_store, journal) = journal();
        let mut posting = journal.posting(PostingId::new(10));
        let err = posting.markdown().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_new_posting_has_current_id() {
        let (_store, journal) = journal();
        let before = PostingId::now();
        let posting = journal.new_posting();
        assert!(posting.id() >= before);
    }

    #[tokio::test]
    async fn test_unassigned_posting_is_rejected() {
        let (_store, journal) = journal();
        let mut posting = journal.posting(PostingId::UNASSIGNED);
        posting.set_markdown("x");
        let err = posting.create().await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::EmptyPosting);
    }

    #[tokio::test]
    async fn test_update_delete_exists() {
        let (store, journal) = journal();
        let mut posting = journal.posting(PostingId::new(10));
        posting.set_markdown("v1");
        posting.create().await.unwrap();

        posting.set_markdown("v2");
        posting.update().await.unwrap();
        assert_eq!(store.read(posting.id()).await.unwrap().markdown, "v2");

        assert!(posting.exists().await);
        posting.delete().await.unwrap();
        assert!(!posting.exists().await);
    }

    #[tokio::test]
    async fn test_rename_follows_new_id() {
        let (store, journal) = journal();
        let mut posting = journal.posting(PostingId::new(10));
        posting.set_markdown("content");
        posting.create().await.unwrap();

        posting.rename(PostingId::new(20)).await.unwrap();

        assert_eq!(posting.id(), PostingId::new(20));
        assert!(!store.exists(PostingId::new(10)).await);
        assert_eq!(posting.location(), "mock:Mock#0000000000000014");
    }

    #[tokio::test]
    async fn test_tag_index_is_notified() {
        let (_store, journal) = journal();
        let tags = Arc::new(RecordingTags::default());
        let journal = journal.with_tags(Arc::clone(&tags) as Arc<dyn TagIndex>);

        let mut posting = journal.posting(PostingId::new(1));
        posting.set_markdown("#rust");
        posting.create().await.unwrap();
        tags.wait_for(1).await;
        posting.rename(PostingId::new(2)).await.unwrap();
        tags.wait_for(2).await;
        posting.delete().await.unwrap();

        assert_eq!(tags.wait_for(3).await, vec![
            "parse 1 #rust",
            "rename 1 2",
            "remove 2"
        ]);
    }

    #[tokio::test]
    async fn test_tag_index_failure_does_not_fail_update() {
        let (_store, journal) = journal();
        let journal = journal.with_tags(Arc::new(RecordingTags::default()));
        let mut posting = journal.posting(PostingId::new(1));
        posting.set_markdown("x");
        posting.create().await.unwrap();

        posting.set_markdown("y");
        assert_eq!(posting.update().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_html_without_cache() {
        let (_store, journal) = journal();
        let mut posting = journal.posting(PostingId::new(1));
        posting.set_markdown("*hi*");
        posting.create().await.unwrap();

        let mut loaded = journal.posting(PostingId::new(1));
        assert_eq!(loaded.html().await.unwrap(), "<p><em>hi</em></p>\n");
    }

    #[tokio::test]
    async fn test_html_through_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let (_store, journal) = journal();
        let renderer: Arc<dyn Renderer> = Arc::new(|md: &str| format!("<pre>{md}</pre>"));
        let cache = Arc::new(RenderCache::new(tmp.path(), renderer));
        let journal = journal.with_cache(Arc::clone(&cache));

        let mut posting = journal.posting(PostingId::new(1));
        posting.set_markdown("body");
        posting.create().await.unwrap();

        assert_eq!(posting.html().await.unwrap(), "<pre>body</pre>");
        cache.wait_pending().await;
        assert!(cache.entry_path(posting.id()).exists());

        posting.delete().await.unwrap();
        assert!(!cache.entry_path(posting.id()).exists());
    }

    #[tokio::test]
    async fn test_unsaved_edit_bypasses_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let (_store, journal) = journal();
        let renderer: Arc<dyn Renderer> = Arc::new(|md: &str| format!("<pre>{md}</pre>"));
        let cache = Arc::new(RenderCache::new(tmp.path(), renderer));
        let journal = journal.with_cache(Arc::clone(&cache));

        let mut saved = journal.posting(PostingId::new(1));
        saved.set_markdown("saved");
        saved.create().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut posting = journal.posting(PostingId::new(1));
        assert_eq!(posting.html().await.unwrap(), "<pre>saved</pre>");
        cache.wait_pending().await;

        posting.set_markdown("unsaved edit");
        assert_eq!(posting.html().await.unwrap(), "<pre>unsaved edit</pre>");

        posting.update().await.unwrap();
        assert_eq!(posting.html().await.unwrap(), "<pre>unsaved edit</pre>");
    }

    #[tokio::test]
    async fn test_writes_adopt_store_timestamp() {
        let (store, journal) = journal();
        let mut posting = journal.posting(PostingId::new(1));
        posting.set_markdown("v1");
        posting.create().await.unwrap();

        let stored = store.read(posting.id()).await.unwrap();
        assert_eq!(posting.last_modified(), Some(stored.last_modified));

        posting.set_markdown("v2");
        posting.update().await.unwrap();
        let stored = store.read(posting.id()).await.unwrap();
        assert_eq!(posting.last_modified(), Some(stored.last_modified));
    }

    #[tokio::test]
    async fn test_emptied_posting_has_no_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn PostingStore> = Arc::new(scriv_storage_fs::FsStore::new(tmp.path()));
        let journal = Journal::new(store);
        let mut posting = journal.posting(PostingId::new(1));
        posting.set_markdown("v1");
        posting.create().await.unwrap();

        posting.set_markdown("  ");
        assert_eq!(posting.update().await.unwrap(), 0);
        assert_eq!(posting.last_modified(), None);
        assert!(!posting.exists().await);
    }
}
