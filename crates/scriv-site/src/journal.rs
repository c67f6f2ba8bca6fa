//! Explicit wiring of the active store and its collaborators.

use std::sync::Arc;

use scriv_cache::{CmarkRenderer, RenderCache, Renderer};
use scriv_storage::{PostingId, PostingStore};

use crate::posting::Posting;
use crate::tags::{NullTagIndex, TagIndex};

/// The active posting store together with the tag index and render path.
///
/// Cheap to clone; every [`Posting`] carries one.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use scriv_site::Journal;
/// use scriv_storage_fs::FsStore;
///
/// let journal = Journal::new(Arc::new(FsStore::new("data/postings")));
/// let mut posting = journal.new_posting();
/// posting.set_markdown("# Hello");
/// posting.create().await?;
/// ```
#[derive(Clone)]
pub struct Journal {
    store: Arc<dyn PostingStore>,
    tags: Arc<dyn TagIndex>,
    cache: Option<Arc<RenderCache>>,
    renderer: Arc<dyn Renderer>,
}

impl Journal {
    /// Wire `store` with no tag index and uncached rendering.
    #[must_use]
    pub fn new(store: Arc<dyn PostingStore>) -> Self {
        Self {
            store,
            tags: Arc::new(NullTagIndex),
            cache: None,
            renderer: Arc::new(CmarkRenderer),
        }
    }

    /// Notify `tags` after every mutation.
    #[must_use]
    pub fn with_tags(mut self, tags: Arc<dyn TagIndex>) -> Self {
        self.tags = tags;
        self
    }

    /// Serve HTML through `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<RenderCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Renderer used when no cache is configured.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn PostingStore> {
        &self.store
    }

    #[must_use]
    pub fn cache(&self) -> Option<&Arc<RenderCache>> {
        self.cache.as_ref()
    }

    pub(crate) fn tags(&self) -> &Arc<dyn TagIndex> {
        &self.tags
    }

    pub(crate) fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// A new, unsaved posting identified by the current time.
    #[must_use]
    pub fn new_posting(&self) -> Posting {
        Posting::new(self.clone(), PostingId::now())
    }

    /// Handle for the posting `id`. Nothing is loaded until needed.
    #[must_use]
    pub fn posting(&self, id: PostingId) -> Posting {
        Posting::new(self.clone(), id)
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("store", &self.store.name())
            .field("cache", &self.cache.as_ref().map(|c| c.root().to_path_buf()))
            .finish_non_exhaustive()
    }
}
