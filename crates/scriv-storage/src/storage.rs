//! Storage trait and error types.
//!
//! Provides the core [`PostingStore`] trait that every backend implements,
//! the [`StoredPosting`] value returned by reads, and [`StoreError`] for
//! unified error handling across backends.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::id::PostingId;

/// Page size used for searches when the caller passes `limit == 0`.
pub const SEARCH_LIMIT_UNBOUNDED: usize = 1 << 15;

/// A posting as held by a backend.
///
/// Always a detached copy: no backend keeps a reference to a value it returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredPosting {
    /// Identifier (creation time in nanoseconds).
    pub id: PostingId,
    /// Last modification time as reported by the backend.
    pub last_modified: SystemTime,
    /// Markdown source, whitespace-trimmed.
    pub markdown: String,
}

impl StoredPosting {
    /// Create a posting stamped with the current time.
    #[must_use]
    pub fn new(id: PostingId, markdown: impl Into<String>) -> Self {
        Self {
            id,
            last_modified: SystemTime::now(),
            markdown: markdown.into(),
        }
    }

    /// Markdown with leading and trailing whitespace removed.
    #[must_use]
    pub fn trimmed(&self) -> &str {
        self.markdown.trim()
    }
}

/// Semantic error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorKind {
    /// Posting does not exist.
    NotFound,
    /// Create/update called without an assigned identifier.
    EmptyPosting,
    /// Filesystem failure.
    Io,
    /// Database failure.
    Database,
    /// Operation exceeded its deadline.
    Timeout,
    /// One side of a replicated write failed while the other succeeded.
    PartialReplication,
}

/// Storage error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct StoreError {
    kind: StoreErrorKind,
    id: Option<PostingId>,
    path: Option<PathBuf>,
    backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    /// Create a new storage error.
    #[must_use]
    pub fn new(kind: StoreErrorKind) -> Self {
        Self {
            kind,
            id: None,
            path: None,
            backend: None,
            source: None,
        }
    }

    /// Attach the posting identifier.
    #[must_use]
    pub fn with_id(mut self, id: PostingId) -> Self {
        self.id = Some(id);
        self
    }

    /// Attach path context.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Replace the kind, keeping all context.
    #[must_use]
    pub fn with_kind(mut self, kind: StoreErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Semantic error category.
    #[must_use]
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    /// Posting identifier, if known.
    #[must_use]
    pub fn id(&self) -> Option<PostingId> {
        self.id
    }

    /// Path context, if any.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    /// Backend identifier, if any.
    #[must_use]
    pub fn backend(&self) -> Option<&'static str> {
        self.backend
    }

    /// Whether the error means "the posting is absent".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }

    /// Downcast the source error to a concrete type.
    #[must_use]
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_ref()?.downcast_ref()
    }

    /// Create a not found error for `id`.
    #[must_use]
    pub fn not_found(id: PostingId) -> Self {
        Self::new(StoreErrorKind::NotFound).with_id(id)
    }

    /// Create the error returned for postings without an identifier.
    #[must_use]
    pub fn empty_posting() -> Self {
        Self::new(StoreErrorKind::EmptyPosting)
    }

    /// Create a storage error from an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error, path: Option<PathBuf>) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => StoreErrorKind::NotFound,
            std::io::ErrorKind::TimedOut => StoreErrorKind::Timeout,
            _ => StoreErrorKind::Io,
        };
        let mut error = Self::new(kind).with_source(err);
        if let Some(p) = path {
            error = error.with_path(p);
        }
        error
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Backend] Kind: message (id: ..., path: /foo/bar)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            StoreErrorKind::NotFound => "Not found",
            StoreErrorKind::EmptyPosting => "Empty posting",
            StoreErrorKind::Io => "I/O error",
            StoreErrorKind::Database => "Database error",
            StoreErrorKind::Timeout => "Timeout",
            StoreErrorKind::PartialReplication => "Partial replication failure",
        };

        write!(f, "{kind_str}")?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(id) = self.id {
            write!(f, " (id: {id})")?;
        }

        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }

        Ok(())
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Callback invoked for every identifier during [`PostingStore::walk`].
///
/// Return `Ok(ControlFlow::Break(()))` to stop the walk early without error.
/// Any `Err` aborts the walk and is returned to the caller.
///
/// Must be `Sync`: replicating stores run their inner walks concurrently with
/// the same callback.
pub type WalkFn<'a> = dyn Fn(PostingId) -> Result<ControlFlow<()>, StoreError> + Send + Sync + 'a;

/// Storage abstraction for postings.
///
/// Every mutating method must be safe to call concurrently. Markdown is
/// whitespace-trimmed on write and on read.
#[async_trait]
pub trait PostingStore: Send + Sync {
    /// Short backend name used in logs and errors (e.g., "Fs", "Sqlite").
    fn name(&self) -> &'static str;

    /// Persist a new posting. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// [`StoreErrorKind::EmptyPosting`] if the posting has no identifier.
    async fn create(&self, posting: &StoredPosting) -> Result<usize, StoreError>;

    /// Load a posting.
    ///
    /// # Errors
    ///
    /// [`StoreErrorKind::NotFound`] if there is no such posting.
    async fn read(&self, id: PostingId) -> Result<StoredPosting, StoreError>;

    /// Replace the content of a posting entirely. Returns bytes written.
    ///
    /// # Errors
    ///
    /// [`StoreErrorKind::EmptyPosting`] if the posting has no identifier.
    async fn update(&self, posting: &StoredPosting) -> Result<usize, StoreError>;

    /// Remove a posting. Removing an absent posting succeeds.
    async fn delete(&self, id: PostingId) -> Result<(), StoreError>;

    /// Check whether a posting exists.
    ///
    /// Returns `false` on errors (treats errors as "doesn't exist").
    async fn exists(&self, id: PostingId) -> bool;

    /// Move a posting to a new identifier, overwriting any content there.
    ///
    /// Not transactional across the delete of the old entry: a failure after
    /// the destination was written leaves both in place.
    async fn rename(&self, old: PostingId, new: PostingId) -> Result<(), StoreError>;

    /// Full-text search, newest first.
    ///
    /// A `limit` of `0` means [`SEARCH_LIMIT_UNBOUNDED`].
    async fn search(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredPosting>, StoreError>;

    /// Backend-specific location descriptor for `id`.
    ///
    /// A file path for the filesystem store; not comparable across backends.
    fn location(&self, id: PostingId) -> String;

    /// Number of stored postings. Implementations may cache the value.
    async fn count(&self) -> Result<u32, StoreError>;

    /// Visit every identifier. Order is backend-defined.
    async fn walk(&self, f: &WalkFn<'_>) -> Result<(), StoreError>;

    /// The `limit` most recent postings after skipping `offset`, newest first.
    async fn newest(&self, limit: usize, offset: usize) -> Result<Vec<StoredPosting>, StoreError>;

    /// All postings with `lo <= id < hi`, in backend order.
    async fn range(&self, lo: PostingId, hi: PostingId) -> Result<Vec<StoredPosting>, StoreError>;
}

/// Resolve a caller-supplied search limit.
#[must_use]
pub fn effective_limit(limit: usize) -> usize {
    if limit == 0 {
        SEARCH_LIMIT_UNBOUNDED
    } else {
        limit
    }
}
