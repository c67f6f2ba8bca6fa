//! Modification-time validated HTML cache.
//!
//! Entries live next to (or mirror) the posting sources, using the same shard
//! layout with the `.ht` extension. An entry is fresh when its mtime is
//! strictly later than the posting's `last_modified`; anything else is a miss
//! and gets re-rendered.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::task::{JoinHandle, JoinSet};

use scriv_storage::{PostingId, PostingStore, ShardLayout, StoreError, StoredPosting};

use crate::file::{CACHE_EXT, decompress, write_compressed};
use crate::renderer::Renderer;

/// Error returned by cache maintenance.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache directory or file could not be accessed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The posting store failed while checking an entry.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of a [`RenderCache::sweep`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Entries examined.
    pub scanned: usize,
    /// Entries deleted because the posting changed after they were written.
    pub stale: usize,
    /// Entries deleted because the posting no longer exists.
    pub orphaned: usize,
}

/// Rendered HTML cache keyed by posting id.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use scriv_cache::{CmarkRenderer, RenderCache};
///
/// let cache = RenderCache::new("data/postings", Arc::new(CmarkRenderer));
/// let html = cache.render(&posting).await;
/// cache.wait_pending().await;
/// ```
pub struct RenderCache {
    layout: ShardLayout,
    renderer: Arc<dyn Renderer>,
    pending: Mutex<JoinSet<()>>,
}

impl RenderCache {
    /// Create a cache rooted at `root` using `renderer` on misses.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            layout: ShardLayout::new(root),
            renderer,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    /// Cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.layout.base()
    }

    /// Cache file for `id`.
    #[must_use]
    pub fn entry_path(&self, id: PostingId) -> PathBuf {
        self.layout.file_path_with_ext(id, CACHE_EXT)
    }

    /// HTML for `posting`, from cache when fresh.
    ///
    /// On a miss the posting is rendered immediately and the entry is written
    /// by a background task. Write failures are logged, never returned.
    pub async fn render(&self, posting: &StoredPosting) -> String {
        let path = self.entry_path(posting.id);

        if let Some(html) = Self::read_fresh(&path, posting.last_modified).await {
            tracing::debug!(id = %posting.id, "render cache hit");
            return html;
        }

        tracing::debug!(id = %posting.id, "render cache miss");
        let html = self.renderer.render(&posting.markdown);
        self.store_in_background(posting.id, path, html.clone());
        html
    }

    /// Read the entry at `path` if it is newer than `source_modified`.
    async fn read_fresh(path: &Path, source_modified: SystemTime) -> Option<String> {
        let meta = tokio::fs::metadata(path).await.ok()?;
        let cached_at = meta.modified().ok()?;
        if cached_at <= source_modified {
            return None;
        }

        let bytes = tokio::fs::read(path).await.ok()?;
        match decompress(&bytes) {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable cache entry");
                None
            }
        }
    }

    fn store_in_background(&self, id: PostingId, path: PathBuf, html: String) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Reap finished writes so the set does not grow without bound
        while pending.try_join_next().is_some() {}

        pending.spawn_blocking(move || {
            if let Err(e) = write_compressed(&path, &html) {
                tracing::warn!(%id, path = %path.display(), error = %e, "failed to write cache entry");
            }
        });
    }

    /// Wait for all background writes started so far.
    pub async fn wait_pending(&self) {
        let mut pending = std::mem::take(
            &mut *self
                .pending
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "cache write task failed");
            }
        }
    }

    /// Remove the entry for `id`. Missing entries are ignored.
    pub async fn invalidate(&self, id: PostingId) -> Result<(), CacheError> {
        let path = self.entry_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Delete entries that are stale or whose posting no longer exists.
    pub async fn sweep(&self, store: &dyn PostingStore) -> Result<SweepStats, CacheError> {
        let mut stats = SweepStats::default();

        for (id, path) in self.entries().await? {
            stats.scanned += 1;
            let cached_at = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.modified().map_err(|e| CacheError::io(&path, e))?,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(CacheError::io(&path, e)),
            };

            let remove = match store.read(id).await {
                Ok(posting) if cached_at <= posting.last_modified => {
                    stats.stale += 1;
                    true
                }
                Ok(_) => false,
                Err(e) if e.is_not_found() => {
                    stats.orphaned += 1;
                    true
                }
                Err(e) => return Err(e.into()),
            };

            if remove {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(CacheError::io(&path, e)),
                }
            }
        }

        tracing::info!(
            scanned = stats.scanned,
            stale = stats.stale,
            orphaned = stats.orphaned,
            "render cache swept"
        );
        Ok(stats)
    }

    /// Every `(id, path)` cache entry below the root.
    async fn entries(&self) -> Result<Vec<(PostingId, PathBuf)>, CacheError> {
        let root = self.root();
        let mut shards = match tokio::fs::read_dir(root).await {
            Ok(shards) => shards,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(root, e)),
        };

        let mut entries = Vec::new();
        while let Some(shard) = shards
            .next_entry()
            .await
            .map_err(|e| CacheError::io(root, e))?
        {
            let dir = shard.path();
            if !shard.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let mut files = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| CacheError::io(&dir, e))?;
            while let Some(file) = files
                .next_entry()
                .await
                .map_err(|e| CacheError::io(&dir, e))?
            {
                let name = file.file_name();
                if let Some(id) = name
                    .to_str()
                    .and_then(|n| ShardLayout::parse_file_name(n, CACHE_EXT))
                {
                    entries.push((id, file.path()));
                }
            }
        }
        Ok(entries)
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the task is aborted.
    ///
    /// Failures are logged and the next sweep runs as scheduled.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        store: Arc<dyn PostingStore>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep(store.as_ref()).await {
                    tracing::warn!(error = %e, "render cache sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;
    use scriv_storage::{MockOp, MockStore};

    use super::*;
    use crate::renderer::CmarkRenderer;

    const HOUR: Duration = Duration::from_secs(3600);

    /// Renderer that counts its invocations.
    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl Renderer for CountingRenderer {
        fn render(&self, markdown: &str) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            format!("<p>{markdown}</p>")
        }
    }

    fn setup() -> (tempfile::TempDir, Arc<CountingRenderer>, RenderCache) {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = Arc::new(CountingRenderer::default());
        let cache = RenderCache::new(
            tmp.path(),
            Arc::clone(&renderer) as Arc<dyn Renderer>,
        );
        (tmp, renderer, cache)
    }

    fn posting(n: u64, markdown: &str, last_modified: SystemTime) -> StoredPosting {
        StoredPosting {
            id: PostingId::new(n),
            last_modified,
            markdown: markdown.to_owned(),
        }
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[tokio::test]
    async fn test_fresh_entry_is_served_from_cache() {
        let (_tmp, renderer, cache) = setup();
        let p = posting(1, "hello", SystemTime::now() - HOUR);

        let first = cache.render(&p).await;
        cache.wait_pending().await;
        let second = cache.render(&p).await;

        assert_eq!(first, "<p>hello</p>");
        assert_eq!(second, first);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_is_rerendered_then_served() {
        let (_tmp, renderer, cache) = setup();
        let modified = SystemTime::now() - HOUR;
        cache.render(&posting(1, "old", modified - HOUR)).await;
        cache.wait_pending().await;
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);

        // Entry predates the latest edit of its source
        set_mtime(&cache.entry_path(PostingId::new(1)), modified - HOUR);
        let edited = posting(1, "new", modified);
        assert_eq!(cache.render(&edited).await, "<p>new</p>");
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);

        cache.wait_pending().await;
        assert_eq!(cache.render(&edited).await, "<p>new</p>");
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_equal_mtime_is_stale() {
        let (_tmp, renderer, cache) = setup();
        let stamp = SystemTime::now() - HOUR;
        let p = posting(1, "x", stamp);
        cache.render(&p).await;
        cache.wait_pending().await;
        set_mtime(&cache.entry_path(p.id), stamp);

        cache.render(&p).await;

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_entry_is_zlib_in_shard_layout() {
        let (tmp, _renderer, cache) = setup();
        let p = posting(0x15c3_a8b2_d4e1_0000, "body", SystemTime::now() - HOUR);

        cache.render(&p).await;
        cache.wait_pending().await;

        let path = cache.entry_path(p.id);
        assert_eq!(
            path,
            ShardLayout::new(tmp.path()).file_path_with_ext(p.id, "ht")
        );
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(decompress(&bytes).unwrap(), "<p>body</p>");
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let (_tmp, renderer, cache) = setup();
        let p = posting(1, "x", SystemTime::now() - HOUR);
        let path = cache.entry_path(p.id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"garbage").unwrap();

        assert_eq!(cache.render(&p).await, "<p>x</p>");
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_render() {
        let (_tmp, renderer, cache) = setup();
        let p = posting(1, "x", SystemTime::now() - HOUR);
        cache.render(&p).await;
        cache.wait_pending().await;

        cache.invalidate(p.id).await.unwrap();
        cache.invalidate(p.id).await.unwrap();
        cache.render(&p).await;

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sweep_removes_stale_and_orphaned() {
        let (_tmp, _renderer, cache) = setup();
        let store = MockStore::new();
        let (fresh, stale, orphan) = (PostingId::new(1), PostingId::new(2), PostingId::new(3));
        for id in [fresh, stale] {
            store.create(&StoredPosting::new(id, "x")).await.unwrap();
        }
        for id in [fresh, stale, orphan] {
            cache.render(&posting(id.as_u64(), "x", SystemTime::UNIX_EPOCH)).await;
        }
        cache.wait_pending().await;
        set_mtime(&cache.entry_path(fresh), SystemTime::now() + HOUR);
        set_mtime(&cache.entry_path(stale), SystemTime::now() - HOUR);

        let stats = cache.sweep(&store).await.unwrap();

        assert_eq!(stats, SweepStats {
            scanned: 3,
            stale: 1,
            orphaned: 1,
        });
        assert!(cache.entry_path(fresh).exists());
        assert!(!cache.entry_path(stale).exists());
        assert!(!cache.entry_path(orphan).exists());
    }

    #[tokio::test]
    async fn test_sweep_empty_root() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = RenderCache::new(tmp.path().join("missing"), Arc::new(CmarkRenderer));
        let stats = cache.sweep(&MockStore::new()).await.unwrap();
        assert_eq!(stats, SweepStats::default());
    }

    #[tokio::test]
    async fn test_sweep_propagates_store_errors() {
        let (_tmp, _renderer, cache) = setup();
        cache.render(&posting(1, "x", SystemTime::UNIX_EPOCH)).await;
        cache.wait_pending().await;
        let store = MockStore::new().fail_on(MockOp::Read);

        let err = cache.sweep(&store).await.unwrap_err();

        assert!(matches!(err, CacheError::Store(_)));
    }

    #[tokio::test]
    async fn test_sweeper_runs_on_interval() {
        let (_tmp, _renderer, cache) = setup();
        let cache = Arc::new(cache);
        cache.render(&posting(9, "x", SystemTime::UNIX_EPOCH)).await;
        cache.wait_pending().await;
        let path = cache.entry_path(PostingId::new(9));
        assert!(path.exists());

        let store: Arc<dyn PostingStore> = Arc::new(MockStore::new());
        let handle = Arc::clone(&cache).spawn_sweeper(store, Duration::from_millis(20));
        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();

        assert!(!path.exists());
    }
}
