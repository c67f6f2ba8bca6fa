//! Filesystem storage backend for scriv postings.
//!
//! [`FsStore`] keeps one Markdown file per posting in the sharded layout from
//! [`ShardLayout`]:
//!
//! ```text
//! {data_dir}/postings/
//! +-- 20195c3/
//!     +-- 15c3a8b2d4e10000.md
//! ```
//!
//! A zero-byte file counts as absent, and writing an empty body removes the
//! file. Mutations take an exclusive per-instance lock, reads share it.
//!
//! # Example
//!
//! ```ignore
//! use scriv_storage::{PostingId, PostingStore, StoredPosting};
//! use scriv_storage_fs::FsStore;
//!
//! let store = FsStore::new("data/postings");
//! let id = PostingId::now();
//! store.create(&StoredPosting::new(id, "# Hello")).await?;
//! let posting = store.read(id).await?;
//! ```

mod scanner;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use glob::Pattern;
use tokio::sync::RwLock;

use scriv_storage::{
    MARKDOWN_EXT, PostingId, PostingStore, ShardLayout, StoreError, StoreErrorKind, StoredPosting,
    WalkFn, effective_limit,
};

/// Backend identifier for error messages.
const BACKEND: &str = "Fs";

/// Sentinel for "count not computed yet".
const COUNT_UNKNOWN: i64 = -1;

/// Create a storage error from an I/O error on `path`.
fn io_error(err: io::Error, path: &Path) -> StoreError {
    StoreError::io(err, Some(path.to_path_buf())).with_backend(BACKEND)
}

/// Filesystem-backed posting store.
#[derive(Debug)]
pub struct FsStore {
    layout: ShardLayout,
    lock: RwLock<()>,
    count: AtomicI64,
}

impl FsStore {
    /// Create a store rooted at `base`. The directory is created lazily.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            layout: ShardLayout::new(base),
            lock: RwLock::new(()),
            count: AtomicI64::new(COUNT_UNKNOWN),
        }
    }

    /// Shard layout used by this store.
    #[must_use]
    pub fn layout(&self) -> &ShardLayout {
        &self.layout
    }

    fn invalidate_count(&self) {
        self.count.store(COUNT_UNKNOWN, Ordering::Release);
    }

    /// Write trimmed markdown for `id`. Caller holds the write lock.
    async fn write_unlocked(&self, id: PostingId, markdown: &str) -> Result<usize, StoreError> {
        let markdown = markdown.trim();
        if markdown.is_empty() {
            self.delete_unlocked(id).await?;
            return Ok(0);
        }

        let dir = self.layout.shard_dir(id);
        ShardLayout::ensure_dir(&dir)
            .await
            .map_err(|e| io_error(e, &dir).with_id(id))?;

        let path = self.layout.file_path(id);
        tokio::fs::write(&path, markdown)
            .await
            .map_err(|e| io_error(e, &path).with_id(id))?;
        self.invalidate_count();

        tracing::debug!(%id, bytes = markdown.len(), "wrote posting");
        Ok(markdown.len())
    }

    /// Read a posting. Caller holds a lock.
    async fn read_unlocked(&self, id: PostingId) -> Result<StoredPosting, StoreError> {
        let path = self.layout.file_path(id);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(e, &path).with_id(id))?;
        if meta.len() == 0 {
            return Err(StoreError::not_found(id)
                .with_backend(BACKEND)
                .with_path(path));
        }

        let markdown = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error(e, &path).with_id(id))?;
        let last_modified = meta.modified().map_err(|e| io_error(e, &path).with_id(id))?;

        Ok(StoredPosting {
            id,
            last_modified,
            markdown: markdown.trim().to_owned(),
        })
    }

    /// Remove the file for `id`, succeeding if it is already gone.
    async fn delete_unlocked(&self, id: PostingId) -> Result<(), StoreError> {
        let path = self.layout.file_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.invalidate_count();
                tracing::debug!(%id, "deleted posting");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e, &path).with_id(id)),
        }
    }

    /// Read every id in `ids`, skipping files that vanished or are empty.
    async fn read_all(&self, ids: &[PostingId]) -> Result<Vec<StoredPosting>, StoreError> {
        let mut postings = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.read_unlocked(id).await {
                Ok(posting) => postings.push(posting),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(postings)
    }

    async fn all_ids(&self) -> Result<Vec<PostingId>, StoreError> {
        let base = self.layout.base();
        scanner::all_ids_desc(base)
            .await
            .map_err(|e| io_error(e, base))
    }

    /// Count `*.md` files one level below the base directory.
    async fn count_files(&self) -> Result<u32, StoreError> {
        let base = self.layout.base().to_path_buf();
        let pattern = format!(
            "{}/*/*.{MARKDOWN_EXT}",
            Pattern::escape(&base.to_string_lossy())
        );

        let counted = tokio::task::spawn_blocking(move || {
            let paths = glob::glob(&pattern)?;
            let n = paths
                .filter_map(Result::ok)
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .and_then(|n| ShardLayout::parse_file_name(n, MARKDOWN_EXT))
                        .is_some()
                })
                .count();
            Ok::<_, glob::PatternError>(n)
        })
        .await
        .map_err(|e| {
            StoreError::new(StoreErrorKind::Io)
                .with_backend(BACKEND)
                .with_source(e)
        })?
        .map_err(|e| {
            StoreError::new(StoreErrorKind::Io)
                .with_backend(BACKEND)
                .with_path(self.layout.base())
                .with_source(e)
        })?;

        Ok(u32::try_from(counted).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl PostingStore for FsStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn create(&self, posting: &StoredPosting) -> Result<usize, StoreError> {
        if posting.id.is_unassigned() {
            return Err(StoreError::empty_posting().with_backend(BACKEND));
        }
        let _guard = self.lock.write().await;
        self.write_unlocked(posting.id, &posting.markdown).await
    }

    async fn read(&self, id: PostingId) -> Result<StoredPosting, StoreError> {
        let _guard = self.lock.read().await;
        self.read_unlocked(id).await
    }

    async fn update(&self, posting: &StoredPosting) -> Result<usize, StoreError> {
        if posting.id.is_unassigned() {
            return Err(StoreError::empty_posting().with_backend(BACKEND));
        }
        let _guard = self.lock.write().await;
        self.write_unlocked(posting.id, &posting.markdown).await
    }

    async fn delete(&self, id: PostingId) -> Result<(), StoreError> {
        let _guard = self.lock.write().await;
        self.delete_unlocked(id).await
    }

    async fn exists(&self, id: PostingId) -> bool {
        let _guard = self.lock.read().await;
        tokio::fs::metadata(self.layout.file_path(id))
            .await
            .is_ok_and(|m| m.len() > 0)
    }

    async fn rename(&self, old: PostingId, new: PostingId) -> Result<(), StoreError> {
        if new.is_unassigned() {
            return Err(StoreError::empty_posting().with_backend(BACKEND));
        }
        let _guard = self.lock.write().await;
        let posting = self.read_unlocked(old).await?;
        if old == new {
            return Ok(());
        }
        self.write_unlocked(new, &posting.markdown).await?;
        self.delete_unlocked(old).await?;
        tracing::debug!(%old, %new, "renamed posting");
        Ok(())
    }

    async fn search(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredPosting>, StoreError> {
        let needle = text.to_lowercase();
        let mut found = {
            let _guard = self.lock.read().await;
            let ids = self.all_ids().await?;
            let mut found = Vec::new();
            for posting in self.read_all(&ids).await? {
                if posting.markdown.to_lowercase().contains(&needle) {
                    found.push(posting);
                }
            }
            found
        };

        found.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(found
            .into_iter()
            .skip(offset)
            .take(effective_limit(limit))
            .collect())
    }

    fn location(&self, id: PostingId) -> String {
        self.layout.file_path(id).display().to_string()
    }

    async fn count(&self) -> Result<u32, StoreError> {
        let cached = self.count.load(Ordering::Acquire);
        if cached >= 0 {
            return Ok(u32::try_from(cached).unwrap_or(u32::MAX));
        }

        let _guard = self.lock.read().await;
        let n = self.count_files().await?;
        self.count.store(i64::from(n), Ordering::Release);
        Ok(n)
    }

    async fn walk(&self, f: &WalkFn<'_>) -> Result<(), StoreError> {
        let ids = {
            let _guard = self.lock.read().await;
            self.all_ids().await?
        };

        for id in ids {
            if f(id)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn newest(&self, limit: usize, offset: usize) -> Result<Vec<StoredPosting>, StoreError> {
        let _guard = self.lock.read().await;
        let base = self.layout.base();

        let mut skipped = 0;
        let mut postings = Vec::new();
        for shard in scanner::shard_dirs_desc(base)
            .await
            .map_err(|e| io_error(e, base))?
        {
            let ids = scanner::ids_desc(&shard.path)
                .await
                .map_err(|e| io_error(e, &shard.path))?;
            for id in ids {
                if postings.len() >= limit {
                    return Ok(postings);
                }
                if skipped < offset {
                    skipped += 1;
                    continue;
                }
                match self.read_unlocked(id).await {
                    Ok(posting) => postings.push(posting),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(postings)
    }

    async fn range(&self, lo: PostingId, hi: PostingId) -> Result<Vec<StoredPosting>, StoreError> {
        if lo >= hi {
            return Ok(Vec::new());
        }
        let first_shard = ShardLayout::shard_name(lo);
        let last_shard = ShardLayout::shard_name(PostingId::new(hi.as_u64() - 1));

        let _guard = self.lock.read().await;
        let base = self.layout.base();

        let mut ids = Vec::new();
        for shard in scanner::shard_dirs_desc(base)
            .await
            .map_err(|e| io_error(e, base))?
        {
            if shard.name < first_shard || shard.name > last_shard {
                continue;
            }
            let in_shard = scanner::ids_desc(&shard.path)
                .await
                .map_err(|e| io_error(e, &shard.path))?;
            ids.extend(in_shard.into_iter().filter(|id| (lo..hi).contains(id)));
        }

        tracing::debug!(%lo, %hi, found = ids.len(), "range query");
        self.read_all(&ids).await
    }
}
