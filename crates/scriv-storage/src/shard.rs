//! Directory sharding for one-file-per-posting layouts.
//!
//! Postings are spread over directories named after the UTC year and the
//! first three hex digits of the identifier:
//!
//! ```text
//! {base}/
//! +-- 20195c3/
//! |   +-- 15c3a8b2d4e10000.md
//! |   +-- 15c3a8b2d4e10000.ht
//! +-- 20195c4/
//!     +-- ...
//! ```
//!
//! Three hex digits of a nanosecond timestamp roll over every 2^52 ns
//! (about 52 days), which bounds the number of files per directory. The year
//! prefix keeps the key from repeating when the hex prefix wraps.

use std::io;
use std::path::{Path, PathBuf};

use crate::id::{ID_HEX_LEN, PostingId};

/// Number of leading hex digits used in a shard directory name.
const SHARD_HEX_DIGITS: usize = 3;

/// Permission bits for newly created shard directories (`rwxrwxr-x`).
#[cfg(unix)]
const DIR_MODE: u32 = 0o775;

/// Extension of posting source files.
pub const MARKDOWN_EXT: &str = "md";

/// Maps identifiers to shard directories and files below a base directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardLayout {
    base: PathBuf,
}

impl ShardLayout {
    /// Create a layout rooted at `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base directory of the layout.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Shard directory name for `id`, e.g. `"20195c3"`.
    #[must_use]
    pub fn shard_name(id: PostingId) -> String {
        let hex = id.to_hex();
        format!("{:04}{}", id.year(), &hex[..SHARD_HEX_DIGITS])
    }

    /// Shard directory for `id`.
    #[must_use]
    pub fn shard_dir(&self, id: PostingId) -> PathBuf {
        self.base.join(Self::shard_name(id))
    }

    /// Markdown source file for `id`.
    #[must_use]
    pub fn file_path(&self, id: PostingId) -> PathBuf {
        self.file_path_with_ext(id, MARKDOWN_EXT)
    }

    /// File for `id` with a custom extension, in the same shard directory.
    #[must_use]
    pub fn file_path_with_ext(&self, id: PostingId, ext: &str) -> PathBuf {
        self.shard_dir(id).join(format!("{}.{ext}", id.to_hex()))
    }

    /// Parse a file name such as `15c3a8b2d4e10000.md` back to an identifier.
    ///
    /// Returns `None` if the extension differs or the stem is not a valid id.
    #[must_use]
    pub fn parse_file_name(name: &str, ext: &str) -> Option<PostingId> {
        let stem = name.strip_suffix(ext)?.strip_suffix('.')?;
        if stem.len() != ID_HEX_LEN {
            return None;
        }
        PostingId::from_hex(stem)
    }

    /// Create `path` and its parents.
    ///
    /// Succeeds if the directory already exists, including when another task
    /// creates it concurrently.
    pub async fn ensure_dir(path: &Path) -> io::Result<()> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        match builder.create(path).await {
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
            result => result,
        }
    }
}
