//! Shard directory traversal.
//!
//! Lists shard directories and posting files in descending name order. Shard
//! names are `{year}{leading hex digits}` and file names are the full hex id,
//! so both sort the same way as the identifiers they hold.

use std::io;
use std::path::{Path, PathBuf};

use scriv_storage::{MARKDOWN_EXT, PostingId, ShardLayout};

/// A shard directory found below the base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ShardEntry {
    pub name: String,
    pub path: PathBuf,
}

/// List shard directories below `base`, newest name first.
///
/// A missing base directory yields an empty list.
pub(crate) async fn shard_dirs_desc(base: &Path) -> io::Result<Vec<ShardEntry>> {
    let mut entries = match tokio::fs::read_dir(base).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut shards = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        // Skip hidden directories
        if name.starts_with('.') {
            continue;
        }
        shards.push(ShardEntry {
            name,
            path: entry.path(),
        });
    }

    shards.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(shards)
}

/// List posting identifiers in one shard directory, highest first.
///
/// Files that are not `<16 hex>.md` are ignored. A directory removed
/// concurrently yields an empty list.
pub(crate) async fn ids_desc(dir: &Path) -> io::Result<Vec<PostingId>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(id) = ShardLayout::parse_file_name(name, MARKDOWN_EXT) {
            ids.push(id);
        }
    }

    ids.sort_unstable_by(|a, b| b.cmp(a));
    Ok(ids)
}

/// All posting identifiers below `base`, shard by shard, newest first.
pub(crate) async fn all_ids_desc(base: &Path) -> io::Result<Vec<PostingId>> {
    let mut ids = Vec::new();
    for shard in shard_dirs_desc(base).await? {
        ids.extend(ids_desc(&shard.path).await?);
    }
    Ok(ids)
}
