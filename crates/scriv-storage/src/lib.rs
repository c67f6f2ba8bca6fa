//! Storage abstraction for the scriv posting engine.
//!
//! A posting is a Markdown document addressed by a time-derived identifier.
//! This crate provides the pieces every backend shares:
//!
//! - [`PostingId`]: nanosecond identifiers with a fixed 16-digit hex form
//! - [`ShardLayout`]: maps identifiers to year/hex-prefix shard directories
//! - [`PostingStore`] trait with create/read/update/delete, rename, search,
//!   enumeration and range queries
//! - [`TeeStore`]: replicates every operation to two stores
//! - [`MockStore`] for testing (behind `mock` feature flag)
//!
//! Backends live in their own crates (`scriv-storage-fs`,
//! `scriv-storage-sqlite`).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use scriv_storage::{PostingId, PostingStore, StoredPosting, TeeStore};
//!
//! let store = TeeStore::new(Arc::new(fs_store), Arc::new(sqlite_store));
//! let id = PostingId::now();
//! store.create(&StoredPosting::new(id, "# Hello")).await?;
//! ```

mod id;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod shard;
mod storage;
mod tee;

pub use id::{ID_HEX_LEN, ParseIdError, PostingId};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockOp, MockStore};
pub use shard::{MARKDOWN_EXT, ShardLayout};
pub use storage::{
    PostingStore, SEARCH_LIMIT_UNBOUNDED, StoreError, StoreErrorKind, StoredPosting, WalkFn,
    effective_limit,
};
pub use tee::TeeStore;
