//! Postings and posting lists for scriv.
//!
//! This crate sits between callers (CLI, web handlers) and the storage layer:
//!
//! - [`Journal`]: wires the active store, the tag index and the render cache
//! - [`Posting`]: lazily loaded posting with create/update/delete/rename
//! - [`PostingList`]: newest, day, week, month and search queries
//! - [`TagIndex`]: hooks notified after every mutation
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use chrono::Month;
//! use scriv_site::Journal;
//! use scriv_storage_fs::FsStore;
//!
//! let journal = Journal::new(Arc::new(FsStore::new("data/postings")));
//!
//! let mut posting = journal.new_posting();
//! posting.set_markdown("# Hello");
//! posting.create().await?;
//!
//! let mut january = journal.month(2019, Month::January).await?;
//! january.sort();
//! ```

mod journal;
mod list;
mod posting;
mod tags;

pub use journal::Journal;
pub use list::PostingList;
pub use posting::Posting;
pub use tags::{NullTagIndex, TagIndex, TagIndexError};
