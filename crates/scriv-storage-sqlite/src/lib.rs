//! SQLite storage backend for scriv postings.
//!
//! [`SqliteStore`] keeps postings in one table and, when the linked SQLite
//! supports FTS5, maintains an external-content full-text index through
//! triggers:
//!
//! ```text
//! postings(id INTEGER PRIMARY KEY, lastModified INTEGER NOT NULL, markdown TEXT NOT NULL)
//! postings_FTS USING fts5(markdown, content='postings', content_rowid='id')
//! ```
//!
//! Identifiers are unsigned and stored through [`id_to_db`]/[`id_from_db`].
//! Every query runs under [`QUERY_TIMEOUT`].

mod codec;
mod schema;
mod store;

pub use codec::{id_from_db, id_to_db};
pub use store::{QUERY_TIMEOUT, SqliteStore, map_sqlx_error};
