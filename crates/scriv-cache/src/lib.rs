//! Rendered HTML cache for scriv postings.
//!
//! Rendering Markdown is cheap per posting but adds up on list pages, so
//! rendered HTML is kept on disk, zlib-compressed, in the same shard layout
//! as the sources:
//!
//! - [`Renderer`]: Markdown to HTML conversion, [`CmarkRenderer`] by default
//! - [`RenderCache`]: mtime-validated cache with background writes
//! - [`RenderCache::sweep`]: removes stale and orphaned entries
//!
//! # Example
//!
//! ```
//! use scriv_cache::{CmarkRenderer, Renderer};
//!
//! assert_eq!(CmarkRenderer.render("*hi*"), "<p><em>hi</em></p>\n");
//! ```

mod cache;
mod file;
mod renderer;

pub use cache::{CacheError, RenderCache, SweepStats};
pub use file::CACHE_EXT;
pub use renderer::{CmarkRenderer, Renderer};
