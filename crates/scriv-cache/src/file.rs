//! Compressed cache files.
//!
//! Each entry is the rendered HTML compressed with zlib at the best
//! compression level. Writes go to a temporary sibling and are renamed into
//! place so readers never see a partial file.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

/// Extension of cache entries.
pub const CACHE_EXT: &str = "ht";

/// Compress `html` into `path`, creating parent directories.
pub(crate) fn write_compressed(path: &Path, html: &str) -> io::Result<()> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(html.as_bytes())?;
    let compressed = encoder.finish()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension(format!("{CACHE_EXT}.tmp"));
    fs::write(&tmp, compressed)?;
    fs::rename(&tmp, path)
}

/// Decompress a cache entry.
pub(crate) fn decompress(compressed: &[u8]) -> io::Result<String> {
    let mut html = String::new();
    ZlibDecoder::new(compressed).read_to_string(&mut html)?;
    Ok(html)
}
