//! Shared constants

/// Directory under the storage root holding in-flight chunk sessions.
pub const TEMP_DIR_NAME: &str = "temp";

/// Directory under the storage root holding enrichment side-assets (posters).
pub const ASSETS_DIR_NAME: &str = "assets";

/// Buffer size used when streaming request bodies to disk.
pub const STREAM_COPY_BUFFER_BYTES: usize = 80 * 1024;

/// Zero-padding width of chunk file names (`chunk.0000`).
pub const CHUNK_INDEX_WIDTH: usize = 4;

/// Maximum length of a stored display file name.
pub const MAX_FILENAME_LENGTH: usize = 255;
