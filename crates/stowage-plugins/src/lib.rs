//! Enrichment plugins
//!
//! Plugins declare the file extensions they handle and attach metadata to
//! uploaded items from a background worker. The registry resolves one plugin
//! per item by extension.

pub mod plugin;
pub mod registry;

#[cfg(feature = "plugin-image-preview")]
pub mod image_preview;
#[cfg(feature = "plugin-video-info")]
pub mod video_info;

pub use plugin::{poster_file_name, FilePlugin, PluginContext, PluginInfo};
pub use registry::PluginRegistry;

#[cfg(feature = "plugin-image-preview")]
pub use image_preview::ImagePreviewPlugin;
#[cfg(feature = "plugin-video-info")]
pub use video_info::{VideoInfoConfig, VideoInfoPlugin};
