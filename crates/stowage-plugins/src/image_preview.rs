//! Image preview plugin
//!
//! Decodes uploaded images, records their dimensions and format, and writes a
//! downscaled PNG poster into the assets directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat, ImageReader};
use serde_json::json;
use std::path::PathBuf;
use stowage_core::models::UploadItem;

use crate::plugin::{poster_file_name, FilePlugin, PluginContext};

const POSTER_WIDTH: u32 = 320;

#[derive(Debug)]
pub struct ImagePreviewPlugin {
    poster_width: u32,
}

impl ImagePreviewPlugin {
    pub fn new() -> Self {
        Self {
            poster_width: POSTER_WIDTH,
        }
    }
}

impl Default for ImagePreviewPlugin {
    fn default() -> Self {
        Self::new()
    }
}

struct Preview {
    width: u32,
    height: u32,
    format: Option<ImageFormat>,
}

fn render_preview(source: PathBuf, poster: PathBuf, poster_width: u32) -> Result<Preview> {
    let reader = ImageReader::open(&source)
        .with_context(|| format!("Failed to open {}", source.display()))?
        .with_guessed_format()
        .context("Failed to detect image format")?;
    let format = reader.format();
    let img = reader.decode().context("Failed to decode image")?;
    let (width, height) = img.dimensions();

    let thumb = if width > poster_width {
        img.resize(poster_width, u32::MAX, FilterType::Triangle)
    } else {
        img
    };

    thumb
        .save_with_format(&poster, ImageFormat::Png)
        .with_context(|| format!("Failed to write poster {}", poster.display()))?;

    Ok(Preview {
        width,
        height,
        format,
    })
}

#[async_trait]
impl FilePlugin for ImagePreviewPlugin {
    fn name(&self) -> &str {
        "image-preview"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["jpg", "jpeg", "png", "gif", "webp", "bmp"]
    }

    #[tracing::instrument(skip(self, item, ctx), fields(item_id = %item.id, group_id = %item.group_id))]
    async fn process(&self, item: &mut UploadItem, ctx: &PluginContext) -> Result<()> {
        if ctx.cancel.is_cancelled() {
            anyhow::bail!("Shutdown requested before preview rendering");
        }

        tokio::fs::create_dir_all(&ctx.assets_dir).await?;

        // Physical names are unique per item, so previews never collide.
        let key = item
            .physical_file_name()
            .unwrap_or(item.file_name.as_str())
            .to_string();
        let poster_name = poster_file_name(&key, "png");
        let poster_path = ctx.asset_path(&poster_name);

        let source = item.physical_path.clone();
        let poster_width = self.poster_width;
        let preview = tokio::task::spawn_blocking(move || {
            render_preview(source, poster_path, poster_width)
        })
        .await
        .context("Preview task failed")??;

        let format = preview
            .format
            .map(|f| format!("{:?}", f).to_lowercase());

        item.metadata = Some(json!({
            "kind": "image",
            "width": preview.width,
            "height": preview.height,
            "format": format,
            "poster": poster_name,
        }));

        tracing::debug!(
            width = preview.width,
            height = preview.height,
            "Image preview generated"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn context(dir: &std::path::Path) -> PluginContext {
        PluginContext {
            assets_dir: dir.join("assets"),
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_process_records_dimensions_and_writes_poster() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("photo.png");
        RgbImage::from_pixel(640, 480, Rgb([10, 200, 30]))
            .save(&source)
            .unwrap();

        let mut item = UploadItem::new(Uuid::new_v4(), Uuid::new_v4(), "photo.png", &source, 1);
        let ctx = context(dir.path());

        ImagePreviewPlugin::new().process(&mut item, &ctx).await.unwrap();

        let metadata = item.metadata.unwrap();
        assert_eq!(metadata["kind"], "image");
        assert_eq!(metadata["width"], 640);
        assert_eq!(metadata["height"], 480);
        assert_eq!(metadata["format"], "png");

        let poster = ctx.asset_path(metadata["poster"].as_str().unwrap());
        let (w, h) = image::image_dimensions(&poster).unwrap();
        assert_eq!((w, h), (320, 240));
    }

    #[tokio::test]
    async fn test_process_rejects_non_image_bytes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("fake.jpg");
        tokio::fs::write(&source, b"definitely not a jpeg").await.unwrap();

        let mut item = UploadItem::new(Uuid::new_v4(), Uuid::new_v4(), "fake.jpg", &source, 21);
        let result = ImagePreviewPlugin::new()
            .process(&mut item, &context(dir.path()))
            .await;

        assert!(result.is_err());
        assert!(item.metadata.is_none());
    }

    #[tokio::test]
    async fn test_process_honours_cancellation() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.cancel.cancel();

        let mut item = UploadItem::new(Uuid::new_v4(), Uuid::new_v4(), "a.png", dir.path().join("a.png"), 0);
        assert!(ImagePreviewPlugin::new().process(&mut item, &ctx).await.is_err());
    }
}
