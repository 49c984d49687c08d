use std::io::Cursor;
use std::path::PathBuf;

use anyhow::{Context, Result};
use image::ImageReader;
use serde::{Deserialize, Serialize};

use crate::geometry::ImageSize;

/// Where the editor's reference image comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Natural pixel size of the image. Decoding runs on the blocking pool.
pub async fn load_image_size(source: ImageSource) -> Result<ImageSize> {
    tokio::task::spawn_blocking(move || decode_size(&source))
        .await
        .context("image decode worker join failed")?
}

fn decode_size(source: &ImageSource) -> Result<ImageSize> {
    let (width, height) = match source {
        ImageSource::Path(path) => image::image_dimensions(path)
            .with_context(|| format!("failed to read image {}", path.display()))?,
        ImageSource::Bytes(bytes) => ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .context("failed to read image bytes")?
            .into_dimensions()
            .context("failed to decode image header")?,
    };
    anyhow::ensure!(width > 0 && height > 0, "image has no pixels");
    Ok(ImageSize::new(width, height))
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::RgbImage::new(width, height)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_natural_size_from_bytes_and_files() {
        let bytes = png_bytes(1000, 800);
        let size = load_image_size(ImageSource::Bytes(bytes.clone())).await.unwrap();
        assert_eq!(size, ImageSize::new(1000, 800));

        let path = std::env::temp_dir().join(format!("parkzone-{}.png", uuid::Uuid::new_v4()));
        std::fs::write(&path, bytes).unwrap();
        let size = load_image_size(ImageSource::Path(path.clone())).await.unwrap();
        assert_eq!(size, ImageSize::new(1000, 800));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn garbage_and_missing_files_fail() {
        assert!(load_image_size(ImageSource::Bytes(vec![1, 2, 3])).await.is_err());
        let mut truncated = png_bytes(64, 32);
        truncated.truncate(8);
        assert!(load_image_size(ImageSource::Bytes(truncated)).await.is_err());
        let missing = std::env::temp_dir().join("parkzone-definitely-missing.png");
        assert!(load_image_size(ImageSource::Path(missing)).await.is_err());
    }
}
