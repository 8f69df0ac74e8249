//! Asset classification and conversion.
//!
//! Inspects raw downloaded bytes plus the remote path they came from,
//! assigns a format variant and stores the item file:
//!
//! 1. Vector-animation container (`.tgs`) — stored verbatim, `Animated`
//! 2. Video container (`.webm`) — stored verbatim, `Video`
//! 3. Raster with multiple frames — normalized to GIF, `Animated`
//! 4. Everything else that decodes — re-encoded to WebP q90, `Static`
//!
//! Conversion never drops an asset: any decode/encode failure falls back to
//! writing the original bytes unmodified with a best-effort tag. Only file
//! write errors escape to the caller.
//!
//! All functions here are blocking; the ingest pipeline calls them via
//! `spawn_blocking`.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, ImageFormat, ImageReader};
use thiserror::Error;

/// Format variant assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Animated,
    Video,
    Static,
}

impl AssetClass {
    /// The tag merged into the item's tag set
    pub fn tag(self) -> &'static str {
        match self {
            AssetClass::Animated => "Animated",
            AssetClass::Video => "Video",
            AssetClass::Static => "Static",
        }
    }
}

/// A stored item file and its classification
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub path: PathBuf,
    pub class: AssetClass,
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classify the raw bytes for item `index`, convert if needed, and write
/// the result into `dest_dir` as `item_<index>.<ext>`.
pub fn classify_and_store(
    bytes: &[u8],
    remote_path: &str,
    dest_dir: &Path,
    index: usize,
) -> Result<StoredAsset, AssetError> {
    std::fs::create_dir_all(dest_dir)?;

    let ext = remote_extension(remote_path);

    // Containers the raster pipeline cannot open are passed through as-is.
    if ext == "tgs" {
        return write_verbatim(bytes, dest_dir, index, "tgs", AssetClass::Animated);
    }
    if ext == "webm" {
        return write_verbatim(bytes, dest_dir, index, "webm", AssetClass::Video);
    }

    match convert_raster(bytes, dest_dir, index) {
        Ok(asset) => Ok(asset),
        Err(e) => {
            tracing::warn!("Conversion failed for item {}: {}; storing verbatim", index, e);
            let fallback_ext = if ext.is_empty() { "bin".to_string() } else { ext.clone() };
            let class = if ext == "gif" {
                AssetClass::Animated
            } else {
                AssetClass::Static
            };
            write_verbatim(bytes, dest_dir, index, &fallback_ext, class)
        }
    }
}

/// Lowercased extension of the remote path
fn remote_extension(remote_path: &str) -> String {
    Path::new(remote_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

fn write_verbatim(
    bytes: &[u8],
    dest_dir: &Path,
    index: usize,
    ext: &str,
    class: AssetClass,
) -> Result<StoredAsset, AssetError> {
    let path = dest_dir.join(format!("item_{}.{}", index, ext));
    std::fs::write(&path, bytes)?;
    Ok(StoredAsset { path, class })
}

/// Decode the bytes as a raster image and store the normalized form.
/// Errors here are contained by the caller's verbatim fallback.
fn convert_raster(
    bytes: &[u8],
    dest_dir: &Path,
    index: usize,
) -> Result<StoredAsset, Box<dyn std::error::Error + Send + Sync>> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;

    match reader.format() {
        Some(ImageFormat::Gif) => {
            let decoder = GifDecoder::new(Cursor::new(bytes))?;
            let frames = decoder.into_frames().collect_frames()?;
            if frames.len() > 1 {
                // Already a portable animated raster; keep the bytes
                let path = dest_dir.join(format!("item_{}.gif", index));
                std::fs::write(&path, bytes)?;
                Ok(StoredAsset {
                    path,
                    class: AssetClass::Animated,
                })
            } else {
                encode_static_webp(bytes, dest_dir, index)
            }
        }
        Some(ImageFormat::WebP) => {
            let decoder = WebPDecoder::new(Cursor::new(bytes))?;
            if decoder.has_animation() {
                let frames = decoder.into_frames().collect_frames()?;
                let path = dest_dir.join(format!("item_{}.gif", index));
                let file = std::fs::File::create(&path)?;
                let mut encoder = GifEncoder::new(file);
                encoder.set_repeat(Repeat::Infinite)?;
                encoder.encode_frames(frames.into_iter())?;
                Ok(StoredAsset {
                    path,
                    class: AssetClass::Animated,
                })
            } else {
                encode_static_webp(bytes, dest_dir, index)
            }
        }
        _ => encode_static_webp(bytes, dest_dir, index),
    }
}

/// Re-encode a decodable image to WebP quality 90
fn encode_static_webp(
    bytes: &[u8],
    dest_dir: &Path,
    index: usize,
) -> Result<StoredAsset, Box<dyn std::error::Error + Send + Sync>> {
    let img = image::load_from_memory(bytes)?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let encoded = webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode(90.0);

    let path = dest_dir.join(format!("item_{}.webp", index));
    std::fs::write(&path, &*encoded)?;

    Ok(StoredAsset {
        path,
        class: AssetClass::Static,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn png_bytes() -> Vec<u8> {
        let img = image::DynamicImage::new_rgba8(4, 4);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_tgs_stored_verbatim_tagged_animated() {
        let temp = TempDir::new().unwrap();
        let bytes = b"lottie-json-gz";
        let asset =
            classify_and_store(bytes, "stickers/file_1.tgs", temp.path(), 0).unwrap();

        assert_eq!(asset.class, AssetClass::Animated);
        assert_eq!(asset.path, temp.path().join("item_0.tgs"));
        assert_eq!(std::fs::read(&asset.path).unwrap(), bytes);
    }

    #[test]
    fn test_webm_stored_verbatim_tagged_video() {
        let temp = TempDir::new().unwrap();
        let asset =
            classify_and_store(b"video bytes", "videos/file_2.webm", temp.path(), 3).unwrap();

        assert_eq!(asset.class, AssetClass::Video);
        assert_eq!(asset.path, temp.path().join("item_3.webm"));
    }

    #[test]
    fn test_static_png_reencoded_to_webp() {
        let temp = TempDir::new().unwrap();
        let asset =
            classify_and_store(&png_bytes(), "stickers/file_3.png", temp.path(), 1).unwrap();

        assert_eq!(asset.class, AssetClass::Static);
        assert_eq!(asset.path, temp.path().join("item_1.webp"));
        assert!(asset.path.exists());
    }

    #[test]
    fn test_undecodable_bytes_fall_back_verbatim() {
        let temp = TempDir::new().unwrap();
        let garbage = b"definitely not an image";
        let asset =
            classify_and_store(garbage, "stickers/file_4.png", temp.path(), 2).unwrap();

        // Never dropped: original bytes land on disk with a best-effort tag
        assert_eq!(asset.class, AssetClass::Static);
        assert_eq!(asset.path, temp.path().join("item_2.png"));
        assert_eq!(std::fs::read(&asset.path).unwrap(), garbage);
    }

    #[test]
    fn test_extensionless_fallback_uses_bin() {
        let temp = TempDir::new().unwrap();
        let asset = classify_and_store(b"????", "mystery", temp.path(), 5).unwrap();
        assert_eq!(asset.path, temp.path().join("item_5.bin"));
    }

    #[test]
    fn test_animated_gif_kept_as_gif() {
        use image::{Delay, Frame, RgbaImage};

        // Build a 2-frame GIF in memory
        let mut buf = Cursor::new(Vec::new());
        {
            let mut encoder = GifEncoder::new(&mut buf);
            for shade in [0u8, 255u8] {
                let img = RgbaImage::from_pixel(2, 2, image::Rgba([shade, 0, 0, 255]));
                let frame =
                    Frame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(100, 1));
                encoder.encode_frames(std::iter::once(frame)).unwrap();
            }
        }
        let gif = buf.into_inner();

        let temp = TempDir::new().unwrap();
        let asset = classify_and_store(&gif, "stickers/anim.gif", temp.path(), 0).unwrap();

        assert_eq!(asset.class, AssetClass::Animated);
        assert_eq!(asset.path, temp.path().join("item_0.gif"));
        assert_eq!(std::fs::read(&asset.path).unwrap(), gif);
    }
}
