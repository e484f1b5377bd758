use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;

use super::{CaptureFrame, FrameSource};

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Decodes any format the `image` crate understands and re-encodes it as
/// JPEG, the way a browser canvas export would.
pub fn normalize_to_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).context("unsupported or corrupt image")?;
    let rgb = decoded.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(anyhow!("image has no pixels"));
    }

    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&rgb)
        .context("failed to encode JPEG")?;
    Ok(out.into_inner())
}

fn read_and_normalize(path: &Path, quality: u8) -> Result<Vec<u8>> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read image {}", path.display()))?;
    normalize_to_jpeg(&raw, quality)
        .with_context(|| format!("failed to normalise image {}", path.display()))
}

/// An uploaded photo. Decoded once; every capture yields the same frame.
pub struct PhotoSource {
    label: String,
    jpeg: Vec<u8>,
}

impl PhotoSource {
    pub async fn open(path: impl Into<PathBuf>, quality: u8) -> Result<Self> {
        let path = path.into();
        let label = format!("photo {}", path.display());
        let jpeg = tokio::task::spawn_blocking(move || read_and_normalize(&path, quality))
            .await
            .context("photo decode worker join failed")??;
        Ok(Self { label, jpeg })
    }
}

#[async_trait]
impl FrameSource for PhotoSource {
    async fn current_frame(&self) -> Result<CaptureFrame> {
        Ok(CaptureFrame::new(self.jpeg.clone()))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// A file rewritten by an external camera grabber. Re-read on every capture
/// so each auto-capture tick sees the latest snapshot.
pub struct StillFileSource {
    path: PathBuf,
    quality: u8,
}

impl StillFileSource {
    pub fn new(path: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            path: path.into(),
            quality,
        }
    }
}

#[async_trait]
impl FrameSource for StillFileSource {
    async fn current_frame(&self) -> Result<CaptureFrame> {
        let path = self.path.clone();
        let quality = self.quality;
        let jpeg = tokio::task::spawn_blocking(move || read_and_normalize(&path, quality))
            .await
            .context("snapshot decode worker join failed")??;
        Ok(CaptureFrame::new(jpeg))
    }

    fn describe(&self) -> String {
        format!("snapshot file {}", self.path.display())
    }
}
