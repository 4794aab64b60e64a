//! Frames read from saved screenshots instead of the live screen.
//!
//! Useful for re-running the pipeline on recorded sessions and on machines
//! without a capture backend.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use super::{CapturedFrame, FrameSource, ScreenRegion};
use crate::error::CaptureError;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Cycles through a fixed list of image files, one per capture.
#[derive(Debug)]
pub struct ReplaySource {
    files: Vec<PathBuf>,
    next: usize,
}

impl ReplaySource {
    /// Accepts a single image file or a directory of images (sorted by name).
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let files = if path.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_image_extension(p))
                .collect();
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };

        if files.is_empty() {
            return Err(CaptureError::NoFrames(path.to_path_buf()));
        }

        log::info!("Replaying {} frame(s) from {}", files.len(), path.display());
        Ok(Self { files, next: 0 })
    }
}

impl FrameSource for ReplaySource {
    fn capture(&mut self, region: &ScreenRegion) -> Result<CapturedFrame, CaptureError> {
        let path = &self.files[self.next];
        self.next = (self.next + 1) % self.files.len();

        let img = image::open(path)
            .map_err(|source| CaptureError::Image {
                path: path.clone(),
                source,
            })?
            .to_rgba8();

        log::debug!("Replay frame {} ({}x{})", path.display(), img.width(), img.height());
        Ok(CapturedFrame::new(crop_to_region(img, region)))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Crops a full-screen shot down to the region.
///
/// Frames that already have the region's size, and empty regions, are passed
/// through unchanged. The crop is clamped to the image bounds.
fn crop_to_region(img: RgbaImage, region: &ScreenRegion) -> RgbaImage {
    let (w, h) = img.dimensions();
    if region.is_empty() || (region.width() == w && region.height() == h) {
        return img;
    }

    let (x0, rw) = clamp_span(region.min_x(), region.width(), w);
    let (y0, rh) = clamp_span(region.min_y(), region.height(), h);

    image::imageops::crop_imm(&img, x0, y0, rw, rh).to_image()
}

/// Clips `[start, start + len)` to `[0, limit)`, returning the new start and length.
fn clamp_span(start: i32, len: u32, limit: u32) -> (u32, u32) {
    let cut = if start < 0 { start.unsigned_abs() } else { 0 };
    let begin = (start.max(0) as u32).min(limit);
    (begin, len.saturating_sub(cut).min(limit - begin))
}
