//! Frame acquisition for the market table.
//!
//! This module provides:
//! - Region selection from two corners (`region`, `cursor`)
//! - Live screen grabs of a region (`screen`)
//! - Replay of saved screenshots (`replay`)

pub mod cursor;
pub mod region;
pub mod replay;
pub mod screen;

pub use region::{select, Point, ScreenRegion};
pub use replay::ReplaySource;
pub use screen::ScreenCapturer;

use chrono::{DateTime, Local};
use image::RgbaImage;

use crate::error::CaptureError;

/// A raster grab of the region, owned by a single tick.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: RgbaImage,
    pub captured_at: DateTime<Local>,
}

impl CapturedFrame {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            captured_at: Local::now(),
        }
    }
}

/// Something that can produce a frame for a screen region.
pub trait FrameSource {
    fn capture(&mut self, region: &ScreenRegion) -> Result<CapturedFrame, CaptureError>;
}
