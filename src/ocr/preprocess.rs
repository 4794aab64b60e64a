use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, RgbaImage};
use serde::{Deserialize, Serialize};

/// Image preprocessing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Integer upscale factor applied before binarization
    pub scale_factor: u32,
    /// Luminance above this becomes white, everything else black
    pub threshold: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            scale_factor: 3,
            threshold: 70,
        }
    }
}

/// Perceptual luminance with integer weights (0.299, 0.587, 0.114).
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000) as u8
}

/// Upscales the frame and binarizes it for recognition.
///
/// The table is light text on a dark background, so bright pixels stay
/// white (255) and the rest become black (0). The output always has the
/// scaled dimensions and only those two levels.
pub fn preprocess(img: &RgbaImage, config: &PreprocessConfig) -> GrayImage {
    let scale = config.scale_factor.max(1);
    let (width, height) = img.dimensions();

    let scaled = if scale == 1 {
        img.clone()
    } else {
        imageops::resize(img, width * scale, height * scale, FilterType::CatmullRom)
    };

    let mut output: GrayImage = ImageBuffer::new(scaled.width(), scaled.height());
    for (x, y, pixel) in scaled.enumerate_pixels() {
        let gray = luminance(pixel[0], pixel[1], pixel[2]);
        let value = if gray > config.threshold { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}
