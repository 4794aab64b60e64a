//! Error types for the scan pipeline.
//!
//! Capture and recognition failures skip the current tick; persistence
//! failures stop the scanner.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure to grab a frame from the screen (or a replay source).
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("display surface unavailable: {0}")]
    Unavailable(String),

    #[error("region {width}x{height} at ({x}, {y}) lies outside the visible screen")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },

    #[cfg_attr(windows, allow(dead_code))]
    #[error("screen capture is not supported on this platform")]
    Unsupported,

    #[error("no frames available in {}", .0.display())]
    NoFrames(PathBuf),

    #[error("failed to decode frame {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to turn a preprocessed image into text.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("tesseract executable not found; install Tesseract-OCR or set ocr.tesseract_path")]
    EngineNotFound,

    #[error("language data '{lang}.traineddata' missing from {}", dir.display())]
    LanguageDataMissing { lang: String, dir: PathBuf },

    #[error("image is empty or malformed ({width}x{height})")]
    MalformedImage { width: u32, height: u32 },

    #[error("tesseract failed: {0}")]
    EngineFailed(String),

    #[error("tesseract did not finish within {0:?}")]
    Timeout(Duration),

    #[error("failed to write OCR input image: {0}")]
    Image(#[from] image::ImageError),

    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to append to the market log.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("market log I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("market log CSV error on {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
