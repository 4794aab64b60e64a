//! Text recognition for captured frames.
//!
//! This module provides:
//! - Upscaling and binarization of frames (`preprocess`)
//! - The `TextRecognizer` seam and its Tesseract implementation (`engine`)
//! - Locating Tesseract and its language data (`setup`)

pub mod engine;
pub mod preprocess;
pub mod setup;

pub use engine::{OcrSettings, PageSegMode, TesseractEngine, TextRecognizer};
pub use preprocess::{preprocess, PreprocessConfig};
pub use setup::ensure_tesseract;
