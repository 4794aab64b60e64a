use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;
use crate::error::RecognitionError;

/// How often a running Tesseract process is checked for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Tesseract page segmentation modes used by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    Auto,
    SingleColumn,
    SingleBlockVertText,
    SingleBlock,
    SparseText,
}

impl PageSegMode {
    /// Value for Tesseract's `--psm` argument.
    pub fn psm_arg(self) -> u8 {
        match self {
            PageSegMode::Auto => 3,
            PageSegMode::SingleColumn => 4,
            PageSegMode::SingleBlockVertText => 5,
            PageSegMode::SingleBlock => 6,
            PageSegMode::SparseText => 11,
        }
    }
}

/// Recognition settings, read from the `ocr` section of config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract language codes, recognized together (`rus+eng`)
    pub languages: Vec<String>,
    pub page_seg_mode: PageSegMode,
    /// Characters the engine must never emit; empty disables the blacklist
    pub char_blacklist: String,
    pub preserve_interword_spaces: bool,
    /// Per-image limit before the engine process is killed
    pub timeout_ms: u64,
    pub tesseract_path: Option<PathBuf>,
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            languages: vec!["rus".to_string(), "eng".to_string()],
            page_seg_mode: PageSegMode::SingleBlockVertText,
            char_blacklist: "!@#$%^&*()_+=|\\/[]{}<>`~".to_string(),
            preserve_interword_spaces: true,
            timeout_ms: 10_000,
            tesseract_path: None,
            tessdata_dir: None,
        }
    }
}

impl OcrSettings {
    /// Language argument in Tesseract's `a+b` form.
    pub fn language_arg(&self) -> String {
        self.languages.join("+")
    }

    /// Engine arguments that follow the input and output paths.
    fn engine_args(&self) -> Vec<String> {
        let mut args = vec![
            "-l".to_string(),
            self.language_arg(),
            "--psm".to_string(),
            self.page_seg_mode.psm_arg().to_string(),
        ];
        if !self.char_blacklist.is_empty() {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_blacklist={}", self.char_blacklist));
        }
        if self.preserve_interword_spaces {
            args.push("-c".to_string());
            args.push("preserve_interword_spaces=1".to_string());
        }
        args
    }
}

/// Turns a preprocessed image into raw text.
pub trait TextRecognizer {
    fn recognize(&self, img: &GrayImage) -> Result<String, RecognitionError>;
}

/// Recognizer backed by the Tesseract command-line executable.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    paths: TesseractPaths,
    settings: OcrSettings,
}

impl TesseractEngine {
    pub fn new(paths: TesseractPaths, settings: OcrSettings) -> Self {
        Self { paths, settings }
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, img: &GrayImage) -> Result<String, RecognitionError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(RecognitionError::MalformedImage { width, height });
        }

        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())?;

        let mut command = Command::new(&self.paths.executable);
        command
            .arg(temp_input.path())
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(&self.paths.tessdata)
            .args(self.settings.engine_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RecognitionError::EngineNotFound,
            _ => RecognitionError::Io(e),
        })?;

        let timeout = Duration::from_millis(self.settings.timeout_ms);
        let output = wait_with_timeout(child, timeout)?;

        if !output.success {
            return Err(RecognitionError::EngineFailed(output.stderr.trim().to_string()));
        }

        Ok(output.stdout)
    }
}

struct EngineOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Waits for the child, killing it once `timeout` has passed.
///
/// The pipes are drained on helper threads so a chatty process cannot block
/// on a full pipe while we poll.
fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<EngineOutput, RecognitionError> {
    let stdout_reader = child.stdout.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    });

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            log::warn!("Tesseract killed after {:?}", timeout);
            return Err(RecognitionError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };

    let collect = |reader: Option<thread::JoinHandle<Vec<u8>>>| {
        reader
            .and_then(|handle| handle.join().ok())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    };

    Ok(EngineOutput {
        success: status.success(),
        stdout: collect(stdout_reader),
        stderr: collect(stderr_reader),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_engine() -> TesseractEngine {
        TesseractEngine::new(
            TesseractPaths {
                executable: PathBuf::from("definitely-not-a-real-tesseract-binary"),
                tessdata: PathBuf::from("."),
            },
            OcrSettings::default(),
        )
    }

    #[test]
    fn test_default_engine_args() {
        let args = OcrSettings::default().engine_args();
        assert_eq!(
            args,
            vec![
                "-l",
                "rus+eng",
                "--psm",
                "5",
                "-c",
                "tessedit_char_blacklist=!@#$%^&*()_+=|\\/[]{}<>`~",
                "-c",
                "preserve_interword_spaces=1",
            ]
        );
    }

    #[test]
    fn test_engine_args_without_optional_variables() {
        let settings = OcrSettings {
            languages: vec!["eng".to_string()],
            page_seg_mode: PageSegMode::SingleBlock,
            char_blacklist: String::new(),
            preserve_interword_spaces: false,
            ..OcrSettings::default()
        };
        assert_eq!(settings.engine_args(), vec!["-l", "eng", "--psm", "6"]);
    }

    #[test]
    fn test_page_seg_mode_serde() {
        let mode: PageSegMode = serde_json::from_str("\"single_block_vert_text\"").unwrap();
        assert_eq!(mode, PageSegMode::SingleBlockVertText);
        assert_eq!(mode.psm_arg(), 5);
        assert_eq!(serde_json::to_string(&PageSegMode::SparseText).unwrap(), "\"sparse_text\"");
    }

    #[test]
    fn test_empty_image_is_malformed() {
        let result = missing_engine().recognize(&GrayImage::new(0, 0));
        assert!(matches!(
            result,
            Err(RecognitionError::MalformedImage { width: 0, height: 0 })
        ));
    }

    #[test]
    fn test_missing_executable_is_engine_not_found() {
        let result = missing_engine().recognize(&GrayImage::new(4, 4));
        assert!(matches!(result, Err(RecognitionError::EngineNotFound)));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_with_timeout_kills_slow_process() {
        let child = Command::new("sleep")
            .arg("5")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let started = Instant::now();
        let result = wait_with_timeout(child, Duration::from_millis(100));
        assert!(matches!(result, Err(RecognitionError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_with_timeout_collects_stdout() {
        let child = Command::new("echo")
            .arg("Меч 1 500 магазин")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let output = wait_with_timeout(child, Duration::from_secs(5)).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "Меч 1 500 магазин");
    }
}
