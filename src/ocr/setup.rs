use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::engine::OcrSettings;
use crate::error::RecognitionError;
use crate::paths;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];
#[cfg(not(windows))]
const COMMON_INSTALL_DIRS: &[&str] = &["/usr/bin", "/usr/local/bin", "/opt/homebrew/bin"];

#[cfg(windows)]
const COMMON_TESSDATA_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const COMMON_TESSDATA_DIRS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

/// Where the engine executable and its language data live.
#[derive(Debug, Clone)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

pub const INSTALL_INSTRUCTIONS: &str = "Tesseract-OCR is required:\n\
     1. Windows: download the installer from https://github.com/UB-Mannheim/tesseract/wiki\n\
     2. Linux: install the tesseract-ocr package (and tesseract-ocr-rus)\n\
     3. Or point ocr.tesseract_path in config.json at the executable";

/// Locates Tesseract and makes sure every configured language is available.
///
/// Missing `<lang>.traineddata` files are copied from a system install when
/// one has them, otherwise downloaded into the local data directory.
pub fn ensure_tesseract(settings: &OcrSettings) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(settings.tesseract_path.as_deref())
        .map_err(|e| anyhow!("{}\n{}", e, INSTALL_INSTRUCTIONS))?;
    log::info!("Tesseract executable: {}", executable.display());

    if let Some(tessdata) = find_tessdata_dir(settings.tessdata_dir.as_deref(), &settings.languages) {
        log::info!("Tesseract language data: {}", tessdata.display());
        return Ok(TesseractPaths {
            executable,
            tessdata,
        });
    }

    // Nothing has every language: build up the local data directory
    let tessdata = settings
        .tessdata_dir
        .clone()
        .unwrap_or_else(paths::get_local_tessdata_dir);
    fs::create_dir_all(&tessdata)
        .with_context(|| format!("Failed to create {}", tessdata.display()))?;

    for lang in missing_languages(&tessdata, &settings.languages) {
        if !copy_from_system(&tessdata, &lang)? {
            download_tessdata(&tessdata, &lang)?;
        }
    }

    if let Some(lang) = missing_languages(&tessdata, &settings.languages).into_iter().next() {
        return Err(RecognitionError::LanguageDataMissing { lang, dir: tessdata }.into());
    }

    log::info!("Tesseract language data ready at: {}", tessdata.display());
    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Finds the Tesseract executable: configured path, local data dir, `PATH`,
/// then common install locations.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf, RecognitionError> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        log::warn!("Configured tesseract_path {} does not exist", path.display());
    }

    let local_exe = paths::get_local_tessdata_dir()
        .parent()
        .map(|dir| dir.join(EXECUTABLE_NAME));
    if let Some(exe) = local_exe.filter(|p| p.is_file()) {
        return Ok(exe);
    }

    // Check PATH
    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_INSTALL_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(EXECUTABLE_NAME))
        .find(|p| p.is_file())
        .ok_or(RecognitionError::EngineNotFound)
}

/// Finds a tessdata directory that holds every requested language.
pub fn find_tessdata_dir(configured: Option<&Path>, languages: &[String]) -> Option<PathBuf> {
    tessdata_candidates(configured)
        .into_iter()
        .find(|dir| missing_languages(dir, languages).is_empty())
}

fn tessdata_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = configured {
        candidates.push(dir.to_path_buf());
    }

    // Check TESSDATA_PREFIX environment variable
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }

    candidates.push(paths::get_local_tessdata_dir());
    candidates.extend(COMMON_TESSDATA_DIRS.iter().map(PathBuf::from));
    candidates
}

/// Languages whose `.traineddata` file is not present in `dir`.
pub fn missing_languages(dir: &Path, languages: &[String]) -> Vec<String> {
    languages
        .iter()
        .filter(|lang| !traineddata_path(dir, lang).is_file())
        .cloned()
        .collect()
}

fn traineddata_path(dir: &Path, lang: &str) -> PathBuf {
    dir.join(format!("{}.traineddata", lang))
}

/// Copies a language file from a system install. Returns false if none has it.
fn copy_from_system(tessdata_dir: &Path, lang: &str) -> Result<bool> {
    for dir in COMMON_TESSDATA_DIRS {
        let source = traineddata_path(Path::new(dir), lang);
        if source.is_file() {
            log::info!("Copying {}.traineddata from: {}", lang, dir);
            fs::copy(&source, traineddata_path(tessdata_dir, lang))?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Downloads `<lang>.traineddata` from the tessdata repository.
fn download_tessdata(tessdata_dir: &Path, lang: &str) -> Result<()> {
    let url = format!("{}/{}.traineddata", TESSDATA_REPO, lang);
    let target = traineddata_path(tessdata_dir, lang);

    log::info!("Downloading {}.traineddata...", lang);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "market-scanner")
        .send()
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}.traineddata: HTTP {}",
            lang,
            response.status()
        ));
    }

    let bytes = response.bytes()?;

    // Write next to the target first so an interrupted download never looks complete
    let partial = tessdata_dir.join(format!("{}.traineddata.part", lang));
    let mut file = fs::File::create(&partial)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&partial, &target)?;

    log::info!("Downloaded {}.traineddata ({} bytes)", lang, bytes.len());
    Ok(())
}
