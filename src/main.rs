//! Market Scanner
//!
//! Watches an on-screen marketplace table, reads it with Tesseract and
//! appends every listing it has not seen before to a CSV log.

mod capture;
mod config;
mod error;
mod logging;
mod market;
mod ocr;
mod paths;
mod scanner;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use capture::{cursor, FrameSource, ReplaySource, ScreenCapturer, ScreenRegion};
use config::ScannerConfig;
use market::{MarketLog, ParsedRow, RowParser, TextCorrector};
use ocr::{TesseractEngine, TextRecognizer};
use scanner::{IngestionLoop, StopFlag};

#[derive(Parser)]
#[command(name = "market-scanner", version)]
#[command(about = "Reads an in-game market table from the screen into a CSV log")]
struct Cli {
    /// Config file (defaults to config.json next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the market table continuously (default)
    Scan(ScanArgs),

    /// Run OCR on one image and print the rows found
    Ocr {
        /// Screenshot of the market table
        image: PathBuf,
    },

    /// Correct and parse a saved OCR text dump
    Parse {
        /// Text file with raw OCR output
        text_file: PathBuf,
    },
}

#[derive(Args, Default)]
struct ScanArgs {
    /// Table corners in screen pixels, any order
    #[arg(long, value_name = "X1,Y1,X2,Y2", allow_hyphen_values = true)]
    region: Option<ScreenRegion>,

    /// Milliseconds between scans
    #[arg(long)]
    interval_ms: Option<u64>,

    /// CSV log path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read frames from an image or a directory of images instead of the screen
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Run a single scan and exit
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    paths::ensure_directories()?;
    logging::init(&paths::get_logs_dir().join("market_scanner.log"));

    // Route panics through the logger so they reach the log file
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("[PANIC] {}", panic_info);
    }));

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(paths::get_default_config_path);
    let config = config::load_config(&config_path);

    match cli.command.unwrap_or(Commands::Scan(ScanArgs::default())) {
        Commands::Scan(args) => run_scan(config, args),
        Commands::Ocr { image } => run_ocr(&config, &image),
        Commands::Parse { text_file } => run_parse(&config, &text_file),
    }
}

fn run_scan(mut config: ScannerConfig, args: ScanArgs) -> Result<()> {
    if let Some(interval_ms) = args.interval_ms {
        config.tick_interval_ms = interval_ms;
    }
    if let Some(output) = args.output {
        config.output_csv = output;
    }

    let region = match args.region.or(config.region) {
        Some(region) => region,
        None => ask_for_region()?,
    };
    if region.is_empty() {
        log::warn!("Region {} has no area; every capture will fail", region);
    }

    let tesseract = ocr::ensure_tesseract(&config.ocr)?;
    let engine = TesseractEngine::new(tesseract, config.ocr.clone());

    let log = MarketLog::open(&config.output_csv)
        .with_context(|| format!("Failed to open {}", config.output_csv.display()))?;

    match &args.replay {
        Some(path) => {
            let source = ReplaySource::open(path)?;
            scan_with(source, engine, region, &config, log, args.once)
        }
        None => scan_with(ScreenCapturer::new(), engine, region, &config, log, args.once),
    }
}

fn scan_with<S: FrameSource, R: TextRecognizer>(
    source: S,
    recognizer: R,
    region: ScreenRegion,
    config: &ScannerConfig,
    log: MarketLog,
    once: bool,
) -> Result<()> {
    let mut scanner = IngestionLoop::new(source, recognizer, region, config, log)?;

    if once {
        let outcome = scanner.tick()?;
        log::info!("Single scan finished ({}): {:?}", scanner.state(), outcome);
        return Ok(());
    }

    let stop = StopFlag::new();
    scanner::install_console_handler(&stop)?;
    scanner::spawn_quit_watcher(BufReader::new(std::io::stdin()), stop.clone());

    if let Err(e) = scanner.run(&stop, Duration::from_millis(config.tick_interval_ms)) {
        log::error!("Stopping: {}", e);
        return Err(e.into());
    }
    Ok(())
}

/// One-time setup: read both table corners from the cursor.
fn ask_for_region() -> Result<ScreenRegion> {
    log::info!("No region configured, reading table corners from the cursor");

    let stdin = std::io::stdin();
    let region = cursor::prompt_for_region(&mut stdin.lock(), cursor::get_cursor_position)?;

    log::info!("Region: {}", region);
    if let Ok(json) = serde_json::to_string(&region) {
        log::info!("Add \"region\": {} to config.json to skip this step", json);
    }
    Ok(region)
}

fn run_ocr(config: &ScannerConfig, image_path: &Path) -> Result<()> {
    let img = image::open(image_path)
        .with_context(|| format!("Failed to open {}", image_path.display()))?
        .to_rgba8();

    let tesseract = ocr::ensure_tesseract(&config.ocr)?;
    let engine = TesseractEngine::new(tesseract, config.ocr.clone());

    log::info!("Running OCR on {}...", image_path.display());
    let processed = ocr::preprocess(&img, &config.preprocess);

    let raw = match engine.recognize(&processed) {
        Ok(raw) => raw,
        Err(e) => {
            log::error!("OCR failed: {}", e);
            let debug_path = paths::get_exe_dir().join("debug_preprocessed.png");
            match processed.save(&debug_path) {
                Ok(()) => log::info!("Saved {} for inspection", debug_path.display()),
                Err(save_err) => log::warn!("Could not save debug image: {}", save_err),
            }
            return Err(e.into());
        }
    };

    print_rows(config, &raw)
}

fn run_parse(config: &ScannerConfig, text_file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(text_file)
        .with_context(|| format!("Failed to read {}", text_file.display()))?;
    print_rows(config, &raw)
}

/// Corrects and parses raw OCR text, printing the text and every row.
fn print_rows(config: &ScannerConfig, raw: &str) -> Result<()> {
    let corrector = TextCorrector::new()?;
    let parser = RowParser::new(config.parser)?;

    let text = corrector.correct(raw);
    println!("Corrected text:");
    println!("{}", text);

    let rows: Vec<ParsedRow> = parser.parse(&text);
    println!();
    println!("Rows found: {}", rows.len());
    for row in &rows {
        println!(
            "  {} x{} = {} ({})",
            row.item, row.quantity, row.price, row.merchant
        );
    }
    Ok(())
}
