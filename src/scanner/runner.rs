//! Ingestion loop: capture → preprocess → recognize → correct → parse →
//! dedup → persist, once per tick.

use anyhow::{Context, Result};
use chrono::Local;
use image::GrayImage;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::shutdown::StopFlag;
use super::state::{ScanState, TickOutcome, TickStats};
use crate::capture::{FrameSource, ScreenRegion};
use crate::config::ScannerConfig;
use crate::error::PersistenceError;
use crate::market::{DedupStore, MarketLog, RowParser, TextCorrector};
use crate::ocr::{preprocess, PreprocessConfig, TextRecognizer};
use crate::paths;

/// Longest single sleep between stop-flag checks while waiting for a tick.
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Totals for a whole scanning session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub skipped: u64,
    pub saved: u64,
}

/// Drives the pipeline for one screen region.
///
/// Owns the market log handle and the dedup set; nothing else touches them.
pub struct IngestionLoop<S, R> {
    source: S,
    recognizer: R,
    region: ScreenRegion,
    preprocess: PreprocessConfig,
    corrector: TextCorrector,
    parser: RowParser,
    log: MarketLog,
    dedup: DedupStore,
    debug_dir: Option<PathBuf>,
    state: ScanState,
    scan_count: u64,
}

impl<S: FrameSource, R: TextRecognizer> IngestionLoop<S, R> {
    /// Builds the loop and loads the fingerprints already in `log`.
    pub fn new(
        source: S,
        recognizer: R,
        region: ScreenRegion,
        config: &ScannerConfig,
        log: MarketLog,
    ) -> Result<Self> {
        let dedup = DedupStore::load(&log).context("Failed to load existing market log")?;

        Ok(Self {
            source,
            recognizer,
            region,
            preprocess: config.preprocess,
            corrector: TextCorrector::new().context("Failed to build text corrections")?,
            parser: RowParser::new(config.parser).context("Failed to build row patterns")?,
            log,
            dedup,
            debug_dir: config.debug_dir.clone(),
            state: ScanState::Idle,
            scan_count: 0,
        })
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    fn enter(&mut self, next: ScanState) {
        log::trace!("{} -> {}", self.state, next);
        self.state = next;
    }

    /// Abandons the tick at the current stage.
    fn skip(&mut self) -> TickOutcome {
        let stage = self.state;
        self.enter(ScanState::Idle);
        TickOutcome::Skipped(stage)
    }

    /// Runs one full pass of the pipeline.
    ///
    /// Capture and recognition failures skip the tick. The tick's new
    /// listings are appended as one batch and only then added to the dedup
    /// set. A log write failure is returned, since continuing could let the
    /// dedup set drift from the log.
    pub fn tick(&mut self) -> Result<TickOutcome, PersistenceError> {
        self.scan_count += 1;
        let tick_time = Local::now();
        log::info!("=== Scan #{} ===", self.scan_count);

        self.enter(ScanState::Capturing);
        let frame = match self.source.capture(&self.region) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Capture failed: {}", e);
                return Ok(self.skip());
            }
        };

        log::debug!(
            "Frame {}x{} captured at {}",
            frame.image.width(),
            frame.image.height(),
            frame.captured_at.format("%H:%M:%S%.3f")
        );

        self.enter(ScanState::Preprocessing);
        let processed = preprocess(&frame.image, &self.preprocess);

        self.enter(ScanState::Recognizing);
        let raw_text = match self.recognizer.recognize(&processed) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("OCR failed: {}", e);
                if let Some(dir) = &self.debug_dir {
                    save_debug_frame(dir, self.scan_count, &processed);
                }
                return Ok(self.skip());
            }
        };

        self.enter(ScanState::Correcting);
        let text = self.corrector.correct(&raw_text);
        log::debug!("Recognized text:\n{}", text);

        self.enter(ScanState::Parsing);
        let rows = self.parser.parse(&text);
        log::info!("Rows found: {}", rows.len());

        self.enter(ScanState::Persisting);
        let mut stats = TickStats {
            parsed: rows.len(),
            ..TickStats::default()
        };

        // New listings of this tick, also deduplicated against each other
        let mut fresh = HashSet::new();
        let mut batch = Vec::new();
        for row in rows {
            let record = row.stamp(tick_time);
            let fingerprint = record.fingerprint();
            if self.dedup.has(&fingerprint) || !fresh.insert(fingerprint) {
                log::debug!("Duplicate: {}", record.item);
                stats.duplicates += 1;
                continue;
            }
            batch.push(record);
        }

        if let Err(e) = self.log.append_all(&batch) {
            self.enter(ScanState::Idle);
            return Err(e);
        }
        for fingerprint in fresh {
            self.dedup.record(fingerprint);
        }
        stats.saved = batch.len();

        for record in &batch {
            log::info!(
                "Added: {} x{} = {} ({})",
                record.item,
                record.quantity,
                record.price,
                record.merchant
            );
        }

        if stats.saved > 0 {
            log::info!(
                "Saved {} new record(s), {} already known",
                stats.saved,
                stats.duplicates
            );
        } else if stats.parsed > 0 {
            log::info!("All rows already in the log");
        }

        self.enter(ScanState::Idle);
        Ok(TickOutcome::Completed(stats))
    }

    /// Ticks every `interval` until `stop` is set.
    ///
    /// A tick that runs past the interval delays the next one; ticks never
    /// overlap. The flag is only checked between ticks.
    pub fn run(&mut self, stop: &StopFlag, interval: Duration) -> Result<RunSummary, PersistenceError> {
        let mut summary = RunSummary::default();
        let mut next_tick = Instant::now();

        log::info!("Scanning {} every {:?} (type q + Enter to stop)", self.region, interval);

        while !stop.is_requested() {
            match self.tick()? {
                TickOutcome::Completed(stats) => summary.saved += stats.saved as u64,
                TickOutcome::Skipped(_) => summary.skipped += 1,
            }
            summary.ticks += 1;

            next_tick += interval;
            let now = Instant::now();
            if next_tick <= now {
                log::debug!("Scan took longer than the interval, starting next one now");
                next_tick = now;
                continue;
            }
            sleep_until(next_tick, stop);
        }

        log::info!(
            "Scanning stopped: {} scan(s), {} skipped, {} new record(s)",
            summary.ticks,
            summary.skipped,
            summary.saved
        );
        Ok(summary)
    }
}

/// Sleeps until `deadline`, waking early if a stop is requested.
fn sleep_until(deadline: Instant, stop: &StopFlag) {
    loop {
        if stop.is_requested() {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(MAX_SLEEP_SLICE));
    }
}

/// Saves a preprocessed frame the engine could not read.
fn save_debug_frame(dir: &Path, scan: u64, img: &GrayImage) {
    let path = dir.join(format!(
        "scan_{:05}_{}.png",
        scan,
        Local::now().format("%Y%m%d_%H%M%S")
    ));

    let result = paths::ensure_parent_dir(&path)
        .map_err(anyhow::Error::from)
        .and_then(|_| img.save(&path).map_err(anyhow::Error::from));

    match result {
        Ok(()) => log::info!("Saved failed frame to {}", path.display()),
        Err(e) => log::warn!("Failed to save debug frame {}: {}", path.display(), e),
    }
}
