//! Scan state machine states.
//!
//! One tick walks Idle → Capturing → Preprocessing → Recognizing →
//! Correcting → Parsing → Persisting → Idle. A failed capture or recognition
//! goes straight back to Idle.

/// Stage the ingestion loop is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Between ticks
    Idle,
    /// Grabbing the region from the screen
    Capturing,
    /// Upscaling and binarizing the frame
    Preprocessing,
    /// Running the OCR engine
    Recognizing,
    /// Fixing known misreads
    Correcting,
    /// Extracting rows from lines
    Parsing,
    /// Deduplicating and appending to the log
    Persisting,
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanState::Idle => write!(f, "Idle"),
            ScanState::Capturing => write!(f, "Capturing"),
            ScanState::Preprocessing => write!(f, "Preprocessing"),
            ScanState::Recognizing => write!(f, "Recognizing"),
            ScanState::Correcting => write!(f, "Correcting"),
            ScanState::Parsing => write!(f, "Parsing"),
            ScanState::Persisting => write!(f, "Persisting"),
        }
    }
}

/// Row counts for one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Rows the parser produced
    pub parsed: usize,
    /// Rows appended to the log
    pub saved: usize,
    /// Rows already in the log
    pub duplicates: usize,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every accepted row was persisted
    Completed(TickStats),
    /// Abandoned at the given stage; nothing was written
    Skipped(ScanState),
}
