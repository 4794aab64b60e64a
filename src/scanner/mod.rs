//! The scan loop and its state machine.
//!
//! This module provides:
//! - Scan states and per-tick outcomes (`state`)
//! - The fixed-interval ingestion loop (`runner`)
//! - Stop handling for Ctrl+C and the `q` command (`shutdown`)

pub mod runner;
pub mod shutdown;
pub mod state;

pub use runner::{IngestionLoop, RunSummary};
pub use shutdown::{install_console_handler, spawn_quit_watcher, StopFlag};
pub use state::{ScanState, TickOutcome, TickStats};
