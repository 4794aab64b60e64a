//! Market rows: from corrected OCR text to the deduplicated CSV log.
//!
//! This module provides:
//! - OCR text correction (`correct`)
//! - Row extraction with an ordered pattern list (`parse`)
//! - Fingerprint-based deduplication (`dedup`)
//! - The append-only market log (`csv_log`)

pub mod correct;
pub mod csv_log;
pub mod dedup;
pub mod parse;

pub use correct::TextCorrector;
pub use csv_log::MarketLog;
pub use dedup::DedupStore;
pub use parse::{ParserConfig, RowParser};

use chrono::{DateTime, Local};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// A row extracted from one OCR line, not yet timestamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    pub item: String,
    pub quantity: u32,
    pub price: u32,
    pub merchant: String,
}

impl ParsedRow {
    /// Completes the row with the tick's date and time.
    pub fn stamp(self, at: DateTime<Local>) -> MarketRecord {
        MarketRecord {
            item: self.item,
            quantity: self.quantity,
            price: self.price,
            merchant: self.merchant,
            date: at.format(DATE_FORMAT).to_string(),
            time: at.format(TIME_FORMAT).to_string(),
        }
    }
}

/// One persisted market listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketRecord {
    pub item: String,
    pub quantity: u32,
    pub price: u32,
    pub merchant: String,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM:SS
    pub time: String,
}

impl MarketRecord {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(&self.item, self.quantity, self.price, &self.merchant)
    }
}

/// Identity of a listing for deduplication. Date and time are not part of it,
/// so the same listing seen on later ticks is recognized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    item: String,
    quantity: u32,
    price: u32,
    merchant: String,
}

impl Fingerprint {
    /// Text fields are trimmed and case-folded.
    pub fn new(item: &str, quantity: u32, price: u32, merchant: &str) -> Self {
        Self {
            item: item.trim().to_lowercase(),
            quantity,
            price,
            merchant: merchant.trim().to_lowercase(),
        }
    }
}
