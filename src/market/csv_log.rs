//! Append-only CSV log of market listings.
//!
//! Format: `Item,Quantity,Price,Merchant,Date,Time`, one listing per line.
//! The listings of one tick are encoded in memory and reach the file in a
//! single write, followed by a sync, so an interrupted process leaves either
//! all of a tick's rows or none of them.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{Fingerprint, MarketRecord};
use crate::error::PersistenceError;
use crate::paths;

/// CSV header row, written when the log is created.
pub const CSV_HEADER: [&str; 6] = ["Item", "Quantity", "Price", "Merchant", "Date", "Time"];

/// Open handle to the market log. Lives for the whole scanning session.
pub struct MarketLog {
    path: PathBuf,
    file: File,
}

impl MarketLog {
    /// Opens the log for appending, creating it (and its directory) if needed.
    ///
    /// A new or empty file gets the header row. A file whose last line was
    /// cut short is terminated first so the next row starts on its own line.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let io_err = |source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        };

        paths::ensure_parent_dir(path).map_err(io_err)?;

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(io_err)?;

        let len = file.metadata().map_err(io_err)?.len();
        let needs_header = len == 0;
        if !needs_header && !ends_with_newline(&mut file, len).map_err(io_err)? {
            file.write_all(b"\n").map_err(io_err)?;
        }

        let mut log = Self {
            path: path.to_path_buf(),
            file,
        };

        if needs_header {
            let header = log.encode(std::iter::once(CSV_HEADER))?;
            log.write_and_sync(&header)?;
            log::info!("Created market log: {}", path.display());
        }

        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fingerprints of every listing already in the log.
    ///
    /// The header, rows with fewer than 4 fields, and rows whose quantity or
    /// price is not a number are skipped.
    pub fn fingerprints(&self) -> Result<Vec<Fingerprint>, PersistenceError> {
        let csv_err = |source| PersistenceError::Csv {
            path: self.path.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(csv_err)?;

        let mut fingerprints = Vec::new();
        let mut skipped = 0usize;

        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Skipping unreadable log row: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            if record.len() < 4 {
                skipped += 1;
                continue;
            }

            let quantity = record.get(1).and_then(|s| s.parse::<u32>().ok());
            let price = record.get(2).and_then(|s| s.parse::<u32>().ok());
            match (record.get(0), quantity, price, record.get(3)) {
                (Some(item), Some(quantity), Some(price), Some(merchant)) => {
                    fingerprints.push(Fingerprint::new(item, quantity, price, merchant));
                }
                _ => skipped += 1,
            }
        }

        log::debug!(
            "Loaded {} fingerprint(s) from {} ({} row(s) skipped)",
            fingerprints.len(),
            self.path.display(),
            skipped
        );
        Ok(fingerprints)
    }

    /// Appends a batch of listings with one write and syncs it to disk.
    pub fn append_all(&mut self, records: &[MarketRecord]) -> Result<(), PersistenceError> {
        if records.is_empty() {
            return Ok(());
        }

        let rows = records.iter().map(|record| {
            [
                record.item.clone(),
                record.quantity.to_string(),
                record.price.to_string(),
                record.merchant.clone(),
                record.date.clone(),
                record.time.clone(),
            ]
        });
        let bytes = self.encode(rows)?;
        self.write_and_sync(&bytes)
    }

    /// Renders rows as CSV lines, quoting fields where needed.
    fn encode<I, R, F>(&self, rows: I) -> Result<Vec<u8>, PersistenceError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        let csv_err = |source| PersistenceError::Csv {
            path: self.path.clone(),
            source,
        };

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        for row in rows {
            writer.write_record(row).map_err(csv_err)?;
        }
        writer.into_inner().map_err(|e| PersistenceError::Io {
            path: self.path.clone(),
            source: std::io::Error::new(e.error().kind(), e.to_string()),
        })
    }

    fn write_and_sync(&mut self, bytes: &[u8]) -> Result<(), PersistenceError> {
        let io_err = |source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        };
        self.file.write_all(bytes).map_err(io_err)?;
        self.file.sync_data().map_err(io_err)
    }
}

fn ends_with_newline(file: &mut File, len: u64) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn record(item: &str, quantity: u32, price: u32, merchant: &str) -> MarketRecord {
        MarketRecord {
            item: item.to_string(),
            quantity,
            price,
            merchant: merchant.to_string(),
            date: "2024-03-07".to_string(),
            time: "12:00:00".to_string(),
        }
    }

    #[test]
    fn test_open_creates_header_and_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("market_scan.csv");

        MarketLog::open(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Item,Quantity,Price,Merchant,Date,Time\n");
    }

    #[test]
    fn test_append_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("market_scan.csv");

        let mut log = MarketLog::open(&path).unwrap();
        log.append_all(&[record("Зелье лечения", 5, 1200, "Лавка")]).unwrap();
        log.append_all(&[record("Щит", 2, 900, "магазин")]).unwrap();
        drop(log);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3); // header + 2 rows
        assert_eq!(lines[1], "Зелье лечения,5,1200,Лавка,2024-03-07,12:00:00");

        // Reopening keeps existing rows and does not repeat the header
        let log = MarketLog::open(&path).unwrap();
        let fingerprints = log.fingerprints().unwrap();
        assert_eq!(
            fingerprints,
            vec![
                Fingerprint::new("зелье лечения", 5, 1200, "лавка"),
                Fingerprint::new("щит", 2, 900, "магазин"),
            ]
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("market_scan.csv");

        let mut log = MarketLog::open(&path).unwrap();
        log.append_all(&[record("Меч, древний", 1, 500, "Лавка")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"Меч, древний\",1,500"));
        assert_eq!(
            log.fingerprints().unwrap(),
            vec![Fingerprint::new("Меч, древний", 1, 500, "Лавка")]
        );
    }

    #[test]
    fn test_fingerprints_tolerate_missing_header_and_short_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("market_scan.csv");
        fs::write(
            &path,
            "Щит,2,900,магазин,2024-03-07,12:00:00\n\
             broken,row\n\
             Меч,abc,500,Лавка\n\
             Зелье , 5 , 1200 , Лавка\n",
        )
        .unwrap();

        let log = MarketLog::open(&path).unwrap();
        assert_eq!(
            log.fingerprints().unwrap(),
            vec![
                Fingerprint::new("щит", 2, 900, "магазин"),
                Fingerprint::new("зелье", 5, 1200, "лавка"),
            ]
        );
    }

    #[test]
    fn test_open_terminates_cut_off_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("market_scan.csv");
        fs::write(&path, "Item,Quantity,Price,Merchant,Date,Time\nЩит,2,900,магазин,2024-03-07,12:00:00").unwrap();

        let mut log = MarketLog::open(&path).unwrap();
        log.append_all(&[record("Меч", 1, 500, "Лавка")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert_eq!(log.fingerprints().unwrap().len(), 2);
    }

    #[test]
    fn test_append_all_writes_whole_batch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("market_scan.csv");

        let mut log = MarketLog::open(&path).unwrap();
        log.append_all(&[]).unwrap();
        log.append_all(&[
            record("Зелье лечения", 5, 100, "Лавка 2"),
            record("Щит", 2, 900, "магазин"),
            record("Меч", 1, 500, "Лавка"),
        ])
        .unwrap();
        drop(log);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Item,Quantity,Price,Merchant,Date,Time\n\
             Зелье лечения,5,100,Лавка 2,2024-03-07,12:00:00\n\
             Щит,2,900,магазин,2024-03-07,12:00:00\n\
             Меч,1,500,Лавка,2024-03-07,12:00:00\n"
        );
    }
}
