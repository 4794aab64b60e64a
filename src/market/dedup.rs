use std::collections::HashSet;

use super::{Fingerprint, MarketLog};
use crate::error::PersistenceError;

/// Fingerprints of every listing already in the market log.
///
/// Grows with the log and is never pruned; reloading from the log after a
/// restart gives back the same set.
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: HashSet<Fingerprint>,
}

impl DedupStore {
    /// Builds the store from the listings already persisted in `log`.
    pub fn load(log: &MarketLog) -> Result<Self, PersistenceError> {
        let store: Self = log.fingerprints()?.into_iter().collect();
        if store.is_empty() {
            log::info!("No listings in {} yet", log.path().display());
        } else {
            log::info!("Loaded {} known listing(s) from {}", store.len(), log.path().display());
        }
        Ok(store)
    }

    pub fn has(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Marks a fingerprint as seen. Returns false if it already was.
    pub fn record(&mut self, fingerprint: Fingerprint) -> bool {
        self.seen.insert(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl FromIterator<Fingerprint> for DedupStore {
    fn from_iter<I: IntoIterator<Item = Fingerprint>>(iter: I) -> Self {
        Self {
            seen: iter.into_iter().collect(),
        }
    }
}
