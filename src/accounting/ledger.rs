//! Accumulated minutes per application.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Stable application identifier (bundle id, WM_CLASS, executable name).
pub type AppId = String;

/// Mapping from application identifier to accumulated active minutes.
///
/// Entries only grow; the whole ledger is emptied by [`Ledger::clear`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    minutes: BTreeMap<AppId, f64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `minutes` to `app`, creating the entry at zero if needed.
    pub(crate) fn credit(&mut self, app: &str, minutes: f64) {
        let minutes = minutes.max(0.0);
        match self.minutes.get_mut(app) {
            Some(total) => *total += minutes,
            None => {
                self.minutes.insert(app.to_string(), minutes);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.minutes.clear();
    }

    /// Minutes recorded for `app`, if it has an entry.
    pub fn get(&self, app: &str) -> Option<f64> {
        self.minutes.get(app).copied()
    }

    pub fn len(&self) -> usize {
        self.minutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minutes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.minutes.iter().map(|(app, mins)| (app.as_str(), *mins))
    }

    /// Entries ordered by descending minutes, ties broken by identifier.
    pub fn by_usage(&self) -> Vec<(&str, f64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|(a_id, a), (b_id, b)| {
            b.partial_cmp(a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a_id.cmp(b_id))
        });
        entries
    }
}

/// Sum of every entry in the ledger.
pub fn total_minutes(ledger: &Ledger) -> f64 {
    ledger.iter().map(|(_, mins)| mins).sum()
}

/// Human-readable duration for a whole number of minutes.
///
/// Anything over an hour is shown in hours rounded to two decimals.
pub fn format_minutes(mins: u64) -> String {
    if mins > 60 {
        let hours = (mins as f64 * 100.0 / 60.0).round() / 100.0;
        return format!("{} hours", hours);
    }
    if mins == 1 {
        format!("{} minute", mins)
    } else {
        format!("{} minutes", mins)
    }
}
