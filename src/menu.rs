//! Usage menu: the rows shown to the user for a ledger snapshot.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::accounting::{format_minutes, total_minutes, Ledger};

/// Shown instead of rows when nothing has reached the display threshold.
pub const EMPTY_PLACEHOLDER: &str = "Insufficient History... get to work!";

/// One application line of the usage menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRow {
    pub app_id: String,
    pub name: String,
    pub minutes: u64,
    pub label: String,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageMenu {
    Empty,
    Usage { rows: Vec<UsageRow>, total: String },
}

impl UsageMenu {
    /// Build the menu from a snapshot.
    ///
    /// Rows are sorted by descending usage and entries below `min_minutes`
    /// are hidden. `names` maps identifiers to display names.
    pub fn build(ledger: &Ledger, names: &HashMap<String, String>, min_minutes: f64) -> Self {
        let rows: Vec<UsageRow> = ledger
            .by_usage()
            .into_iter()
            .filter(|(_, mins)| *mins >= min_minutes)
            .map(|(id, mins)| {
                let minutes = round_minutes(mins);
                UsageRow {
                    app_id: id.to_string(),
                    name: names.get(id).cloned().unwrap_or_else(|| id.to_string()),
                    minutes,
                    label: format_minutes(minutes),
                }
            })
            .collect();

        if rows.is_empty() {
            return UsageMenu::Empty;
        }

        UsageMenu::Usage {
            rows,
            total: format_minutes(round_minutes(total_minutes(ledger))),
        }
    }
}

fn round_minutes(mins: f64) -> u64 {
    mins.max(0.0).round() as u64
}

/// Something that shows a usage menu to the user.
pub trait Presenter {
    fn render(&mut self, menu: &UsageMenu) -> io::Result<()>;
}

/// Renders the menu as aligned plain text.
pub struct TextPresenter<W: Write> {
    out: W,
}

impl<W: Write> TextPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for TextPresenter<W> {
    fn render(&mut self, menu: &UsageMenu) -> io::Result<()> {
        match menu {
            UsageMenu::Empty => writeln!(self.out, "{}", EMPTY_PLACEHOLDER)?,
            UsageMenu::Usage { rows, total } => {
                let width = rows
                    .iter()
                    .map(|row| row.name.chars().count())
                    .max()
                    .unwrap_or(0)
                    .max("Total".len());

                for row in rows {
                    writeln!(self.out, "{:<width$}  {:>14}", row.name, row.label, width = width)?;
                }
                writeln!(self.out, "{}", "-".repeat(width + 16))?;
                writeln!(self.out, "{:<width$}  {:>14}", "Total", total, width = width)?;
                writeln!(self.out, "[c] Clear History")?;
            }
        }
        self.out.flush()
    }
}
