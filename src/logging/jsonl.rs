//! JSONL journal of focus, idle and reset events.
//!
//! Append-only; nothing reads it back, so the ledger still starts empty on
//! every run.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::accounting::Ledger;

/// Journal event types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum JournalEvent {
    #[serde(rename = "session_start")]
    SessionStart {
        timestamp: DateTime<Utc>,
        version: String,
    },
    #[serde(rename = "session_end")]
    SessionEnd {
        timestamp: DateTime<Utc>,
        ledger: Ledger,
    },
    #[serde(rename = "focus_change")]
    FocusChange {
        timestamp: DateTime<Utc>,
        app_id: Option<String>,
    },
    #[serde(rename = "idle_start")]
    IdleStart { timestamp: DateTime<Utc> },
    #[serde(rename = "idle_end")]
    IdleEnd {
        timestamp: DateTime<Utc>,
        idle_duration_seconds: u64,
    },
    #[serde(rename = "reset")]
    Reset { timestamp: DateTime<Utc> },
}

/// Daily-rotated JSONL writer.
pub struct Journal {
    logs_dir: PathBuf,
    current_file: Option<BufWriter<File>>,
    current_date: Option<String>,
    idle_start_time: Option<DateTime<Utc>>,
}

impl Journal {
    /// Create a journal writing into `logs_dir`.
    pub fn new(logs_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        Ok(Self {
            logs_dir,
            current_file: None,
            current_date: None,
            idle_start_time: None,
        })
    }

    /// Get or create the log file for today.
    fn get_writer(&mut self) -> Result<&mut BufWriter<File>> {
        let today = Local::now().format("%Y-%m-%d").to_string();

        if self.current_date.as_ref() != Some(&today) {
            let log_path = self.logs_dir.join(format!("{}.jsonl", today));

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("Failed to open journal file: {:?}", log_path))?;

            self.current_file = Some(BufWriter::new(file));
            self.current_date = Some(today);

            debug!("Opened journal file: {:?}", log_path);
        }

        self.current_file
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("No journal file available"))
    }

    /// Write one event as a line.
    fn write_event(&mut self, event: &JournalEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        let writer = self.get_writer()?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    pub fn log_session_start(&mut self, version: &str) -> Result<()> {
        info!("Session started");
        self.write_event(&JournalEvent::SessionStart {
            timestamp: Utc::now(),
            version: version.to_string(),
        })
    }

    /// Record the final ledger of the session.
    pub fn log_session_end(&mut self, ledger: &Ledger) -> Result<()> {
        info!("Session ended with {} applications tracked", ledger.len());
        self.write_event(&JournalEvent::SessionEnd {
            timestamp: Utc::now(),
            ledger: ledger.clone(),
        })
    }

    pub fn log_focus_change(&mut self, app_id: Option<&str>) -> Result<()> {
        self.write_event(&JournalEvent::FocusChange {
            timestamp: Utc::now(),
            app_id: app_id.map(str::to_string),
        })
    }

    pub fn log_idle_start(&mut self) -> Result<()> {
        let now = Utc::now();
        self.idle_start_time = Some(now);
        self.write_event(&JournalEvent::IdleStart { timestamp: now })
    }

    pub fn log_idle_end(&mut self) -> Result<()> {
        let now = Utc::now();
        let idle_duration_seconds = self
            .idle_start_time
            .take()
            .map(|start| (now - start).num_seconds().max(0) as u64)
            .unwrap_or(0);

        self.write_event(&JournalEvent::IdleEnd {
            timestamp: now,
            idle_duration_seconds,
        })
    }

    pub fn log_reset(&mut self) -> Result<()> {
        self.write_event(&JournalEvent::Reset {
            timestamp: Utc::now(),
        })
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        if let Some(ref mut writer) = self.current_file {
            let _ = writer.flush();
        }
    }
}
