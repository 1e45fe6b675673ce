//! Per-application focus time accounting.
//!
//! Focus and idle sources feed an [`accounting::Accumulator`] through a
//! [`tracker::Tracker`], which also turns ledger snapshots into the usage
//! menu shown to the user.

pub mod accounting;
pub mod config;
pub mod error;
pub mod focus;
pub mod idle;
pub mod logging;
pub mod menu;
pub mod tracker;
