//! Focus-time accounting: ledger, timing cursor and formatting rules.

mod accumulator;
mod clock;
mod ledger;

pub use accumulator::Accumulator;
#[cfg(test)]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use ledger::{format_minutes, total_minutes, AppId, Ledger};
