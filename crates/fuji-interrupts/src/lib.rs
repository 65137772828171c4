//! Cycle-domain event scheduler.
//!
//! Every future hardware event (video VBL and HBL, MFP timer expiries, FDC
//! command completion, ACIA transfers, DMA sound frames, and the rest of
//! [`InterruptSource`]) lives in one fixed-size table keyed by source. Each
//! slot holds an absolute deadline on the shared internal clock; the CPU
//! loop asks the table for the distance to the nearest deadline, runs that
//! many cycles, then acknowledges due events one at a time so handlers fire
//! in deadline order.
//!
//! Deadlines are absolute and unit conversion happens once per arm, so the
//! hot per-instruction path compares plain `u64`s. Handlers are plain Rust
//! callbacks registered per source at machine construction; a source is
//! armed and disarmed many times but bound exactly once. The table itself
//! carries no callbacks and serializes through [`snapshot`]; a restored
//! machine re-registers its handlers and continues cycle-exact.

#![forbid(unsafe_code)]

mod scheduler;
mod source;
mod table;

pub mod snapshot;

pub use scheduler::{DueEvent, EventHandler, Scheduler};
pub use source::InterruptSource;
pub use table::{EventTable, SlotImage, SlotState, TableState};
