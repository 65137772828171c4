//! Cycle accounting for the emulated machine.
//!
//! Every hardware unit in the machine is driven by its own oscillator (the
//! CPU clock, the MFP timer clock, CPU-derived sub-clocks), yet interrupt
//! deadlines from all of them must be comparable on one timeline. This crate
//! defines that timeline: a single internal cycle unit fine enough that each
//! supported domain converts into it with an exact integer ratio, a pure
//! converter between domain cycles and internal cycles, and the virtual
//! clock that counts internal cycles as the CPU core executes.
//!
//! The internal unit is 1/9600 of a CPU cycle at the 8 MHz reference speed.
//! All ordering questions ("which deadline comes first?") are answered in
//! internal cycles only; domain counts are never compared to each other
//! directly.

#![forbid(unsafe_code)]

mod clock;
mod convert;

pub use clock::VirtualClock;
pub use convert::{
    cpu_cycles_ceil, CycleDomain, INTERNAL_PER_CPU_CYCLE, INTERNAL_PER_TIMER_CYCLE,
    MAX_FREQUENCY_SCALE,
};
