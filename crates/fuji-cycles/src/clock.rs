/// The machine's single time reference, counted in internal cycles.
///
/// Only the CPU-execution loop advances it, by reporting the cycles it has
/// actually consumed; everything else reads it. Deadlines are computed
/// against it at schedule time and compared against it at dispatch time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VirtualClock {
    now: u64,
}

impl VirtualClock {
    pub const fn new() -> Self {
        Self { now: 0 }
    }

    /// Current internal-cycle count.
    #[inline]
    pub const fn now(&self) -> u64 {
        self.now
    }

    /// Advances the clock by `cycles` internal cycles.
    ///
    /// # Panics
    ///
    /// Panics if advancing would overflow `u64`. (At 8 MHz an emulated
    /// machine needs thousands of years of guest time to get there.)
    #[inline]
    pub fn advance(&mut self, cycles: u64) {
        self.now = self
            .now
            .checked_add(cycles)
            .expect("virtual clock overflowed u64::MAX");
    }

    /// Sets the current time, intended for reset and snapshot restore.
    ///
    /// This may move time backwards; callers must restore the event table
    /// to a snapshot consistent with the new value.
    #[inline]
    pub fn set_now(&mut self, now: u64) {
        self.now = now;
    }
}
