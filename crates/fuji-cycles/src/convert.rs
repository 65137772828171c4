/// Internal cycles per CPU cycle at the 8 MHz reference speed.
///
/// The internal unit is deliberately finer than any single domain so that
/// both the CPU ratio and the MFP timer ratio are exact integers; deadlines
/// converted from different domains can then be compared without any
/// accumulated rounding drift.
pub const INTERNAL_PER_CPU_CYCLE: u64 = 9600;

/// Internal cycles per MFP timer cycle at the reference speed.
///
/// The MFP timer crystal runs at 2.4576 MHz while the CPU clock is derived
/// from the master video clock, slightly above its nominal 8 MHz; 31333/9600
/// is that true ratio expressed in internal units.
pub const INTERNAL_PER_TIMER_CYCLE: u64 = 31333;

/// Largest accepted frequency scale (a power-of-two CPU speed multiplier).
///
/// Real configurations use 0 (8 MHz), 1 (16 MHz) or 2 (32 MHz); the cap
/// leaves headroom without letting shifts eat the useful range of a `u64`.
pub const MAX_FREQUENCY_SCALE: u8 = 7;

/// One of the machine's physically distinct cycle counters.
///
/// Peripherals schedule and read back time in their own domain; the event
/// table stores and compares only internal cycles. The frequency scale (the
/// emulated CPU speed multiplier) applies to `Timer` and `CpuEighth`
/// conversions but not to raw `Cpu` counts, which are already expressed at
/// the machine's current speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleDomain {
    /// CPU-clock cycles at the current emulated speed.
    Cpu,
    /// MFP timer-oscillator cycles.
    Timer,
    /// CPU-derived eighth-rate clock used by sound DMA and the crossbar;
    /// same reference ratio as `Cpu` but counted at the 8 MHz reference, so
    /// the frequency scale applies.
    CpuEighth,
}

impl CycleDomain {
    /// Convert a domain cycle count to internal cycles.
    ///
    /// ```text
    /// Cpu:       internal = count * 9600
    /// Timer:     internal = (count * 31333) << scale
    /// CpuEighth: internal = (count * 9600)  << scale
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `scale` exceeds [`MAX_FREQUENCY_SCALE`] or if the result
    /// does not fit in a `u64`. Both indicate broken peripheral timing
    /// logic, not an operating condition.
    pub fn to_internal(self, count: u64, scale: u8) -> u64 {
        assert!(
            scale <= MAX_FREQUENCY_SCALE,
            "frequency scale {scale} out of range"
        );
        let internal = match self {
            CycleDomain::Cpu => count.checked_mul(INTERNAL_PER_CPU_CYCLE),
            CycleDomain::Timer => count
                .checked_mul(INTERNAL_PER_TIMER_CYCLE)
                .and_then(|v| shl_exact(v, scale)),
            CycleDomain::CpuEighth => count
                .checked_mul(INTERNAL_PER_CPU_CYCLE)
                .and_then(|v| shl_exact(v, scale)),
        };
        match internal {
            Some(v) => v,
            None => panic!("{count} {self:?} cycles overflow the internal clock"),
        }
    }

    /// Convert internal cycles back to a domain cycle count.
    ///
    /// ```text
    /// Cpu:       count =  internal / 9600                  (floor)
    /// Timer:     count = ceil(internal / 31333) >> scale
    /// CpuEighth: count = (internal / 9600)      >> scale   (floor)
    /// ```
    ///
    /// The `Timer` inverse rounds up: a readback that has consumed any part
    /// of a timer cycle must report that cycle, otherwise a down-counting
    /// timer register would appear frozen across sub-cycle polls.
    ///
    /// # Panics
    ///
    /// Panics if `scale` exceeds [`MAX_FREQUENCY_SCALE`].
    pub fn from_internal(self, internal: u64, scale: u8) -> u64 {
        assert!(
            scale <= MAX_FREQUENCY_SCALE,
            "frequency scale {scale} out of range"
        );
        match self {
            CycleDomain::Cpu => internal / INTERNAL_PER_CPU_CYCLE,
            CycleDomain::Timer => {
                let units = INTERNAL_PER_TIMER_CYCLE as u128;
                let cycles = ((internal as u128 + units - 1) / units) as u64;
                cycles >> scale
            }
            CycleDomain::CpuEighth => (internal / INTERNAL_PER_CPU_CYCLE) >> scale,
        }
    }
}

/// Whole CPU cycles needed to cover `internal` internal cycles, rounded up.
///
/// The CPU run loop uses this to bound its run length: executing exactly
/// this many CPU cycles is guaranteed to reach or pass the deadline the
/// internal count was measured to. Rounding down instead could return zero
/// for a sub-CPU-cycle remainder and stall the loop.
pub fn cpu_cycles_ceil(internal: u64) -> u64 {
    let units = INTERNAL_PER_CPU_CYCLE as u128;
    ((internal as u128 + units - 1) / units) as u64
}

// Shift left, failing on bit loss rather than discarding high bits.
fn shl_exact(v: u64, scale: u8) -> Option<u64> {
    let shifted = v << scale;
    (shifted >> scale == v).then_some(shifted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn cpu_conversion_is_exact_in_both_directions() {
        assert_eq!(CycleDomain::Cpu.to_internal(512, 0), 4_915_200);
        assert_eq!(CycleDomain::Cpu.from_internal(4_915_200, 0), 512);
        // Raw CPU counts ignore the frequency scale entirely.
        assert_eq!(CycleDomain::Cpu.to_internal(512, 2), 4_915_200);
        assert_eq!(CycleDomain::Cpu.from_internal(4_915_200, 2), 512);
    }

    #[test]
    fn cpu_inverse_floors_partial_cycles() {
        assert_eq!(CycleDomain::Cpu.from_internal(9_599, 0), 0);
        assert_eq!(CycleDomain::Cpu.from_internal(9_600, 0), 1);
        assert_eq!(CycleDomain::Cpu.from_internal(9_601, 0), 1);
    }

    #[test]
    fn timer_inverse_rounds_up_partial_cycles() {
        assert_eq!(CycleDomain::Timer.to_internal(10, 0), 313_330);
        assert_eq!(CycleDomain::Timer.from_internal(0, 0), 0);
        assert_eq!(CycleDomain::Timer.from_internal(1, 0), 1);
        assert_eq!(CycleDomain::Timer.from_internal(31_332, 0), 1);
        assert_eq!(CycleDomain::Timer.from_internal(31_333, 0), 1);
        assert_eq!(CycleDomain::Timer.from_internal(31_334, 0), 2);
    }

    #[test]
    fn scale_shifts_timer_and_cpu_eighth_only() {
        assert_eq!(CycleDomain::Timer.to_internal(10, 1), 626_660);
        assert_eq!(CycleDomain::Timer.from_internal(626_660, 1), 10);
        assert_eq!(CycleDomain::CpuEighth.to_internal(5, 0), 48_000);
        assert_eq!(CycleDomain::CpuEighth.to_internal(5, 1), 96_000);
        assert_eq!(CycleDomain::CpuEighth.from_internal(96_000, 1), 5);
        assert_eq!(CycleDomain::CpuEighth.from_internal(9_599, 0), 0);
    }

    #[test]
    fn timer_inverse_divides_before_shifting() {
        // ceil(62_667 / 31_333) = 3, then >> 1 gives 1. Dividing by the
        // shifted ratio instead would give ceil(62_667 / 62_666) = 2.
        assert_eq!(CycleDomain::Timer.from_internal(62_667, 1), 1);
    }

    #[test]
    fn cpu_cycles_ceil_covers_the_deadline() {
        assert_eq!(cpu_cycles_ceil(0), 0);
        assert_eq!(cpu_cycles_ceil(1), 1);
        assert_eq!(cpu_cycles_ceil(9_600), 1);
        assert_eq!(cpu_cycles_ceil(9_601), 2);
        assert_eq!(cpu_cycles_ceil(313_330), 33);
    }

    #[test]
    #[should_panic(expected = "overflow the internal clock")]
    fn to_internal_panics_on_multiply_overflow() {
        CycleDomain::Cpu.to_internal(u64::MAX, 0);
    }

    #[test]
    #[should_panic(expected = "overflow the internal clock")]
    fn to_internal_panics_on_shift_overflow() {
        // Fits the multiply but loses bits in the shift.
        let count = (1u64 << 58) / INTERNAL_PER_TIMER_CYCLE;
        CycleDomain::Timer.to_internal(count, 7);
    }

    #[test]
    #[should_panic(expected = "frequency scale")]
    fn to_internal_rejects_out_of_range_scale() {
        CycleDomain::Timer.to_internal(1, MAX_FREQUENCY_SCALE + 1);
    }

    proptest! {
        #[test]
        fn round_trip_is_exact_at_reference_speed(
            count in 0u64..(1 << 40),
            domain in prop_oneof![
                Just(CycleDomain::Cpu),
                Just(CycleDomain::Timer),
                Just(CycleDomain::CpuEighth),
            ],
        ) {
            let internal = domain.to_internal(count, 0);
            prop_assert_eq!(domain.from_internal(internal, 0), count);
        }

        #[test]
        fn scaled_round_trip_is_exact(count in 0u64..(1 << 40), scale in 0u8..=2) {
            for domain in [CycleDomain::Timer, CycleDomain::CpuEighth] {
                let internal = domain.to_internal(count, scale);
                prop_assert_eq!(domain.from_internal(internal, scale), count);
            }
        }

        #[test]
        fn timer_ceiling_never_under_reports(count in 0u64..(1 << 32), scale in 0u8..=2) {
            let internal = CycleDomain::Timer.to_internal(count, scale);
            prop_assert!(CycleDomain::Timer.from_internal(internal + 1, scale) >= count);
        }
    }
}
