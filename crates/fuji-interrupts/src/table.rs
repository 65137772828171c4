use fuji_cycles::{cpu_cycles_ceil, CycleDomain, VirtualClock, MAX_FREQUENCY_SCALE};
use tracing::{debug, trace};

use crate::source::InterruptSource;

/// Lifecycle state of one pending-event slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No event scheduled.
    Idle,
    /// Scheduled and counted toward the nearest deadline.
    Active,
    /// Deadline preserved but excluded from dispatch. A device that gates
    /// its timer off without losing the timer's phase parks the slot here
    /// and resumes it later at the exact same deadline.
    Stopped,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: SlotState,
    /// Absolute internal-cycle deadline. Meaningful unless `state` is Idle.
    deadline: u64,
    /// Clock value the deadline was computed against; the anchor for
    /// elapsed readback. Never ahead of the clock.
    armed_at: u64,
    /// A handler has been registered for this source. Not part of the
    /// schedule state: bindings live for the process and survive reset and
    /// snapshot restore.
    bound: bool,
}

const IDLE_SLOT: Slot = Slot {
    state: SlotState::Idle,
    deadline: 0,
    armed_at: 0,
    bound: false,
};

/// Per-slot schedule state as captured by or applied from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotImage {
    pub state: SlotState,
    pub deadline: u64,
    pub armed_at: u64,
}

/// Plain-data image of an [`EventTable`], the staging value between the
/// live table and the snapshot byte format. Handler bindings are not part
/// of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    pub slots: [SlotImage; InterruptSource::COUNT],
    pub clock: u64,
    pub frequency_scale: u8,
}

/// The pending-event table and the virtual clock it schedules against.
///
/// One slot per [`InterruptSource`], each holding at most one event. All
/// deadlines are absolute internal cycles; counts cross the boundary into
/// internal units exactly once, at arm time, using the table's current
/// frequency scale. With twenty fixed sources every "nearest" question is a
/// linear scan; nothing here justifies a priority queue.
///
/// The table is handed to event handlers during dispatch, so every
/// operation must tolerate being called from inside a handler.
#[derive(Debug)]
pub struct EventTable {
    slots: [Slot; InterruptSource::COUNT],
    clock: VirtualClock,
    frequency_scale: u8,
}

impl EventTable {
    pub fn new() -> Self {
        Self {
            slots: [IDLE_SLOT; InterruptSource::COUNT],
            clock: VirtualClock::new(),
            frequency_scale: 0,
        }
    }

    /// Current virtual time in internal cycles.
    #[inline]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Advances the virtual clock by `internal` cycles.
    ///
    /// Called only by the CPU-execution loop with the cycles it actually
    /// consumed; everything else observes time through queries.
    #[inline]
    pub fn advance(&mut self, internal: u64) {
        self.clock.advance(internal);
    }

    pub fn frequency_scale(&self) -> u8 {
        self.frequency_scale
    }

    /// Sets the CPU speed multiplier shift applied to `Timer` and
    /// `CpuEighth` conversions from here on. Existing deadlines are not
    /// rewritten.
    ///
    /// # Panics
    ///
    /// Panics if `scale` exceeds [`MAX_FREQUENCY_SCALE`].
    pub fn set_frequency_scale(&mut self, scale: u8) {
        assert!(
            scale <= MAX_FREQUENCY_SCALE,
            "frequency scale {scale} out of range"
        );
        debug!(scale, "frequency scale changed");
        self.frequency_scale = scale;
    }

    /// Converts a domain count to internal cycles at the current scale.
    #[inline]
    pub fn to_internal(&self, count: u64, domain: CycleDomain) -> u64 {
        domain.to_internal(count, self.frequency_scale)
    }

    /// Converts internal cycles to a domain count at the current scale.
    #[inline]
    pub fn from_internal(&self, internal: u64, domain: CycleDomain) -> u64 {
        domain.from_internal(internal, self.frequency_scale)
    }

    /// Marks `source` as having a registered handler. Scheduling onto an
    /// unbound source is fatal, so the dispatch layer records bindings here
    /// as peripherals register.
    ///
    /// # Panics
    ///
    /// Panics on a second binding for the same source.
    pub(crate) fn bind(&mut self, source: InterruptSource) {
        let slot = &mut self.slots[source.index()];
        assert!(!slot.bound, "handler already bound for {source}");
        slot.bound = true;
    }

    /// Schedules `source` at an absolute deadline of `count` cycles from
    /// cycle zero, replacing any pending event. Used right after a reset to
    /// align a peripheral against the start of the timeline.
    ///
    /// # Panics
    ///
    /// Panics if no handler is bound for `source` or if the deadline
    /// predates the current clock.
    pub fn add_absolute(&mut self, count: u64, domain: CycleDomain, source: InterruptSource) {
        let deadline = self.to_internal(count, domain);
        let now = self.clock.now();
        assert!(
            deadline >= now,
            "absolute deadline {deadline} for {source} predates the clock ({now})"
        );
        trace!(source = %source, count, domain = ?domain, deadline, "arm absolute");
        self.arm(source, deadline, now);
    }

    /// Schedules `source` to fire `count` domain cycles from now, replacing
    /// any pending event.
    ///
    /// # Panics
    ///
    /// Panics if no handler is bound for `source`.
    pub fn add_relative(&mut self, count: u64, domain: CycleDomain, source: InterruptSource) {
        let now = self.clock.now();
        let deadline = now
            .checked_add(self.to_internal(count, domain))
            .expect("event deadline overflowed u64::MAX");
        trace!(source = %source, count, domain = ?domain, deadline, "arm relative");
        self.arm(source, deadline, now);
    }

    /// Like [`add_relative`](Self::add_relative), with `offset` internal
    /// cycles folded into the deadline. A periodic handler passes the
    /// negated lateness of the dispatch that is re-arming it, so each
    /// period starts where the previous one actually ended rather than
    /// where the CPU loop happened to stop; the fractional precision that
    /// would be lost by re-deriving the offset from rounded domain counts
    /// is preserved. The deadline may land at or before the current clock
    /// (the event then fires on the next acknowledge pass).
    ///
    /// # Panics
    ///
    /// Panics if no handler is bound for `source` or if the deadline would
    /// fall before cycle zero.
    pub fn add_relative_with_offset(
        &mut self,
        count: u64,
        domain: CycleDomain,
        source: InterruptSource,
        offset: i64,
    ) {
        let now = self.clock.now();
        let base = now
            .checked_add(self.to_internal(count, domain))
            .expect("event deadline overflowed u64::MAX");
        let deadline = if offset >= 0 {
            base.checked_add(offset as u64)
                .expect("event deadline overflowed u64::MAX")
        } else {
            base.checked_sub(offset.unsigned_abs())
                .expect("event deadline underflowed cycle zero")
        };
        // Anchor elapsed readback at the period start the offset implies,
        // clamped into the past.
        let armed_at = if offset >= 0 {
            now
        } else {
            now.saturating_sub(offset.unsigned_abs())
        };
        trace!(source = %source, count, domain = ?domain, offset, deadline, "arm relative with offset");
        self.arm(source, deadline, armed_at);
    }

    /// Recomputes the deadline of an existing event to `count` domain
    /// cycles from now, preserving its Active or Stopped state. Used when a
    /// control register changes a running timer's period without disabling
    /// it.
    ///
    /// # Panics
    ///
    /// Panics if the slot is Idle.
    pub fn modify(&mut self, count: u64, domain: CycleDomain, source: InterruptSource) {
        let now = self.clock.now();
        let deadline = now
            .checked_add(self.to_internal(count, domain))
            .expect("event deadline overflowed u64::MAX");
        let slot = &mut self.slots[source.index()];
        assert!(slot.state != SlotState::Idle, "modify on idle slot {source}");
        trace!(source = %source, count, domain = ?domain, deadline, "modify");
        slot.deadline = deadline;
        slot.armed_at = now;
    }

    /// Cancels any pending event for `source`. Not an error if the slot is
    /// already Idle.
    pub fn remove(&mut self, source: InterruptSource) {
        let slot = &mut self.slots[source.index()];
        if slot.state != SlotState::Idle {
            trace!(source = %source, "remove");
        }
        slot.state = SlotState::Idle;
    }

    /// Parks an Active event without losing its phase: the deadline stays
    /// put, the slot just stops counting toward dispatch. Already-Stopped
    /// slots are left alone.
    ///
    /// # Panics
    ///
    /// Panics if the slot is Idle (there is no phase to preserve).
    pub fn stop(&mut self, source: InterruptSource) {
        let slot = &mut self.slots[source.index()];
        assert!(slot.state != SlotState::Idle, "stop on idle slot {source}");
        if slot.state == SlotState::Active {
            trace!(source = %source, deadline = slot.deadline, "stop");
            slot.state = SlotState::Stopped;
        }
    }

    /// Reactivates a Stopped event at its preserved deadline. The event
    /// fires at the originally-computed phase, not `count` cycles after
    /// the resume point; timers gated by an external control line rely on
    /// picking up exactly where they left off. Already-Active slots are
    /// left alone.
    ///
    /// # Panics
    ///
    /// Panics if the slot is Idle (there is nothing to resume).
    pub fn resume(&mut self, source: InterruptSource) {
        let slot = &mut self.slots[source.index()];
        assert!(slot.state != SlotState::Idle, "resume on idle slot {source}");
        if slot.state == SlotState::Stopped {
            trace!(source = %source, deadline = slot.deadline, "resume");
            slot.state = SlotState::Active;
        }
    }

    pub fn state(&self, source: InterruptSource) -> SlotState {
        self.slots[source.index()].state
    }

    /// The slot is Active (counted toward dispatch). A caller asking "is
    /// this timer running" wants this, not [`is_pending`](Self::is_pending).
    pub fn is_active(&self, source: InterruptSource) -> bool {
        self.state(source) == SlotState::Active
    }

    /// The slot holds an event, running or parked (Active or Stopped).
    pub fn is_pending(&self, source: InterruptSource) -> bool {
        self.state(source) != SlotState::Idle
    }

    /// The Active source with the smallest deadline, ties broken toward
    /// the lower enumeration index; `None` when nothing is Active.
    pub fn nearest_pending(&self) -> Option<InterruptSource> {
        self.nearest_active().map(|(source, _)| source)
    }

    /// Internal cycles from now to the nearest Active deadline, zero if it
    /// is already due; `None` when nothing is Active.
    pub fn internal_until_next(&self) -> Option<u64> {
        self.nearest_active()
            .map(|(_, deadline)| deadline.saturating_sub(self.clock.now()))
    }

    /// The run budget for work expressed in whole CPU cycles: executing
    /// this many is guaranteed to reach the nearest Active deadline.
    pub fn cpu_cycles_until_next(&self) -> Option<u64> {
        self.internal_until_next().map(cpu_cycles_ceil)
    }

    /// An Active deadline is at or before the current clock.
    pub fn due_now(&self) -> bool {
        matches!(self.nearest_active(), Some((_, deadline)) if deadline <= self.clock.now())
    }

    /// Domain cycles elapsed since the slot was last armed or modified.
    /// Peripherals derive "how far into the current period are we" from
    /// this when emulating a counting-down hardware register; the `Timer`
    /// domain's ceiling rounding guarantees a genuinely-elapsed sub-unit
    /// never reads back as zero.
    ///
    /// # Panics
    ///
    /// Panics if the slot is Idle.
    pub fn cycles_elapsed_since(&self, source: InterruptSource, domain: CycleDomain) -> u64 {
        let slot = &self.slots[source.index()];
        assert!(
            slot.state != SlotState::Idle,
            "elapsed readback on idle slot {source}"
        );
        let elapsed = self
            .clock
            .now()
            .checked_sub(slot.armed_at)
            .expect("slot armed ahead of the clock");
        self.from_internal(elapsed, domain)
    }

    /// Clears every slot to Idle and the clock to zero. The only operation
    /// outside snapshot restore that moves the clock by fiat. Handler
    /// bindings and the frequency scale are configuration, not schedule
    /// state, and survive.
    pub fn reset(&mut self) {
        debug!("event table reset");
        for slot in &mut self.slots {
            slot.state = SlotState::Idle;
            slot.deadline = 0;
            slot.armed_at = 0;
        }
        self.clock.set_now(0);
    }

    /// Captures the schedule state for snapshot encoding.
    pub fn save_state(&self) -> TableState {
        let mut slots = [SlotImage {
            state: SlotState::Idle,
            deadline: 0,
            armed_at: 0,
        }; InterruptSource::COUNT];
        for (image, slot) in slots.iter_mut().zip(&self.slots) {
            image.state = slot.state;
            image.deadline = slot.deadline;
            image.armed_at = slot.armed_at;
        }
        TableState {
            slots,
            clock: self.clock.now(),
            frequency_scale: self.frequency_scale,
        }
    }

    /// Applies a previously captured schedule state verbatim, including
    /// Stopped phases and a clock that may sit past some deadlines (an
    /// event can be due but unacknowledged at capture time). Handler
    /// bindings are untouched; callers re-establish them separately, which
    /// is what keeps the table itself fully serializable.
    ///
    /// # Panics
    ///
    /// Panics on a state that could not have been captured (frequency
    /// scale out of range, a slot armed ahead of the clock). Decoders
    /// validate before constructing a [`TableState`], so this only fires
    /// on caller-constructed values.
    pub fn restore_state(&mut self, state: TableState) {
        assert!(
            state.frequency_scale <= MAX_FREQUENCY_SCALE,
            "frequency scale {} out of range",
            state.frequency_scale
        );
        for (source, image) in InterruptSource::ALL.into_iter().zip(&state.slots) {
            assert!(
                image.state == SlotState::Idle || image.armed_at <= state.clock,
                "slot {source} armed ahead of the restored clock"
            );
        }
        for (slot, image) in self.slots.iter_mut().zip(&state.slots) {
            slot.state = image.state;
            slot.deadline = image.deadline;
            slot.armed_at = image.armed_at;
        }
        self.clock.set_now(state.clock);
        self.frequency_scale = state.frequency_scale;
        debug!(clock = state.clock, "event table restored");
    }

    /// Claims the due event with the smallest deadline, setting its slot
    /// Idle before the caller runs the handler (so the handler can re-arm
    /// the same source). `None` when the nearest Active deadline is still
    /// in the future.
    pub(crate) fn take_due(&mut self) -> Option<(InterruptSource, u64)> {
        let (source, deadline) = self.nearest_active()?;
        if deadline > self.clock.now() {
            return None;
        }
        self.slots[source.index()].state = SlotState::Idle;
        Some((source, deadline))
    }

    fn nearest_active(&self) -> Option<(InterruptSource, u64)> {
        let mut best: Option<(InterruptSource, u64)> = None;
        for source in InterruptSource::ALL {
            let slot = &self.slots[source.index()];
            if slot.state != SlotState::Active {
                continue;
            }
            // Strictly-less keeps the first (lowest index) source on ties.
            match best {
                Some((_, deadline)) if slot.deadline >= deadline => {}
                _ => best = Some((source, slot.deadline)),
            }
        }
        best
    }

    fn arm(&mut self, source: InterruptSource, deadline: u64, armed_at: u64) {
        let slot = &mut self.slots[source.index()];
        assert!(slot.bound, "no handler bound for {source}");
        slot.state = SlotState::Active;
        slot.deadline = deadline;
        slot.armed_at = armed_at;
    }
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}
