use tracing::trace;

use crate::source::InterruptSource;
use crate::table::EventTable;

/// The moment an event fired, as seen by its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueEvent {
    pub source: InterruptSource,
    /// Absolute internal-cycle deadline the event was armed for.
    pub deadline: u64,
    /// Internal cycles the clock had already moved past `deadline` when the
    /// handler ran. CPU execution is granular per instruction, so the loop
    /// overshoots deadlines by small amounts; a drift-free periodic handler
    /// re-arms with `add_relative_with_offset(period, domain, source,
    /// -(lateness as i64))`.
    pub lateness: u64,
}

/// Peripheral callback invoked when its event comes due.
///
/// Handlers get the event table itself, not the scheduler, so they can
/// re-arm their own or any other source reentrantly but cannot start a
/// nested dispatch. Any `FnMut(DueEvent, &mut EventTable)` closure is a
/// handler; peripherals shared behind `Rc<RefCell<..>>` register a closure
/// over their handle.
pub trait EventHandler {
    fn handle_event(&mut self, due: DueEvent, table: &mut EventTable);
}

impl<F> EventHandler for F
where
    F: FnMut(DueEvent, &mut EventTable),
{
    fn handle_event(&mut self, due: DueEvent, table: &mut EventTable) {
        self(due, table)
    }
}

/// The dispatch layer: an [`EventTable`] plus the source-to-handler
/// registry.
///
/// The registry is deliberately not part of the table. Snapshots capture
/// the table; bindings are process-lifetime state that peripherals
/// re-establish at initialization, so a restored machine registers the same
/// handlers and then applies the saved schedule.
pub struct Scheduler {
    table: EventTable,
    handlers: [Option<Box<dyn EventHandler>>; InterruptSource::COUNT],
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            table: EventTable::new(),
            handlers: std::array::from_fn(|_| None),
        }
    }

    #[inline]
    pub fn table(&self) -> &EventTable {
        &self.table
    }

    #[inline]
    pub fn table_mut(&mut self) -> &mut EventTable {
        &mut self.table
    }

    /// Binds `handler` to `source`. One binding per source, established at
    /// peripheral initialization and kept for the life of the process.
    ///
    /// # Panics
    ///
    /// Panics if `source` is already bound.
    pub fn register(&mut self, source: InterruptSource, handler: impl EventHandler + 'static) {
        self.table.bind(source);
        self.handlers[source.index()] = Some(Box::new(handler));
        trace!(source = %source, "handler registered");
    }

    /// Dispatches exactly one due event: the Active slot with the smallest
    /// deadline is set Idle and its handler runs synchronously. The CPU
    /// loop calls this repeatedly after advancing the clock, until
    /// [`EventTable::due_now`] reports nothing left, so several events that
    /// came due within one CPU run fire in deadline order (ties in
    /// enumeration order).
    ///
    /// # Panics
    ///
    /// Panics if no event is due, or if the due source has no registered
    /// handler.
    pub fn acknowledge(&mut self) {
        let now = self.table.now();
        let Some((source, deadline)) = self.table.take_due() else {
            panic!("acknowledge with no interrupt due at clock {now}");
        };
        let due = DueEvent {
            source,
            deadline,
            lateness: now - deadline,
        };
        trace!(source = %source, deadline, lateness = due.lateness, "dispatch");

        // The handler is taken out for the duration of the call so it can
        // borrow the table mutably; the binding itself stays in force (the
        // table's bound mask is untouched), letting the handler re-arm its
        // own source.
        let Some(mut handler) = self.handlers[source.index()].take() else {
            panic!("no handler registered for {source}");
        };
        handler.handle_event(due, &mut self.table);
        self.handlers[source.index()] = Some(handler);
    }

    /// Machine reset: clears the schedule and rewinds the clock to zero.
    /// Registered handlers stay bound.
    pub fn reset(&mut self) {
        self.table.reset();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
