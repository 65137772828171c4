//! End-to-end dispatch scenarios driving the scheduler the way the CPU
//! loop does: advance to the nearest deadline, acknowledge everything due,
//! repeat.

use std::cell::RefCell;
use std::rc::Rc;

use fuji_cycles::{CycleDomain, INTERNAL_PER_CPU_CYCLE, INTERNAL_PER_TIMER_CYCLE};
use fuji_interrupts::{DueEvent, EventTable, InterruptSource, Scheduler};
use pretty_assertions::assert_eq;

type EventLog = Rc<RefCell<Vec<DueEvent>>>;

fn recording_scheduler(sources: &[InterruptSource]) -> (Scheduler, EventLog) {
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let mut scheduler = Scheduler::new();
    for &source in sources {
        let log = log.clone();
        scheduler.register(source, move |due: DueEvent, _: &mut EventTable| {
            log.borrow_mut().push(due);
        });
    }
    (scheduler, log)
}

fn drain_due(scheduler: &mut Scheduler) {
    while scheduler.table().due_now() {
        scheduler.acknowledge();
    }
}

#[test]
fn a_short_timer_beats_a_long_video_frame() {
    // One PAL-ish frame of 512 CPU cycles against 10 MFP timer cycles: the
    // timer deadline lands earlier on the internal clock even though its
    // per-cycle weight is larger.
    let (mut scheduler, log) = recording_scheduler(&[
        InterruptSource::VideoVbl,
        InterruptSource::MfpTimerA,
    ]);

    let table = scheduler.table_mut();
    table.add_relative(512, CycleDomain::Cpu, InterruptSource::VideoVbl);
    table.add_relative(10, CycleDomain::Timer, InterruptSource::MfpTimerA);

    assert_eq!(table.nearest_pending(), Some(InterruptSource::MfpTimerA));
    assert_eq!(table.internal_until_next(), Some(10 * INTERNAL_PER_TIMER_CYCLE));

    table.advance(512 * INTERNAL_PER_CPU_CYCLE);
    drain_due(&mut scheduler);

    assert_eq!(
        *log.borrow(),
        vec![
            DueEvent {
                source: InterruptSource::MfpTimerA,
                deadline: 313_330,
                lateness: 4_915_200 - 313_330,
            },
            DueEvent {
                source: InterruptSource::VideoVbl,
                deadline: 4_915_200,
                lateness: 0,
            },
        ]
    );
}

#[test]
fn equal_deadlines_dispatch_in_enumeration_order() {
    // d1 strictly earlier, then two slots sharing one deadline. The tie
    // goes to the lower-numbered source no matter the arming order.
    let (mut scheduler, log) = recording_scheduler(&[
        InterruptSource::VideoVbl,
        InterruptSource::VideoHbl,
        InterruptSource::MfpTimerB,
    ]);

    let table = scheduler.table_mut();
    table.add_relative(10, CycleDomain::Cpu, InterruptSource::MfpTimerB);
    table.add_relative(10, CycleDomain::Cpu, InterruptSource::VideoHbl);
    table.add_relative(5, CycleDomain::Cpu, InterruptSource::VideoVbl);

    table.advance(96_000);
    drain_due(&mut scheduler);

    let order: Vec<InterruptSource> = log.borrow().iter().map(|due| due.source).collect();
    assert_eq!(
        order,
        vec![
            InterruptSource::VideoVbl,
            InterruptSource::VideoHbl,
            InterruptSource::MfpTimerB,
        ]
    );
}

#[test]
fn periodic_handler_compensates_lateness_and_never_drifts() {
    // The canonical periodic-device pattern: each expiry re-arms one period
    // ahead, offset back by however late the dispatch ran. Deadlines must
    // stay exact multiples of the period regardless of how raggedly the
    // clock advances.
    const PERIOD: u64 = 10;

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let mut scheduler = Scheduler::new();
    {
        let log = log.clone();
        scheduler.register(
            InterruptSource::MfpTimerA,
            move |due: DueEvent, table: &mut EventTable| {
                log.borrow_mut().push(due);
                table.add_relative_with_offset(
                    PERIOD,
                    CycleDomain::Timer,
                    InterruptSource::MfpTimerA,
                    -(due.lateness as i64),
                );
            },
        );
    }

    scheduler
        .table_mut()
        .add_relative(PERIOD, CycleDomain::Timer, InterruptSource::MfpTimerA);

    // Ragged instruction-sized steps that never land on a deadline.
    while scheduler.table().now() < 20 * PERIOD * INTERNAL_PER_TIMER_CYCLE {
        scheduler.table_mut().advance(7 * INTERNAL_PER_CPU_CYCLE + 4);
        drain_due(&mut scheduler);
    }

    let period_internal = PERIOD * INTERNAL_PER_TIMER_CYCLE;
    let deadlines: Vec<u64> = log.borrow().iter().map(|due| due.deadline).collect();
    assert!(deadlines.len() >= 19);
    for (i, deadline) in deadlines.iter().enumerate() {
        assert_eq!(*deadline, (i as u64 + 1) * period_internal);
    }
}

#[test]
fn stop_and_resume_fire_at_the_original_deadline() {
    let (mut scheduler, log) = recording_scheduler(&[InterruptSource::Fdc]);

    let table = scheduler.table_mut();
    table.add_relative(100, CycleDomain::Cpu, InterruptSource::Fdc);
    table.advance(300_000);
    table.stop(InterruptSource::Fdc);

    // A paused event holds no claim on the run budget.
    table.advance(400_000);
    assert_eq!(table.nearest_pending(), None);

    table.resume(InterruptSource::Fdc);
    assert_eq!(table.internal_until_next(), Some(260_000));

    table.advance(260_000);
    drain_due(&mut scheduler);
    assert_eq!(
        *log.borrow(),
        vec![DueEvent {
            source: InterruptSource::Fdc,
            deadline: 960_000,
            lateness: 0,
        }]
    );
}

#[test]
fn a_handler_can_schedule_a_different_source() {
    // FDC command completion kicking off a blitter transfer, the chained
    // shape device models actually use.
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let mut scheduler = Scheduler::new();
    {
        let log = log.clone();
        scheduler.register(
            InterruptSource::Fdc,
            move |due: DueEvent, table: &mut EventTable| {
                log.borrow_mut().push(due);
                table.add_relative(4, CycleDomain::Cpu, InterruptSource::Blitter);
            },
        );
    }
    {
        let log = log.clone();
        scheduler.register(
            InterruptSource::Blitter,
            move |due: DueEvent, _: &mut EventTable| {
                log.borrow_mut().push(due);
            },
        );
    }

    scheduler
        .table_mut()
        .add_relative(2, CycleDomain::Cpu, InterruptSource::Fdc);
    scheduler.table_mut().advance(2 * INTERNAL_PER_CPU_CYCLE);
    drain_due(&mut scheduler);
    assert!(scheduler.table().is_active(InterruptSource::Blitter));

    scheduler.table_mut().advance(4 * INTERNAL_PER_CPU_CYCLE);
    drain_due(&mut scheduler);

    let order: Vec<InterruptSource> = log.borrow().iter().map(|due| due.source).collect();
    assert_eq!(order, vec![InterruptSource::Fdc, InterruptSource::Blitter]);
}

#[test]
#[should_panic(expected = "no handler bound for VIDEO_VBL")]
fn arming_without_a_registered_handler_panics() {
    // Registration is part of arming's contract on the public surface too:
    // a fresh scheduler accepts no events until the peripheral has bound
    // its handler.
    let mut scheduler = Scheduler::new();
    scheduler
        .table_mut()
        .add_relative(10, CycleDomain::Cpu, InterruptSource::VideoVbl);
}

#[test]
fn the_cpu_run_budget_never_stalls_short_of_a_deadline() {
    // 10 timer cycles is 313_330 internal units, 32.64 CPU cycles. The
    // budget must round up to 33; a floor here would leave a sub-cycle
    // remainder the loop could never cross.
    let (mut scheduler, log) = recording_scheduler(&[InterruptSource::MfpTimerA]);
    scheduler
        .table_mut()
        .add_relative(10, CycleDomain::Timer, InterruptSource::MfpTimerA);

    let mut iterations = 0;
    while scheduler.table().nearest_pending().is_some() {
        iterations += 1;
        assert!(iterations <= 2, "run budget failed to reach the deadline");
        let budget = scheduler.table().cpu_cycles_until_next().unwrap();
        let step = scheduler.table().to_internal(budget, CycleDomain::Cpu);
        scheduler.table_mut().advance(step);
        drain_due(&mut scheduler);
    }

    assert_eq!(iterations, 1);
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(log.borrow()[0].deadline, 313_330);
    assert_eq!(log.borrow()[0].lateness, 33 * INTERNAL_PER_CPU_CYCLE - 313_330);
}
