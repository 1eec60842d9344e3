//! Integration tests for the scroll controller
//!
//! Events travel the full live path: source -> queue -> dispatcher thread ->
//! engine -> emitter, with timers on real threads or a virtual clock.

use drag_scroll::capture::{InputEvent, ManualSource, ManualSourceHandle};
use drag_scroll::gesture::{GesturePhase, Tuning};
use drag_scroll::output::RecordingEmitter;
use drag_scroll::runtime::{ManualScheduler, ScrollController, ThreadScheduler, PAUSE_PROBE_TASK};
use drag_scroll::time::{Timebase, Timestamp};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn send_all(handle: &ManualSourceHandle, events: &[InputEvent]) {
    for event in events {
        assert!(handle.send(*event), "queue rejected {:?}", event);
    }
}

/// Key down, six samples 10 units apart every 8ms, key up, starting at `t0`.
fn flick(t0: Timestamp) -> Vec<InputEvent> {
    let at = |ms: u64| t0 + Duration::from_millis(ms);
    let mut events = vec![InputEvent::trigger_down(at(0))];
    for i in 0..=5u64 {
        events.push(InputEvent::pointer(10.0 * i as f64, 0.0, at(8 + i * 8)));
    }
    events.push(InputEvent::trigger_up(at(56)));
    events
}

#[test]
fn test_live_flick_glides_to_rest_on_thread_scheduler() {
    Timebase::init();
    let scheduler = Arc::new(ThreadScheduler::new());
    let emitter = RecordingEmitter::new();
    let mut controller =
        ScrollController::new(Tuning::default(), emitter.clone(), scheduler.clone()).unwrap();

    let (source, handle) = ManualSource::new();
    controller.start(Box::new(source)).unwrap();
    assert!(controller.is_running());

    send_all(&handle, &flick(Timestamp::now()));

    // Dispatcher picks up the flick and the glide starts
    assert!(wait_for(Duration::from_secs(5), || controller.stats().momentum_launches == 1));
    // The ticker runs it down and stops itself
    assert!(wait_for(Duration::from_secs(10), || {
        controller.phase() == GesturePhase::Idle && controller.timers_active() == (false, false)
    }));

    let stats = controller.stats();
    assert_eq!(stats.drag_deltas, 5);
    assert!(stats.momentum_deltas > 10);
    assert_eq!(emitter.len() as u64, stats.drag_deltas + stats.momentum_deltas);
    assert_eq!(controller.queue_stats().map(|q| q.dropped), Some(0));

    controller.shutdown();
    assert!(!controller.is_running());
    assert_eq!(scheduler.active_count(), 0);
    // Source is detached
    assert!(!handle.send(InputEvent::trigger_down(Timestamp::now())));
}

#[test]
fn test_shutdown_mid_glide_joins_everything() {
    Timebase::init();
    let scheduler = Arc::new(ThreadScheduler::new());
    let emitter = RecordingEmitter::new();
    let tuning = Tuning {
        // Long glide so it is still running at shutdown
        deceleration: 0.999,
        ..Tuning::default()
    };
    let mut controller = ScrollController::new(tuning, emitter.clone(), scheduler.clone()).unwrap();
    let (source, handle) = ManualSource::new();
    controller.start(Box::new(source)).unwrap();

    send_all(&handle, &flick(Timestamp::now()));
    assert!(wait_for(Duration::from_secs(5), || controller.stats().momentum_deltas > 2));
    assert_eq!(controller.timers_active(), (false, true));

    controller.shutdown();
    assert_eq!(scheduler.active_count(), 0);
    assert_eq!(controller.phase(), GesturePhase::Idle);

    // No tick lands after shutdown returned
    let emitted = emitter.len();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(emitter.len(), emitted);
}

#[test]
fn test_drop_shuts_down() {
    Timebase::init();
    let scheduler = Arc::new(ThreadScheduler::new());
    let (source, handle) = ManualSource::new();
    {
        let mut controller =
            ScrollController::new(Tuning::default(), RecordingEmitter::new(), scheduler.clone())
                .unwrap();
        controller.start(Box::new(source)).unwrap();
        handle.send(InputEvent::trigger_down(Timestamp::now()));
        handle.send(InputEvent::pointer(0.0, 0.0, Timestamp::now()));
        assert!(wait_for(Duration::from_secs(5), || controller.timers_active().0));
    }
    assert_eq!(scheduler.active_count(), 0);
    assert!(!handle.send(InputEvent::trigger_up(Timestamp::now())));
}

#[test]
fn test_start_twice_and_after_shutdown_fail() {
    let scheduler = Arc::new(ManualScheduler::new());
    let mut controller =
        ScrollController::new(Tuning::default(), RecordingEmitter::new(), scheduler).unwrap();

    let (first, _h1) = ManualSource::new();
    controller.start(Box::new(first)).unwrap();
    let (second, _h2) = ManualSource::new();
    assert!(controller.start(Box::new(second)).is_err());

    controller.shutdown();
    let (third, _h3) = ManualSource::new();
    assert!(controller.start(Box::new(third)).is_err());
}

#[test]
fn test_invalid_tuning_rejected_at_construction() {
    let tuning = Tuning {
        history_capacity: 0,
        ..Tuning::default()
    };
    let result = ScrollController::new(
        tuning,
        RecordingEmitter::new(),
        Arc::new(ManualScheduler::new()),
    );
    assert!(matches!(result, Err(drag_scroll::Error::Config(_))));
}

#[test]
fn test_pause_probe_on_virtual_clock_launches_glide() {
    let scheduler = Arc::new(ManualScheduler::new());
    let emitter = RecordingEmitter::new();
    let controller =
        ScrollController::new(Tuning::default(), emitter.clone(), scheduler.clone()).unwrap();
    let ms = Timestamp::from_millis;

    controller.handle_event(&InputEvent::trigger_down(ms(0)));
    for i in 0..=5u64 {
        controller.handle_event(&InputEvent::pointer(10.0 * i as f64, 0.0, ms(8 + i * 8)));
    }
    assert!(scheduler.is_active(PAUSE_PROBE_TASK));

    // Key stays down; the probe sees the pause and launches
    scheduler.advance_to(ms(160));
    assert_eq!(controller.phase(), GesturePhase::Momentum);
    assert_eq!(controller.timers_active(), (false, true));

    scheduler.advance_to(ms(20_000));
    assert_eq!(controller.phase(), GesturePhase::Primed);
    assert_eq!(controller.timers_active(), (false, false));
    assert!(controller.stats().momentum_deltas > 0);

    // Next drag starts from a fresh anchor
    controller.handle_event(&InputEvent::pointer(500.0, 0.0, ms(20_008)));
    assert_eq!(controller.phase(), GesturePhase::Dragging);
    let before = emitter.len();
    controller.handle_event(&InputEvent::pointer(503.0, 0.0, ms(20_016)));
    assert_eq!(emitter.len(), before + 1);
}

#[test]
fn test_deceleration_change_restarts_running_ticker() {
    let scheduler = Arc::new(ManualScheduler::new());
    let controller =
        ScrollController::new(Tuning::default(), RecordingEmitter::new(), scheduler.clone())
            .unwrap();
    let ms = Timestamp::from_millis;

    controller.handle_event(&InputEvent::trigger_down(ms(0)));
    for i in 0..=5u64 {
        controller.handle_event(&InputEvent::pointer(10.0 * i as f64, 0.0, ms(8 + i * 8)));
    }
    controller.handle_event(&InputEvent::trigger_up(ms(56)));
    assert_eq!(controller.timers_active(), (false, true));

    // Rate change: ticker is replaced, glide continues
    let mut tuning = controller.tuning();
    tuning.momentum.tick_hz = 60.0;
    controller.set_tuning(tuning).unwrap();
    assert_eq!(controller.timers_active(), (false, true));
    assert_eq!(scheduler.active_count(), 1);

    // Plain value change keeps the same ticker
    controller.set_deceleration(0.5).unwrap();
    assert_eq!(scheduler.active_count(), 1);
    scheduler.advance_to(ms(10_000));
    assert_eq!(controller.phase(), GesturePhase::Idle);
    assert_eq!(scheduler.active_count(), 0);
}
