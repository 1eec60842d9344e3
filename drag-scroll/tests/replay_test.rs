//! Trace save / load / playback round trips

use drag_scroll::app::config::Config;
use drag_scroll::capture::{InputEvent, TriggerKey};
use drag_scroll::gesture::{GesturePhase, Tuning};
use drag_scroll::replay::{DeltaOrigin, Trace, TracePlayer};
use drag_scroll::time::Timestamp;
use tempfile::TempDir;

fn ms(v: u64) -> Timestamp {
    Timestamp::from_millis(v)
}

/// A flick recorded at an arbitrary clock offset.
fn recorded_flick(offset_ms: u64) -> Trace {
    let at = |v: u64| ms(offset_ms + v);
    let mut trace = Trace::new("flick", TriggerKey::Control);
    trace.push(InputEvent::trigger_down(at(0))).unwrap();
    for i in 0..=6u64 {
        trace
            .push(InputEvent::pointer(200.0, 300.0 - 8.0 * i as f64, at(8 + i * 8)))
            .unwrap();
    }
    trace.push(InputEvent::trigger_up(at(64))).unwrap();
    trace.finalize();
    trace
}

#[test]
fn test_saved_trace_replays_identically() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flick.json");

    let trace = recorded_flick(0);
    trace.save(&path).unwrap();
    let loaded = Trace::load(&path).unwrap();
    assert_eq!(loaded.metadata.trigger, TriggerKey::Control);
    assert_eq!(loaded.metadata.event_count, 9);

    let player = TracePlayer::default();
    let original = player.play(&trace).unwrap();
    let replayed = player.play(&loaded).unwrap();
    assert_eq!(original.deltas, replayed.deltas);
    assert_eq!(original.stats, replayed.stats);
}

#[test]
fn test_playback_is_independent_of_clock_offset() {
    let player = TracePlayer::default();
    let near = player.play(&recorded_flick(0)).unwrap();
    let far = player.play(&recorded_flick(3_600_000).rebased()).unwrap();

    assert_eq!(near.deltas.len(), far.deltas.len());
    for (a, b) in near.deltas.iter().zip(&far.deltas) {
        assert_eq!((a.dx, a.dy, a.origin), (b.dx, b.dy, b.origin));
    }
}

#[test]
fn test_upward_flick_glides_upward() {
    let playback = TracePlayer::default().play(&recorded_flick(0)).unwrap();

    assert_eq!(playback.count(DeltaOrigin::Drag), 6);
    assert!(playback.count(DeltaOrigin::Momentum) > 0);
    assert_eq!(playback.final_phase, GesturePhase::Idle);
    let (x, y) = playback.total();
    assert_eq!(x, 0.0);
    assert!(y < -48.0);

    // Glide ticks start after the release and are evenly spaced
    let glide: Vec<_> = playback
        .deltas
        .iter()
        .filter(|d| d.origin == DeltaOrigin::Momentum)
        .collect();
    assert!(glide[0].at.is_after(ms(64)));
    let period = Tuning::default().momentum_tick_period();
    assert!(glide.windows(2).all(|w| w[1].at.duration_since(w[0].at) == period));
}

#[test]
fn test_config_tuning_drives_playback() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let mut config = Config::default();
    config.set("tuning.deceleration", "0.8").unwrap();
    config.set("tuning.sensitivity", "3").unwrap();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    let tuned = TracePlayer::new(loaded.tuning).unwrap();
    let baseline = TracePlayer::default();

    let trace = recorded_flick(0);
    let a = baseline.play(&trace).unwrap();
    let b = tuned.play(&trace).unwrap();
    assert!(b.count(DeltaOrigin::Momentum) < a.count(DeltaOrigin::Momentum));
    assert_eq!(b.count(DeltaOrigin::Drag), a.count(DeltaOrigin::Drag));
    let first_drag = |p: &drag_scroll::replay::Playback| p.deltas[0].dy;
    assert_eq!(first_drag(&b), 3.0 * first_drag(&a));
}

#[test]
fn test_playback_serializes_to_json() {
    let playback = TracePlayer::default().play(&recorded_flick(0)).unwrap();
    let json = serde_json::to_value(&playback).unwrap();
    assert_eq!(json["final_phase"], serde_json::to_value(GesturePhase::Idle).unwrap());
    assert!(json["deltas"].as_array().map(|d| !d.is_empty()).unwrap_or(false));
    assert_eq!(json["deltas"][0]["origin"], "drag");
}
