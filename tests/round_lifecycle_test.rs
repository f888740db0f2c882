//! Round lifecycle across controller, store and display sessions
//!
//! Every scenario runs in-process against the memory store with a manual
//! clock, so displays can be stepped to exact instants:
//! - late joiners see the same remaining time as displays present from the start
//! - STOP freezes every display, RESET clears it, both without replaying cues
//! - recurring rounds restart exactly once per natural end

use std::sync::Arc;
use std::time::Duration;

use compsync::clock::{ManualTimeSource, TimeSource};
use compsync::control::BroadcastController;
use compsync::cues::Cue;
use compsync::display::DisplaySession;
use compsync::recurring::RecurringController;
use compsync::round::RoundConfig;
use compsync::store::{MemoryRoundStore, RoundStore, RoundSubscriber, StoreEvent};
use compsync::timer::{compute_timer_state, TimerPhase};
use tokio::sync::mpsc::UnboundedReceiver;

const NOW: i64 = 1_700_000_000_000;
const LEAD: i64 = 3_000;

struct Venue {
    clock: Arc<ManualTimeSource>,
    store: Arc<MemoryRoundStore>,
    controller: BroadcastController<MemoryRoundStore>,
}

impl Venue {
    fn new() -> Self {
        let clock = Arc::new(ManualTimeSource::new(NOW));
        let store = Arc::new(MemoryRoundStore::new());
        let controller = BroadcastController::new(store.clone(), clock.clone(), LEAD);
        Self {
            clock,
            store,
            controller,
        }
    }

    fn now(&self) -> i64 {
        self.clock.now_ms()
    }
}

fn config(recurring: bool) -> RoundConfig {
    RoundConfig {
        climbing_duration_ms: 240_000,
        preparation_duration_ms: 15_000,
        preparation_enabled: true,
        recurring,
    }
}

async fn next_event(rx: &mut UnboundedReceiver<StoreEvent>) -> StoreEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for store event")
        .expect("store feed closed")
}

/// Subscribe a fresh display and apply its initial snapshot.
async fn join(venue: &Venue, room: &str, controller: bool) -> (DisplaySession, UnboundedReceiver<StoreEvent>) {
    let mut rx = venue.store.subscribe(room);
    let mut session = DisplaySession::new(room, false, controller);
    session.apply_event(next_event(&mut rx).await);
    (session, rx)
}

#[tokio::test]
async fn late_joiner_matches_early_display() {
    let venue = Venue::new();
    let (mut early, mut early_rx) = join(&venue, "ROOM01", false).await;

    venue.controller.start("ROOM01", &config(false)).unwrap();
    early.apply_event(next_event(&mut early_rx).await);

    venue.clock.set(NOW + LEAD + 100_000);
    let (mut late, _late_rx) = join(&venue, "ROOM01", false).await;

    let early_frame = early.tick(venue.now()).frame;
    let late_frame = late.tick(venue.now()).frame;
    assert_eq!(early_frame, late_frame);
    assert_eq!(early_frame.phase, TimerPhase::Climb);
    assert_eq!(early_frame.text, "2:35");
}

#[tokio::test]
async fn late_joiner_after_expiry_sees_idle_without_cues() {
    let venue = Venue::new();
    venue.controller.start("ROOM01", &config(false)).unwrap();
    venue.clock.set(NOW + LEAD + 255_000 + 60_000);

    let (mut late, _rx) = join(&venue, "ROOM01", false).await;
    let outcome = late.tick(venue.now());
    assert_eq!(outcome.frame.phase, TimerPhase::Idle);
    assert!(outcome.cues.is_empty());
    assert!(!late.is_live());
}

#[tokio::test]
async fn full_round_plays_each_cue_once() {
    let venue = Venue::new();
    let (mut display, mut rx) = join(&venue, "ROOM01", false).await;
    venue.controller.start("ROOM01", &config(false)).unwrap();
    display.apply_event(next_event(&mut rx).await);

    let end = NOW + LEAD + 255_000;
    let mut cues = Vec::new();
    let mut t = NOW;
    while t <= end + 1_000 {
        venue.clock.set(t);
        cues.extend(display.tick(venue.now()).cues);
        t += 100;
    }

    assert_eq!(cues.first(), Some(&Cue::RoundStart));
    assert_eq!(cues.last(), Some(&Cue::RoundEnd));
    for single in [Cue::RoundStart, Cue::OneMinuteWarning, Cue::FiveSecondWarning, Cue::RoundEnd] {
        assert_eq!(cues.iter().filter(|c| **c == single).count(), 1, "{:?}", single);
    }
    let train = cues
        .iter()
        .filter(|c| matches!(c, Cue::LastSeconds(_)))
        .count();
    assert_eq!(train, 10);
    assert!(!display.is_live());
}

#[tokio::test]
async fn stop_freezes_every_display() {
    let venue = Venue::new();
    let (mut a, mut a_rx) = join(&venue, "ROOM01", false).await;
    let (mut b, mut b_rx) = join(&venue, "ROOM01", false).await;

    venue.controller.start("ROOM01", &config(false)).unwrap();
    a.apply_event(next_event(&mut a_rx).await);
    b.apply_event(next_event(&mut b_rx).await);

    venue.clock.set(NOW + LEAD + 30_000);
    a.tick(venue.now());
    b.tick(venue.now());

    assert!(venue.controller.stop("ROOM01").unwrap());
    a.apply_event(next_event(&mut a_rx).await);
    b.apply_event(next_event(&mut b_rx).await);

    venue.clock.advance(1_000);
    for display in [&mut a, &mut b] {
        let outcome = display.tick(venue.now());
        assert_eq!(outcome.frame.phase, TimerPhase::Stopped);
        assert!(outcome.cues.is_empty(), "stop must not sound round end");
        assert!(!display.is_live());
    }
}

#[tokio::test]
async fn reset_is_idempotent_for_displays() {
    let venue = Venue::new();
    let (mut display, mut rx) = join(&venue, "ROOM01", false).await;
    venue.controller.start("ROOM01", &config(false)).unwrap();
    display.apply_event(next_event(&mut rx).await);

    assert!(venue.controller.reset("ROOM01").unwrap());
    display.apply_event(next_event(&mut rx).await);
    assert!(!venue.controller.reset("ROOM01").unwrap());

    assert!(display.descriptor().is_none());
    assert_eq!(display.tick(venue.now()).frame.text, "--:--");
    assert_eq!(venue.store.get("ROOM01").unwrap(), None);
}

#[tokio::test]
async fn recurring_restart_via_observe_and_restart() {
    let venue = Venue::new();
    let first = venue.controller.start("ROOM01", &config(true)).unwrap();
    let schedule = first.schedule();
    venue.clock.set(schedule.end_time_ms());
    let mut recurring = RecurringController::new();

    let mut issued = 0;
    for offset in [-200, -10, 10, 60, -5, 20] {
        let state = compute_timer_state(&schedule, schedule.end_time_ms() + offset);
        if let Some(result) = recurring
            .observe_and_restart("ROOM01", &first, state, &venue.controller)
            .await
        {
            result.unwrap();
            issued += 1;
        }
    }
    assert_eq!(issued, 1);

    let next = venue.store.get("ROOM01").unwrap().unwrap();
    assert_eq!(next.start_time_ms(), schedule.end_time_ms() + LEAD);
    assert_eq!(next.config(), first.config());
}
