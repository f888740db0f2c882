// Display scheduling loop
//
// One task per display: store events and a fixed-interval ticker are
// multiplexed with `select!`. The ticker branch is disabled while the session
// is not live (no round, stopped, expired or faulted), so an idle display
// sleeps until the next store event re-arms it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::time::MissedTickBehavior;

use super::{DisplayFrame, DisplaySession};
use crate::clock::{AdjustedClock, TimeSource};
use crate::control::RoundStarter;
use crate::cues::CueSink;
use crate::recurring::issue_restart;
use crate::round::RoundConfig;
use crate::store::RoundSubscriber;

/// Loop settings plus the optional restart channel for recurring rounds.
pub struct DisplayLoop<R> {
    tick_interval: Duration,
    starter: Option<Arc<R>>,
}

impl<R: RoundStarter + 'static> DisplayLoop<R> {
    pub fn new(tick_interval: Duration, starter: Option<Arc<R>>) -> Self {
        Self {
            tick_interval: tick_interval.max(Duration::from_millis(1)),
            starter,
        }
    }

    /// Drive `session` until `shutdown` resolves.
    ///
    /// `render` is called whenever the frame changes. Fails only if the
    /// feed itself goes away.
    pub async fn run<F, S, K, D, Q>(
        &self,
        session: &mut DisplaySession,
        feed: &F,
        clock: &AdjustedClock<S>,
        sink: &mut K,
        mut render: D,
        shutdown: Q,
    ) -> anyhow::Result<()>
    where
        F: RoundSubscriber,
        S: TimeSource,
        K: CueSink,
        D: FnMut(&DisplayFrame),
        Q: Future<Output = ()>,
    {
        let mut events = feed.subscribe(session.room_id());
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            "[Display] room={} tick={}ms offset={}ms",
            session.room_id(),
            self.tick_interval.as_millis(),
            clock.offset().millis()
        );

        let mut last_frame: Option<DisplayFrame> = None;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = events.recv() => {
                    let Some(event) = event else {
                        anyhow::bail!("round feed for {} closed", session.room_id());
                    };
                    session.apply_event(event);
                    self.step(session, clock, sink, &mut render, &mut last_frame);
                }
                _ = ticker.tick(), if session.is_live() => {
                    self.step(session, clock, sink, &mut render, &mut last_frame);
                }
            }
        }

        info!("[Display] room={} loop stopped", session.room_id());
        Ok(())
    }

    fn step<S, K, D>(
        &self,
        session: &mut DisplaySession,
        clock: &AdjustedClock<S>,
        sink: &mut K,
        render: &mut D,
        last_frame: &mut Option<DisplayFrame>,
    ) where
        S: TimeSource,
        K: CueSink,
        D: FnMut(&DisplayFrame),
    {
        let outcome = session.tick(clock.adjusted_now());
        for cue in outcome.cues {
            sink.play(cue);
        }
        if let Some(config) = outcome.restart {
            self.spawn_restart(session.room_id(), config);
        }
        if last_frame.as_ref() != Some(&outcome.frame) {
            render(&outcome.frame);
            *last_frame = Some(outcome.frame);
        }
    }

    /// Fire the restart without blocking the tick loop.
    fn spawn_restart(&self, room_id: &str, config: RoundConfig) {
        let Some(starter) = &self.starter else {
            warn!(
                "[Display] room={} claimed a recurring restart but has no control channel",
                room_id
            );
            return;
        };

        let starter = Arc::clone(starter);
        let room_id = room_id.to_string();
        tokio::spawn(async move {
            let _ = issue_restart(starter.as_ref(), &room_id, &config).await;
        });
    }
}

/// Convenience wrapper running a loop with a fresh [`DisplayLoop`].
#[allow(clippy::too_many_arguments)]
pub async fn run_display<F, S, K, R, D, Q>(
    session: &mut DisplaySession,
    feed: &F,
    clock: &AdjustedClock<S>,
    sink: &mut K,
    starter: Option<Arc<R>>,
    tick_interval: Duration,
    render: D,
    shutdown: Q,
) -> anyhow::Result<()>
where
    F: RoundSubscriber,
    S: TimeSource,
    K: CueSink,
    R: RoundStarter + 'static,
    D: FnMut(&DisplayFrame),
    Q: Future<Output = ()>,
{
    DisplayLoop::new(tick_interval, starter)
        .run(session, feed, clock, sink, render, shutdown)
        .await
}
