// CompSync - synchronized competition round timer
// Authoritative-clock countdown shared by many displays through a round store

// Module declarations
pub mod clock;
pub mod config;
pub mod control;
pub mod cues;
pub mod display;
pub mod error;
pub mod operator;
pub mod recurring;
pub mod round;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod timer;

// Re-exports for convenience
pub use clock::{AdjustedClock, ClockCalibrator, ClockOffset, TimeSource};
pub use control::{BroadcastController, ControlCommand, ControlRequest};
pub use display::{DisplayFrame, DisplaySession};
pub use round::{RoundConfig, RoundDescriptor};
pub use store::{MemoryRoundStore, RoundStore, RoundSubscriber, StoreEvent};
pub use timer::{compute_timer_state, TimerPhase, TimerState};

use tracing::Level;

/// Install the global tracing subscriber.
///
/// `log` records are bridged into tracing, so both macro families end up on
/// stderr. Calling this more than once is harmless.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
