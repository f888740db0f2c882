// Round store: the one shared fact per room
//
// Operators write a room's descriptor, displays subscribe to it. The store
// only ever holds the *current* descriptor; there is no event history, so
// a subscriber that misses intermediate writes simply sees the latest one.

pub mod memory;
pub mod remote;

pub use memory::MemoryRoundStore;
pub use remote::{RemoteRoundFeed, SseDecoder, SseMessage, ERROR_EVENT, ROUND_EVENT};

use tokio::sync::mpsc;

use crate::error::{ConfigError, StoreError};
use crate::round::RoundDescriptor;

/// What a subscriber receives for a room.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Current descriptor, `None` when the room has no round
    Snapshot(Option<RoundDescriptor>),
    /// Payload arrived but could not be decoded into a descriptor
    Malformed(ConfigError),
    /// Connectivity problem; the feed keeps retrying on its own
    Error(StoreError),
}

/// Read side of the store.
///
/// A subscription delivers the current snapshot immediately, then one event
/// per change until the receiver is dropped. Dropping the receiver is the
/// unsubscribe.
pub trait RoundSubscriber: Send + Sync {
    fn subscribe(&self, room_id: &str) -> mpsc::UnboundedReceiver<StoreEvent>;
}

/// Full store contract used by the broadcast controller.
///
/// Writes are last-writer-wins; there is no compare-and-set.
pub trait RoundStore: RoundSubscriber {
    fn get(&self, room_id: &str) -> Result<Option<RoundDescriptor>, StoreError>;

    /// Replace the room's descriptor.
    fn put(&self, room_id: &str, descriptor: RoundDescriptor) -> Result<(), StoreError>;

    /// Patch an existing descriptor in place. Returns `false` and writes
    /// nothing when the room has no descriptor.
    fn update(
        &self,
        room_id: &str,
        apply: &mut dyn FnMut(&mut RoundDescriptor),
    ) -> Result<bool, StoreError>;

    /// Delete the descriptor. Returns whether one existed; removing an empty
    /// room is not an error.
    fn remove(&self, room_id: &str) -> Result<bool, StoreError>;
}
