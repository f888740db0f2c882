// MemoryRoundStore: in-process room table
// Single Responsibility: current descriptor per room plus change fan-out

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, watch};

use super::{RoundStore, RoundSubscriber, StoreEvent};
use crate::error::StoreError;
use crate::round::RoundDescriptor;

type RoomSender = watch::Sender<Option<RoundDescriptor>>;
type RoomTable = HashMap<String, RoomSender>;

/// Room table backed by one `watch` channel per room
///
/// A `watch` channel holds exactly one value, which matches the store's
/// state semantics: late subscribers get the current descriptor, and bursts
/// of writes collapse to the latest one instead of queueing.
///
/// # Notes
/// - Room entries are created lazily by the first write or subscription
/// - An entry with no descriptor and no subscribers is dropped, so read-only
///   subscriptions to rooms that never start leave nothing behind
/// - `subscribe` spawns a forwarding task and must be called inside a tokio runtime
#[derive(Default)]
pub struct MemoryRoundStore {
    rooms: Arc<RwLock<RoomTable>>,
}

impl MemoryRoundStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rooms currently held.
    pub fn room_count(&self) -> usize {
        self.rooms.read().map(|rooms| rooms.len()).unwrap_or(0)
    }

    /// Run `f` against the room's sender, creating the room if needed.
    fn with_room<T>(&self, room_id: &str, f: impl FnOnce(&RoomSender) -> T) -> Result<T, StoreError> {
        {
            let rooms = self.rooms.read().map_err(|_| StoreError::LockPoisoned)?;
            if let Some(sender) = rooms.get(room_id) {
                return Ok(f(sender));
            }
        }

        let mut rooms = self.rooms.write().map_err(|_| StoreError::LockPoisoned)?;
        let sender = rooms
            .entry(room_id.to_string())
            .or_insert_with(|| watch::channel(None).0);
        Ok(f(sender))
    }

    /// Run `f` against an existing room without creating it.
    fn with_existing<T>(
        &self,
        room_id: &str,
        f: impl FnOnce(&RoomSender) -> T,
    ) -> Result<Option<T>, StoreError> {
        let rooms = self.rooms.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(rooms.get(room_id).map(f))
    }
}

/// Drop `room_id` if it holds no descriptor and nobody is watching it.
///
/// Runs under the write lock, so a concurrent `subscribe` either sees the
/// entry before removal or recreates it.
fn prune_idle_room(rooms: &RwLock<RoomTable>, room_id: &str) -> bool {
    let Ok(mut rooms) = rooms.write() else {
        return false;
    };
    let idle = rooms
        .get(room_id)
        .is_some_and(|sender| sender.borrow().is_none() && sender.receiver_count() == 0);
    if idle {
        rooms.remove(room_id);
        log::debug!("[RoundStore] dropped idle room {}", room_id);
    }
    idle
}

impl RoundSubscriber for MemoryRoundStore {
    /// Subscribe to a room's descriptor
    ///
    /// # Returns
    /// Receiver yielding the current snapshot first, then one `Snapshot`
    /// per change. A poisoned table yields a single `Error` event.
    fn subscribe(&self, room_id: &str) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, out) = mpsc::unbounded_channel();

        let mut rx = match self.with_room(room_id, |sender| sender.subscribe()) {
            Ok(rx) => rx,
            Err(err) => {
                let _ = tx.send(StoreEvent::Error(err));
                return out;
            }
        };

        let initial = rx.borrow_and_update().clone();
        let _ = tx.send(StoreEvent::Snapshot(initial));

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::warn!(
                    "[RoundStore] subscribe({}) outside a runtime; delivering snapshot only",
                    room_id
                );
                drop(rx);
                prune_idle_room(&self.rooms, room_id);
                return out;
            }
        };

        let room = room_id.to_string();
        let rooms = Arc::clone(&self.rooms);
        handle.spawn(async move {
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = rx.borrow_and_update().clone();
                        if tx.send(StoreEvent::Snapshot(snapshot)).is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
            drop(rx);
            log::debug!("[RoundStore] subscriber for {} detached", room);
            prune_idle_room(&rooms, &room);
        });

        out
    }
}

impl RoundStore for MemoryRoundStore {
    fn get(&self, room_id: &str) -> Result<Option<RoundDescriptor>, StoreError> {
        Ok(self
            .with_existing(room_id, |sender| sender.borrow().clone())?
            .flatten())
    }

    fn put(&self, room_id: &str, descriptor: RoundDescriptor) -> Result<(), StoreError> {
        self.with_room(room_id, |sender| {
            sender.send_replace(Some(descriptor));
        })
    }

    fn update(
        &self,
        room_id: &str,
        apply: &mut dyn FnMut(&mut RoundDescriptor),
    ) -> Result<bool, StoreError> {
        let updated = self.with_existing(room_id, |sender| {
            sender.send_if_modified(|current| match current {
                Some(descriptor) => {
                    apply(descriptor);
                    true
                }
                None => false,
            })
        })?;
        Ok(updated.unwrap_or(false))
    }

    fn remove(&self, room_id: &str) -> Result<bool, StoreError> {
        let previous = self.with_existing(room_id, |sender| sender.send_replace(None))?;
        prune_idle_room(&self.rooms, room_id);
        Ok(previous.flatten().is_some())
    }
}
