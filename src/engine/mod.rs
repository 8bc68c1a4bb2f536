mod conflict;
mod error;
mod mutations;
mod queries;
mod suggest;

pub use conflict::{first_conflict, has_conflict, parse_window};
pub use error::EngineError;
pub use queries::BookingFilter;
pub use suggest::suggest_slots;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::notify::{Notification, Notifier};
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit:
/// block for the first append, drain whatever else is queued, then one
/// `flush_sync` for the batch and answer every sender with its result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_non_append(&mut wal, cmd);
            continue;
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;

        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }

        commit_batch(&mut wal, &mut batch);
        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
    debug!("WAL writer stopped");
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let mut result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Always flush, even after an append error, so partially buffered bytes
    // don't leak into the next batch.
    let flushed = wal.flush_sync();
    if result.is_ok() {
        result = flushed;
    }

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// The availability engine plus the booking store it guards.
///
/// Each room's bookings sit behind their own `RwLock`; admission runs the
/// conflict check and the insert under the room's write lock, so two
/// overlapping requests for the same room are serialized.
pub struct Engine {
    pub rooms: DashMap<Ulid, SharedRoomState>,
    pub users: DashMap<Ulid, User>,
    /// Unique username index.
    pub(super) usernames: DashMap<String, Ulid>,
    /// Reverse lookup: booking id → room id
    pub(super) booking_to_room: DashMap<Ulid, Ulid>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Mutations hold this shared from log append to apply; compaction takes it exclusively.
    pub(super) log_gate: RwLock<()>,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) policy: SuggestionPolicy,
}

/// Apply a booking event to a room (caller holds the lock).
fn apply_to_room(rs: &mut RoomState, event: &Event, booking_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::BookingConfirmed {
            id,
            room_id,
            user_id,
            date,
            window,
        } => {
            rs.insert_booking(
                *date,
                Booking {
                    id: *id,
                    user_id: *user_id,
                    window: *window,
                },
            );
            booking_map.insert(*id, *room_id);
        }
        Event::BookingCancelled { id, .. } => {
            rs.remove_booking(*id);
            booking_map.remove(id);
        }
        // Room and user lifecycle is handled at the DashMap level, not here
        Event::RoomCreated { .. }
        | Event::RoomDeleted { .. }
        | Event::UserCreated { .. }
        | Event::UserDeleted { .. } => {}
    }
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        notifier: Arc<dyn Notifier>,
        policy: SuggestionPolicy,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            rooms: DashMap::new(),
            users: DashMap::new(),
            usernames: DashMap::new(),
            booking_to_room: DashMap::new(),
            wal_tx,
            log_gate: RwLock::new(()),
            notifier,
            policy,
        };

        // Sole owner of these Arcs during replay, so try_write always succeeds.
        // Never blocking_write here: this runs inside the async runtime.
        for event in &events {
            engine.replay_event(event);
        }
        info!(
            path = %wal_path.display(),
            events = events.len(),
            rooms = engine.rooms.len(),
            users = engine.users.len(),
            "booking log replayed"
        );

        Ok(engine)
    }

    fn replay_event(&self, event: &Event) {
        match event {
            Event::RoomCreated {
                id,
                name,
                capacity,
                location,
            } => {
                let rs = RoomState::new(*id, name.clone(), *capacity, location.clone());
                self.rooms.insert(*id, Arc::new(RwLock::new(rs)));
            }
            Event::RoomDeleted { id } => self.drop_room(id),
            Event::UserCreated { id, username, role } => {
                self.usernames.insert(username.clone(), *id);
                self.users.insert(
                    *id,
                    User {
                        id: *id,
                        username: username.clone(),
                        role: *role,
                    },
                );
            }
            Event::UserDeleted { id } => {
                if let Some((_, user)) = self.users.remove(id) {
                    self.usernames.remove(&user.username);
                }
            }
            Event::BookingConfirmed { room_id, .. } | Event::BookingCancelled { room_id, .. } => {
                if let Some(entry) = self.rooms.get(room_id) {
                    let rs = entry.value().clone();
                    let mut guard = rs.try_write().expect("replay: uncontended write");
                    apply_to_room(&mut guard, event, &self.booking_to_room);
                }
            }
        }
    }

    /// Remove a room and unindex its bookings (replay only, the room is uncontended).
    fn drop_room(&self, id: &Ulid) {
        if let Some((_, rs)) = self.rooms.remove(id)
            && let Ok(guard) = rs.try_read()
        {
            for booking in guard.days.values().flatten() {
                self.booking_to_room.remove(&booking.id);
            }
        }
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply, with the room's write lock held by the caller.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event, &self.booking_to_room);
        Ok(())
    }

    /// Deliver a notification. Failures are logged; the triggering change stands.
    pub(super) async fn deliver(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            metrics::counter!(crate::observability::NOTIFY_FAILURES_TOTAL).increment(1);
            warn!(user_id = %notification.user_id(), error = %e, "failed to deliver notification");
        }
    }

    pub fn policy(&self) -> &SuggestionPolicy {
        &self.policy
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn get_user(&self, id: &Ulid) -> Option<User> {
        self.users.get(id).map(|e| e.value().clone())
    }

    pub fn find_user_by_name(&self, username: &str) -> Option<User> {
        let id = *self.usernames.get(username.trim())?.value();
        self.get_user(&id)
    }

    pub fn get_room_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_room.get(booking_id).map(|e| *e.value())
    }
}
