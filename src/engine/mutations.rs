use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use tokio::sync::{RwLock, oneshot};
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::Notification;
use crate::observability::{BOOKING_ATTEMPTS_TOTAL, booking_outcome_label};

use super::conflict::{check_no_conflict, validate_window};
use super::{Engine, EngineError, WalCommand};

fn validate_text(value: &str, max_len: usize, empty: &'static str, too_long: &'static str) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Invalid(empty));
    }
    if trimmed.len() > max_len {
        return Err(EngineError::LimitExceeded(too_long));
    }
    Ok(trimmed.to_string())
}

impl Engine {
    // ── Rooms ────────────────────────────────────────────────

    pub async fn create_room(
        &self,
        id: Ulid,
        name: &str,
        capacity: u32,
        location: Option<&str>,
    ) -> Result<RoomInfo, EngineError> {
        let name = validate_text(name, MAX_NAME_LEN, "room name is required", "room name too long")?;
        let location = match location.map(str::trim) {
            Some(l) if l.len() > MAX_NAME_LEN => {
                return Err(EngineError::LimitExceeded("room location too long"));
            }
            Some("") | None => None,
            Some(l) => Some(l.to_string()),
        };
        if capacity == 0 {
            return Err(EngineError::Invalid("room capacity must be positive"));
        }
        let _gate = self.log_gate.read().await;
        if self.rooms.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if self.rooms.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::RoomCreated {
            id,
            name: name.clone(),
            capacity,
            location: location.clone(),
        };
        self.wal_append(&event).await?;
        let rs = RoomState::new(id, name.clone(), capacity, location.clone());
        self.rooms.insert(id, Arc::new(RwLock::new(rs)));
        info!(room_id = %id, room = %name, "room created");

        Ok(RoomInfo {
            id,
            name,
            capacity,
            location,
        })
    }

    /// Delete a room together with all of its bookings.
    /// Returns the number of bookings that went with it.
    pub async fn delete_room(&self, id: Ulid) -> Result<usize, EngineError> {
        let _gate = self.log_gate.read().await;
        let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;
        if guard.deleted {
            return Err(EngineError::NotFound(id));
        }

        let event = Event::RoomDeleted { id };
        self.wal_append(&event).await?;

        let mut cancelled = Vec::new();
        for booking in guard.days.values().flatten() {
            self.booking_to_room.remove(&booking.id);
            cancelled.push(Notification::BookingCancelled {
                booking_id: booking.id,
                room_id: id,
                user_id: booking.user_id,
            });
        }
        guard.deleted = true;
        self.rooms.remove(&id);
        drop(guard);

        info!(room_id = %id, bookings = cancelled.len(), "room deleted");
        let count = cancelled.len();
        for n in cancelled {
            self.deliver(n).await;
        }
        Ok(count)
    }

    /// Seed the two default rooms when no room exists yet.
    pub async fn seed_rooms(&self) -> Result<usize, EngineError> {
        if !self.rooms.is_empty() {
            return Ok(0);
        }
        self.create_room(Ulid::new(), "Room A", 4, Some("First Floor")).await?;
        self.create_room(Ulid::new(), "Room B", 6, Some("Second Floor")).await?;
        Ok(2)
    }

    // ── Users ────────────────────────────────────────────────

    pub async fn create_user(&self, id: Ulid, username: &str, role: Role) -> Result<User, EngineError> {
        let username = validate_text(
            username,
            MAX_USERNAME_LEN,
            "username is required",
            "username too long",
        )?;
        let _gate = self.log_gate.read().await;
        if self.users.len() >= MAX_USERS {
            return Err(EngineError::LimitExceeded("too many users"));
        }
        if self.users.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        // Reserve the name before the log write so concurrent registrations can't both win.
        match self.usernames.entry(username.clone()) {
            Entry::Occupied(_) => return Err(EngineError::UsernameTaken(username)),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let event = Event::UserCreated {
            id,
            username: username.clone(),
            role,
        };
        if let Err(e) = self.wal_append(&event).await {
            self.usernames.remove(&username);
            return Err(e);
        }

        let user = User { id, username, role };
        self.users.insert(id, user.clone());
        info!(user_id = %id, username = %user.username, role = role.as_str(), "user created");
        Ok(user)
    }

    /// Bookings made by the user are kept; they list without a username afterwards.
    pub async fn delete_user(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.log_gate.read().await;
        if !self.users.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        self.wal_append(&Event::UserDeleted { id }).await?;
        if let Some((_, user)) = self.users.remove(&id) {
            self.usernames.remove(&user.username);
            info!(user_id = %id, username = %user.username, "user deleted");
        }
        self.notifier.forget_user(id).await;
        Ok(())
    }

    /// Create the bootstrap admin account unless the username already exists.
    pub async fn ensure_admin(&self, username: &str) -> Result<User, EngineError> {
        if let Some(user) = self.find_user_by_name(username) {
            if user.role != Role::Admin {
                warn!(username = %user.username, "bootstrap admin name belongs to a non-admin user");
            }
            return Ok(user);
        }
        self.create_user(Ulid::new(), username, Role::Admin).await
    }

    // ── Bookings ─────────────────────────────────────────────

    /// Admit a booking if its window is well-formed, inside operating hours
    /// and free on that room/date. Check and insert happen under the room's
    /// write lock.
    pub async fn confirm_booking(
        &self,
        id: Ulid,
        room_id: Ulid,
        user_id: Ulid,
        date: NaiveDate,
        window: TimeWindow,
    ) -> Result<BookingInfo, EngineError> {
        let result = self.admit_booking(id, room_id, user_id, date, window).await;
        metrics::counter!(BOOKING_ATTEMPTS_TOTAL, "outcome" => booking_outcome_label(&result))
            .increment(1);
        let (info, notification) = result?;
        self.deliver(notification).await;
        Ok(info)
    }

    async fn admit_booking(
        &self,
        id: Ulid,
        room_id: Ulid,
        user_id: Ulid,
        date: NaiveDate,
        window: TimeWindow,
    ) -> Result<(BookingInfo, Notification), EngineError> {
        validate_window(&window, &self.policy.hours)?;
        let _gate = self.log_gate.read().await;
        let user = self.get_user(&user_id).ok_or(EngineError::NotFound(user_id))?;
        if self.booking_to_room.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let rs = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let mut guard = rs.write().await;
        if guard.deleted {
            return Err(EngineError::NotFound(room_id));
        }
        if guard.booking_count() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        if let Err(e) = check_no_conflict(&guard, date, &window) {
            info!(
                %room_id,
                %date,
                start = %format_clock(window.start),
                end = %format_clock(window.end),
                "booking rejected: slot taken"
            );
            return Err(e);
        }

        let event = Event::BookingConfirmed {
            id,
            room_id,
            user_id,
            date,
            window,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        let room_name = guard.name.clone();
        drop(guard);

        info!(booking_id = %id, %room_id, %user_id, %date, "booking confirmed");
        let notification = Notification::BookingConfirmed {
            booking_id: id,
            room_id,
            room_name: room_name.clone(),
            user_id,
            date,
            window,
        };
        let info = BookingInfo {
            id,
            room_id,
            room_name: Some(room_name),
            user_id,
            username: Some(user.username),
            date,
            window,
        };
        Ok((info, notification))
    }

    pub async fn cancel_booking(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let _gate = self.log_gate.read().await;
        let room_id = self.get_room_for_booking(&id).ok_or(EngineError::NotFound(id))?;
        let rs = self.get_room(&room_id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;
        if guard.deleted {
            return Err(EngineError::NotFound(id));
        }
        let user_id = guard
            .days
            .values()
            .flatten()
            .find(|b| b.id == id)
            .map(|b| b.user_id)
            .ok_or(EngineError::NotFound(id))?;

        let event = Event::BookingCancelled { id, room_id };
        self.persist_and_apply(&mut guard, &event).await?;
        drop(guard);

        info!(booking_id = %id, %room_id, "booking cancelled");
        self.deliver(Notification::BookingCancelled {
            booking_id: id,
            room_id,
            user_id,
        })
        .await;
        Ok(room_id)
    }

    // ── Log maintenance ──────────────────────────────────────

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        // Exclusive: no mutation may sit between its log append and its apply.
        let _gate = self.log_gate.write().await;
        let mut events = Vec::new();

        for entry in self.users.iter() {
            let user = entry.value();
            events.push(Event::UserCreated {
                id: user.id,
                username: user.username.clone(),
                role: user.role,
            });
        }

        let room_arcs: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        for rs in room_arcs {
            let guard = rs.read().await;
            events.push(Event::RoomCreated {
                id: guard.id,
                name: guard.name.clone(),
                capacity: guard.capacity,
                location: guard.location.clone(),
            });
            for (date, day) in &guard.days {
                for booking in day {
                    events.push(Event::BookingConfirmed {
                        id: booking.id,
                        room_id: guard.id,
                        user_id: booking.user_id,
                        date: *date,
                        window: booking.window,
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
