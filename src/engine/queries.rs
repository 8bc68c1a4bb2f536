use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;
use crate::observability::SUGGESTIONS_RETURNED;

use super::suggest::suggest_slots;
use super::{Engine, EngineError, SharedRoomState};

/// Optional narrowing for booking listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub room_id: Option<Ulid>,
    pub date: Option<NaiveDate>,
}

impl Engine {
    fn room_arcs(&self) -> Vec<SharedRoomState> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut rooms = Vec::with_capacity(self.rooms.len());
        for rs in self.room_arcs() {
            let guard = rs.read().await;
            rooms.push(RoomInfo {
                id: guard.id,
                name: guard.name.clone(),
                capacity: guard.capacity,
                location: guard.location.clone(),
            });
        }
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        rooms
    }

    pub async fn room_info(&self, id: Ulid) -> Result<RoomInfo, EngineError> {
        let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.read().await;
        Ok(RoomInfo {
            id: guard.id,
            name: guard.name.clone(),
            capacity: guard.capacity,
            location: guard.location.clone(),
        })
    }

    pub fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    /// All bookings matching `filter`, populated with room and user names,
    /// ordered by date, start time, then room name.
    pub async fn list_bookings(&self, filter: BookingFilter) -> Vec<BookingInfo> {
        let arcs = match filter.room_id {
            Some(id) => self.get_room(&id).into_iter().collect(),
            None => self.room_arcs(),
        };

        let mut result = Vec::new();
        for rs in arcs {
            let guard = rs.read().await;
            for (date, day) in &guard.days {
                if filter.date.is_some_and(|d| d != *date) {
                    continue;
                }
                for booking in day {
                    result.push(BookingInfo {
                        id: booking.id,
                        room_id: guard.id,
                        room_name: Some(guard.name.clone()),
                        user_id: booking.user_id,
                        username: self.users.get(&booking.user_id).map(|u| u.username.clone()),
                        date: *date,
                        window: booking.window,
                    });
                }
            }
        }
        result.sort_by(|a, b| {
            (a.date, a.window.start, &a.room_name).cmp(&(b.date, b.window.start, &b.room_name))
        });
        result
    }

    /// Snapshot of a room's confirmed windows on `date`, ascending by start.
    pub async fn windows_on(&self, room_id: Ulid, date: NaiveDate) -> Result<Vec<TimeWindow>, EngineError> {
        let rs = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.read().await;
        if guard.deleted {
            return Err(EngineError::NotFound(room_id));
        }
        Ok(guard.windows_on(date))
    }

    /// Up to `policy.max_suggestions` free slots on the room/date, scanning
    /// forward from `requested_start`.
    pub async fn suggest(
        &self,
        room_id: Ulid,
        date: NaiveDate,
        requested_start: Minute,
    ) -> Result<Vec<TimeWindow>, EngineError> {
        if requested_start > MINUTES_PER_DAY {
            return Err(EngineError::Invalid("requestedStartTime must be HH:mm"));
        }
        let existing = self.windows_on(room_id, date).await?;
        let slots = suggest_slots(&existing, requested_start, &self.policy);
        metrics::histogram!(SUGGESTIONS_RETURNED).record(slots.len() as f64);
        tracing::debug!(
            %room_id,
            %date,
            requested = %format_clock(requested_start),
            existing = existing.len(),
            found = slots.len(),
            "computed slot suggestions"
        );
        Ok(slots)
    }

    /// Booking count per room (rooms with at least one booking), busiest first.
    pub async fn room_usage(&self) -> Vec<RoomUsage> {
        let mut usage = Vec::new();
        for rs in self.room_arcs() {
            let guard = rs.read().await;
            let count = guard.booking_count();
            if count > 0 {
                usage.push(RoomUsage {
                    room_id: guard.id,
                    room_name: guard.name.clone(),
                    count,
                });
            }
        }
        usage.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.room_name.cmp(&b.room_name)));
        usage
    }
}
