use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since local midnight.
pub type Minute = u32;

pub const MINUTES_PER_HOUR: Minute = 60;
pub const MINUTES_PER_DAY: Minute = 24 * MINUTES_PER_HOUR;

/// Half-open interval `[start, end)` on a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Minute,
    pub end: Minute,
}

impl TimeWindow {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "TimeWindow start must be before end");
        Self { start, end }
    }

    pub fn duration(&self) -> Minute {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_window(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Parse a `"HH:mm"` wall-clock value. `"24:00"` is accepted as end of day.
pub fn parse_clock(s: &str) -> Option<Minute> {
    let s = s.trim();
    if s == "24:00" {
        return Some(MINUTES_PER_DAY);
    }
    let t = NaiveTime::parse_from_str(s, "%H:%M").ok()?;
    Some(t.hour() * MINUTES_PER_HOUR + t.minute())
}

pub fn format_clock(m: Minute) -> String {
    format!("{:02}:{:02}", m / MINUTES_PER_HOUR, m % MINUTES_PER_HOUR)
}

/// Parse a `"YYYY-MM-DD"` calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Daily bounds within which bookings and suggestions are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingHours {
    pub day_start_hour: u32,
    pub day_end_hour: u32,
}

impl Default for OperatingHours {
    fn default() -> Self {
        Self {
            day_start_hour: 9,
            day_end_hour: 21,
        }
    }
}

impl OperatingHours {
    pub fn new(day_start_hour: u32, day_end_hour: u32) -> Result<Self, &'static str> {
        if day_end_hour > 24 {
            return Err("day end hour must be at most 24");
        }
        if day_start_hour >= day_end_hour {
            return Err("day start hour must be before day end hour");
        }
        Ok(Self {
            day_start_hour,
            day_end_hour,
        })
    }

    pub fn day_start(&self) -> Minute {
        self.day_start_hour * MINUTES_PER_HOUR
    }

    pub fn day_end(&self) -> Minute {
        self.day_end_hour * MINUTES_PER_HOUR
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.day_start(), self.day_end())
    }
}

/// How the suggestion cursor is aligned, both initially and after each conflict jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    /// Use the cursor as-is.
    None,
    /// Round up to the next `:00` or `:30`.
    #[default]
    HalfHour,
}

impl Rounding {
    pub fn apply(self, m: Minute) -> Minute {
        match self {
            Rounding::None => m,
            Rounding::HalfHour => m.div_ceil(30) * 30,
        }
    }
}

impl FromStr for Rounding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Rounding::None),
            "half-hour" | "half_hour" | "30" => Ok(Rounding::HalfHour),
            other => Err(format!("unknown rounding policy: {other}")),
        }
    }
}

impl std::fmt::Display for Rounding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rounding::None => f.write_str("none"),
            Rounding::HalfHour => f.write_str("half-hour"),
        }
    }
}

/// Parameters of the slot suggestion sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionPolicy {
    pub slot_duration: Minute,
    pub max_suggestions: usize,
    pub hours: OperatingHours,
    pub rounding: Rounding,
}

impl Default for SuggestionPolicy {
    fn default() -> Self {
        Self {
            slot_duration: 60,
            max_suggestions: 3,
            hours: OperatingHours::default(),
            rounding: Rounding::HalfHour,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Ulid,
    pub username: String,
    pub role: Role,
}

/// A confirmed booking as held inside its room's day list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: Ulid,
    pub user_id: Ulid,
    pub window: TimeWindow,
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub name: String,
    pub capacity: u32,
    pub location: Option<String>,
    /// Confirmed bookings per calendar day, each list sorted by `window.start`.
    pub days: BTreeMap<NaiveDate, Vec<Booking>>,
    /// Set under the write lock once the room is removed. Holders of a stale
    /// `Arc` must treat the room as gone.
    pub deleted: bool,
}

impl RoomState {
    pub fn new(id: Ulid, name: String, capacity: u32, location: Option<String>) -> Self {
        Self {
            id,
            name,
            capacity,
            location,
            days: BTreeMap::new(),
            deleted: false,
        }
    }

    /// Insert a booking maintaining sort order by start time.
    pub fn insert_booking(&mut self, date: NaiveDate, booking: Booking) {
        let day = self.days.entry(date).or_default();
        let pos = day
            .binary_search_by_key(&booking.window.start, |b| b.window.start)
            .unwrap_or_else(|e| e);
        day.insert(pos, booking);
    }

    /// Remove a booking by id, dropping the day entry once it is empty.
    pub fn remove_booking(&mut self, id: Ulid) -> Option<(NaiveDate, Booking)> {
        let (date, pos) = self.days.iter().find_map(|(date, day)| {
            day.iter().position(|b| b.id == id).map(|pos| (*date, pos))
        })?;
        let day = self.days.get_mut(&date)?;
        let booking = day.remove(pos);
        if day.is_empty() {
            self.days.remove(&date);
        }
        Some((date, booking))
    }

    pub fn bookings_on(&self, date: NaiveDate) -> &[Booking] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Snapshot of the day's windows, ascending by start.
    pub fn windows_on(&self, date: NaiveDate) -> Vec<TimeWindow> {
        self.bookings_on(date).iter().map(|b| b.window).collect()
    }

    /// Bookings on `date` whose window overlaps `query`.
    /// Binary search skips bookings starting at or after `query.end`.
    pub fn overlapping(&self, date: NaiveDate, query: &TimeWindow) -> impl Iterator<Item = &Booking> {
        let day = self.bookings_on(date);
        let right_bound = day.partition_point(|b| b.window.start < query.end);
        day[..right_bound]
            .iter()
            .filter(move |b| b.window.end > query.start)
    }

    pub fn booking_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }
}

/// Log record payload. Flat variants, one per state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: Ulid,
        name: String,
        capacity: u32,
        location: Option<String>,
    },
    RoomDeleted {
        id: Ulid,
    },
    UserCreated {
        id: Ulid,
        username: String,
        role: Role,
    },
    UserDeleted {
        id: Ulid,
    },
    BookingConfirmed {
        id: Ulid,
        room_id: Ulid,
        user_id: Ulid,
        date: NaiveDate,
        window: TimeWindow,
    },
    BookingCancelled {
        id: Ulid,
        room_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: Ulid,
    pub name: String,
    pub capacity: u32,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingInfo {
    pub id: Ulid,
    pub room_id: Ulid,
    pub room_name: Option<String>,
    pub user_id: Ulid,
    /// `None` once the booking's user has been deleted.
    pub username: Option<String>,
    pub date: NaiveDate,
    pub window: TimeWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUsage {
    pub room_id: Ulid,
    pub room_name: String,
    pub count: usize,
}
