//! Request and response bodies. Times travel as `"HH:mm"`, dates as `"YYYY-MM-DD"`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::{BookingInfo, Minute, Role, RoomInfo, RoomUsage, TimeWindow, User, format_clock, parse_clock, parse_date};

use crate::notify::Notification;

use super::error::ApiError;

// ── Field helpers ────────────────────────────────────────────────

pub fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("{field} is required."))),
    }
}

pub fn parse_id(raw: &str, field: &str) -> Result<Ulid, ApiError> {
    Ulid::from_string(raw.trim()).map_err(|_| ApiError::BadRequest(format!("{field} is not a valid id.")))
}

pub fn parse_date_field(raw: &str, field: &str) -> Result<NaiveDate, ApiError> {
    parse_date(raw).ok_or_else(|| ApiError::BadRequest(format!("{field} must be YYYY-MM-DD.")))
}

pub fn parse_clock_field(raw: &str, field: &str) -> Result<Minute, ApiError> {
    parse_clock(raw).ok_or_else(|| ApiError::BadRequest(format!("{field} must be HH:mm.")))
}

// ── Requests ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub room: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub room: Option<String>,
    pub date: Option<String>,
    pub requested_start_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingQuery {
    pub room: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: Option<String>,
    pub capacity: Option<u32>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    pub username: Option<String>,
}

// ── Responses ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rooms: usize,
    pub users: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDto {
    pub start_time: String,
    pub end_time: String,
}

impl From<TimeWindow> for SlotDto {
    fn from(w: TimeWindow) -> Self {
        Self {
            start_time: format_clock(w.start),
            end_time: format_clock(w.end),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoomDto {
    pub id: String,
    pub name: String,
    pub capacity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl From<RoomInfo> for RoomDto {
    fn from(r: RoomInfo) -> Self {
        Self {
            id: r.id.to_string(),
            name: r.name,
            capacity: r.capacity,
            location: r.location,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id.to_string(),
            username: u.username,
            role: u.role,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDto {
    pub id: String,
    pub room_id: String,
    pub room_name: Option<String>,
    pub user_id: String,
    pub username: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

impl From<BookingInfo> for BookingDto {
    fn from(b: BookingInfo) -> Self {
        Self {
            id: b.id.to_string(),
            room_id: b.room_id.to_string(),
            room_name: b.room_name,
            user_id: b.user_id.to_string(),
            username: b.username,
            date: b.date.format("%Y-%m-%d").to_string(),
            start_time: format_clock(b.window.start),
            end_time: format_clock(b.window.end),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookingCreatedResponse {
    pub message: &'static str,
    pub booking: BookingDto,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUsageDto {
    pub room_id: String,
    pub room_name: String,
    pub count: usize,
}

impl From<RoomUsage> for RoomUsageDto {
    fn from(u: RoomUsage) -> Self {
        Self {
            room_id: u.room_id.to_string(),
            room_name: u.room_name,
            count: u.count,
        }
    }
}


/// Payload of one notification-stream event. `kind` doubles as the SSE event name.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub kind: &'static str,
    pub booking_id: String,
    pub room_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

impl From<&Notification> for NotificationDto {
    fn from(n: &Notification) -> Self {
        match n {
            Notification::BookingConfirmed {
                booking_id,
                room_id,
                room_name,
                date,
                window,
                ..
            } => Self {
                kind: "booking_confirmed",
                booking_id: booking_id.to_string(),
                room_id: room_id.to_string(),
                room_name: Some(room_name.clone()),
                date: Some(date.format("%Y-%m-%d").to_string()),
                start_time: Some(format_clock(window.start)),
                end_time: Some(format_clock(window.end)),
            },
            Notification::BookingCancelled {
                booking_id, room_id, ..
            } => Self {
                kind: "booking_cancelled",
                booking_id: booking_id.to_string(),
                room_id: room_id.to_string(),
                room_name: None,
                date: None,
                start_time: None,
                end_time: None,
            },
        }
    }
}
