//! HTTP handlers. Each validates its input at the boundary and delegates to the engine.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use ulid::Ulid;

use crate::engine::{BookingFilter, EngineError, parse_window};
use crate::model::Role;

use super::auth::{AdminUser, CurrentUser};
use super::dto::*;
use super::error::ApiError;
use super::state::AppState;

pub type HandlerResult<T> = Result<Json<T>, ApiError>;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rooms: state.engine.rooms.len(),
        users: state.engine.users.len(),
    })
}

// ── Rooms ────────────────────────────────────────────────────────

/// GET /api/rooms
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomDto>> {
    let rooms = state.engine.list_rooms().await;
    Json(rooms.into_iter().map(Into::into).collect())
}

/// GET /api/rooms/{id}
pub async fn get_room(State(state): State<AppState>, Path(id): Path<String>) -> HandlerResult<RoomDto> {
    let id = parse_id(&id, "room id")?;
    let room = state
        .engine
        .room_info(id)
        .await
        .map_err(|e| ApiError::from_engine("Room", e))?;
    Ok(Json(room.into()))
}

/// POST /api/rooms
pub async fn create_room(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoomDto>), ApiError> {
    let Json(req) = payload?;
    let name = required(&req.name, "name")?;
    let capacity = req
        .capacity
        .ok_or_else(|| ApiError::BadRequest("capacity is required.".into()))?;
    let room = state
        .engine
        .create_room(Ulid::new(), name, capacity, req.location.as_deref())
        .await
        .map_err(|e| ApiError::from_engine("Room", e))?;
    Ok((StatusCode::CREATED, Json(room.into())))
}

/// DELETE /api/rooms/{id}
pub async fn delete_room(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> HandlerResult<MessageResponse> {
    let id = parse_id(&id, "room id")?;
    state
        .engine
        .delete_room(id)
        .await
        .map_err(|e| ApiError::from_engine("Room", e))?;
    Ok(Json(MessageResponse::new("Room deleted successfully.")))
}

// ── Users ────────────────────────────────────────────────────────

/// GET /api/users
pub async fn list_users(State(state): State<AppState>, AdminUser(_): AdminUser) -> Json<Vec<UserDto>> {
    Json(state.engine.list_users().into_iter().map(Into::into).collect())
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<UsernameRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(req) = payload?;
    let username = required(&req.username, "Username")?;
    let user = state
        .engine
        .create_user(Ulid::new(), username, Role::User)
        .await
        .map_err(|e| ApiError::from_engine("User", e))?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!(
            "User '{}' created successfully.",
            user.username
        ))),
    ))
}

/// POST /api/users/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<UsernameRequest>, JsonRejection>,
) -> HandlerResult<LoginResponse> {
    let Json(req) = payload?;
    let username = required(&req.username, "Username")?;
    let user = state
        .engine
        .find_user_by_name(username)
        .ok_or(ApiError::Unauthorized("Invalid credentials."))?;
    Ok(Json(LoginResponse {
        token: state.tokens.issue(&user)?,
        user: user.into(),
    }))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> HandlerResult<MessageResponse> {
    let id = parse_id(&id, "user id")?;
    state
        .engine
        .delete_user(id)
        .await
        .map_err(|e| ApiError::from_engine("User", e))?;
    Ok(Json(MessageResponse::new("User deleted successfully.")))
}

// ── Bookings ─────────────────────────────────────────────────────

/// GET /api/bookings[?room=&date=]
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingQuery>,
) -> HandlerResult<Vec<BookingDto>> {
    let filter = BookingFilter {
        room_id: query.room.as_deref().map(|r| parse_id(r, "room")).transpose()?,
        date: query.date.as_deref().map(|d| parse_date_field(d, "date")).transpose()?,
    };
    let bookings = state.engine.list_bookings(filter).await;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

/// POST /api/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingCreatedResponse>), ApiError> {
    let Json(req) = payload?;
    let room_id = parse_id(required(&req.room, "room")?, "room")?;
    let date = parse_date_field(required(&req.date, "date")?, "date")?;
    let window = parse_window(
        required(&req.start_time, "startTime")?,
        required(&req.end_time, "endTime")?,
    )
    .map_err(|e| ApiError::from_engine("Booking", e))?;

    let booking = state
        .engine
        .confirm_booking(Ulid::new(), room_id, user.id, date, window)
        .await
        .map_err(|e| booking_error(user.id, e))?;

    Ok((
        StatusCode::CREATED,
        Json(BookingCreatedResponse {
            message: "Booking successful!",
            booking: booking.into(),
        }),
    ))
}

/// The caller's own account vanishing mid-request invalidates the token;
/// any other missing id is the room.
fn booking_error(caller: Ulid, err: EngineError) -> ApiError {
    match err {
        EngineError::NotFound(id) if id == caller => ApiError::Unauthorized("Token is not valid."),
        e => ApiError::from_engine("Room", e),
    }
}

/// DELETE /api/bookings/{id}
pub async fn delete_booking(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> HandlerResult<MessageResponse> {
    let id = parse_id(&id, "booking id")?;
    state
        .engine
        .cancel_booking(id)
        .await
        .map_err(|e| ApiError::from_engine("Booking", e))?;
    Ok(Json(MessageResponse::new("Booking deleted successfully.")))
}

/// POST /api/bookings/suggestions
pub async fn suggest_slots(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    payload: Result<Json<SuggestionRequest>, JsonRejection>,
) -> HandlerResult<Vec<SlotDto>> {
    let Json(req) = payload?;
    let room_id = parse_id(required(&req.room, "room")?, "room")?;
    let date = parse_date_field(required(&req.date, "date")?, "date")?;
    let requested = parse_clock_field(
        required(&req.requested_start_time, "requestedStartTime")?,
        "requestedStartTime",
    )?;

    let slots = state
        .engine
        .suggest(room_id, date, requested)
        .await
        .map_err(|e| ApiError::from_engine("Room", e))?;
    Ok(Json(slots.into_iter().map(Into::into).collect()))
}

// ── Notifications ────────────────────────────────────────────────

/// GET /api/notifications/stream
///
/// Server-sent events for the caller's booking confirmations and cancellations.
/// The stream ends when the account is deleted.
pub async fn notification_stream(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let user_id = user.id;
    let rx = state.hub.subscribe(user_id);
    let stream = futures::stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    let dto = NotificationDto::from(&notification);
                    let event = Event::default().event(dto.kind).json_data(&dto);
                    return Some((event, rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%user_id, skipped, "notification subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ── Reports ──────────────────────────────────────────────────────

/// GET /api/reports/room-usage
pub async fn room_usage(State(state): State<AppState>, AdminUser(_): AdminUser) -> Json<Vec<RoomUsageDto>> {
    let usage = state.engine.room_usage().await;
    Json(usage.into_iter().map(Into::into).collect())
}
