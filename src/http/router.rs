//! Route table and middleware stack.

use std::time::Instant;

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::observability::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};

use super::handlers;
use super::state::AppState;

/// Build the application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/rooms", get(handlers::list_rooms).post(handlers::create_room))
        .route("/rooms/{id}", get(handlers::get_room).delete(handlers::delete_room))
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        .route("/users/login", post(handlers::login))
        .route("/users/{id}", delete(handlers::delete_user))
        .route("/bookings", get(handlers::list_bookings).post(handlers::create_booking))
        .route("/bookings/suggestions", post(handlers::suggest_slots))
        .route("/bookings/{id}", delete(handlers::delete_booking))
        .route("/notifications/stream", get(handlers::notification_stream))
        .route("/reports/room-usage", get(handlers::room_usage));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .route_layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Record request count and latency per matched route.
async fn track_metrics(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = req.method().to_string();

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "route" => route.clone(), "status" => status)
        .increment(1);
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "route" => route)
        .record(started.elapsed().as_secs_f64());
    response
}
