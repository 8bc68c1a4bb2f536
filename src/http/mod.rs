//! JSON-over-HTTP surface.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use auth::TokenKeys;
pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;
