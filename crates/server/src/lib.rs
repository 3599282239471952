//! HTTP API server for the Curiocity document service.
//!
//! This crate provides the HTTP control plane:
//! - Signup, login, and bearer-session management
//! - Document and folder CRUD
//! - Resource upload with content-hash deduplication
//! - Resource metadata, move, and delete operations
//! - Admin endpoints (user listing, sweep, stats)

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::TraceId;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
