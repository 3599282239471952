//! HTTP request handlers.

pub mod admin;
pub mod auth;
pub mod capabilities;
pub mod common;
pub mod documents;
pub mod resources;
pub mod users;

pub use admin::*;
pub use auth::*;
pub use capabilities::*;
pub use common::*;
pub use documents::*;
pub use resources::*;
pub use users::*;
