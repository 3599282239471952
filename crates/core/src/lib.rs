//! Core domain types and shared logic for the Curiocity document service.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Content hashes for resource deduplication
//! - Documents, folders, and resource projections
//! - Resource metadata and content records
//! - Users and credentials
//! - Session scopes and authorization

pub mod config;
pub mod document;
pub mod error;
pub mod hash;
pub mod resource;
pub mod session;
pub mod user;

pub use document::{Document, Folder, ResourceCompressed};
pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use resource::{Resource, ResourceId, ResourceMeta};
pub use session::{Scope, Session, SessionId};
pub use user::{User, UserId};

/// Maximum accepted resource upload size: 32 MiB.
pub const MAX_RESOURCE_SIZE: u64 = 32 * 1024 * 1024;

/// Minimum password length for manual signup.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Default session lifetime: 30 days.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 24 * 3600;
