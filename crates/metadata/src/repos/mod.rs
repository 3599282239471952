//! Repository traits for metadata operations.

pub mod bootstrap;
pub mod credentials;
pub mod documents;
pub mod resources;
pub mod sessions;
pub mod users;

pub use bootstrap::BootstrapRepo;
pub use credentials::CredentialRepo;
pub use documents::DocumentRepo;
pub use resources::{ResourceRepo, ResourceStats};
pub use sessions::SessionRepo;
pub use users::UserRepo;
