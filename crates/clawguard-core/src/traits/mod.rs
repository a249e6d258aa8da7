pub mod auth;
pub mod platform;
pub mod presence;
pub mod status;

pub use auth::AuthorizationService;
pub use platform::{MemberPermissions, PlatformActionClient, RemovalOptions};
pub use presence::PresenceStore;
pub use status::{StatusError, StatusHandle, StatusSink};
