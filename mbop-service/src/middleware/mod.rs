pub mod directory;
pub mod identity;

pub use directory::directory_passthrough;
pub use identity::{require_identity, CallerIdentity};
