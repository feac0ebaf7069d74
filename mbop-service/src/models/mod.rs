pub mod allowlist;
pub mod identity;
pub mod registration;
pub mod user;

pub use allowlist::*;
pub use identity::*;
pub use registration::*;
pub use user::*;
