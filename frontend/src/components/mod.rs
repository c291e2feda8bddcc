pub mod auth;
pub mod impersonation;
pub mod layout;

pub use auth::*;
pub use impersonation::*;
