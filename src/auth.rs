//! Credential models and expiry-signal detection.

pub mod expiry;
pub mod secret;
pub mod session;

pub use expiry::*;
pub use secret::*;
pub use session::*;
