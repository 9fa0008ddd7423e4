// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the auth server.

pub mod authorize;

pub use authorize::{authorize, Authorize};
