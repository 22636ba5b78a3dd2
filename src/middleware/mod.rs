//! HTTP middleware components.
//!
//! Middleware run before route handlers. They can:
//! - Authenticate requests
//! - Add CORS headers and answer preflights
//! - Short-circuit requests (reject unauthorized)

pub mod cors;

/// Bearer session authentication
pub mod session;
