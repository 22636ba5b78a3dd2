//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Extracts request data (JSON body, multipart form, path, headers)
//! 2. Delegates to a service in `crate::services`
//! 3. Returns a JSON response or an `AppError`

/// Signup, login, password reset and profile endpoints
pub mod accounts;

/// API key management for signed-in users
pub mod api_keys;

/// Bulk certificate generation and status polling
pub mod bulk;

/// Single certificate generation and verification
pub mod certificates;

pub mod health;

/// Presigned object downloads
pub mod objects;

/// Canvas template CRUD
pub mod templates;
