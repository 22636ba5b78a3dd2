//! Data models representing stored entities and API payloads.

/// API key quota model
pub mod api_key;
/// Certificate requests and metadata sidecars
pub mod certificate;
/// Bulk generation status records
pub mod generation;
/// User-authored canvas templates
pub mod template;
/// User accounts and one-time passwords
pub mod user;
