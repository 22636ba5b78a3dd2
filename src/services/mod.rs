//! Business logic services.
//!
//! Services hold the logic behind the handlers: quota accounting, rendering
//! and persistence, account flows and the bulk pipeline.

pub mod account_service;
pub mod api_key_service;
pub mod bulk_service;
pub mod certificate_service;
pub mod template_service;
