//! Outbound HTTP collaborators: transactional mail and AI name suggestions.
//!
//! Both sit behind traits so the router can be driven in tests without a
//! network.

pub mod mailer;
pub mod names;

pub use mailer::{HttpMailer, LogMailer, MailMessage, Mailer, MemoryMailer};
pub use names::{ClaudeNameSuggester, NameSuggester, UnconfiguredNameSuggester};
