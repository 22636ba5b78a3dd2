//! Recipient name suggestions for bulk generation.
//!
//! The Claude-backed suggester asks the Anthropic messages API for a JSON
//! array of names. Callers fall back to [`placeholder_names`] on any error.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = "You generate realistic full names of certificate recipients. \
Reply with a JSON array of strings and nothing else.";

#[derive(Debug, thiserror::Error)]
pub enum NameError {
    #[error("name suggestions are not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unusable response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait NameSuggester: Send + Sync + 'static {
    async fn suggest(&self, count: usize, context: &str) -> Result<Vec<String>, NameError>;
}

/// `count` synthetic names of the form `Person {n}`.
pub fn placeholder_names(count: usize) -> Vec<String> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| format!("Person {}", rng.random_range(1000..10000)))
        .collect()
}

/// Used when no `ANTHROPIC_API_KEY` is set.
pub struct UnconfiguredNameSuggester;

#[async_trait]
impl NameSuggester for UnconfiguredNameSuggester {
    async fn suggest(&self, _count: usize, _context: &str) -> Result<Vec<String>, NameError> {
        Err(NameError::NotConfigured)
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorBody {
    error: Option<ClaudeErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorDetail {
    message: Option<String>,
}

pub struct ClaudeNameSuggester {
    client: Client,
    api_key: String,
    model: String,
}

impl ClaudeNameSuggester {
    pub fn new(api_key: String, model: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl NameSuggester for ClaudeNameSuggester {
    async fn suggest(&self, count: usize, context: &str) -> Result<Vec<String>, NameError> {
        info!(count, model = %self.model, "requesting name suggestions");
        let prompt = if context.trim().is_empty() {
            format!("Generate {count} distinct full names.")
        } else {
            format!("Generate {count} distinct full names for this context: {context}")
        };
        let body = ClaudeRequest {
            model: &self.model,
            max_tokens: 1024,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ClaudeErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or(text);
            return Err(NameError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ClaudeResponse =
            serde_json::from_str(&text).map_err(|e| NameError::Malformed(e.to_string()))?;
        let reply = parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| NameError::Malformed("no text in response".to_string()))?;

        let names = parse_names(&reply, count);
        if names.is_empty() {
            return Err(NameError::Malformed("no names in reply".to_string()));
        }
        Ok(names)
    }
}

/// Accept a JSON array anywhere in the reply, else one name per line.
fn parse_names(reply: &str, count: usize) -> Vec<String> {
    let from_json = match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Vec<String>>(&reply[start..=end]).ok()
        }
        _ => None,
    };
    let names = from_json.unwrap_or_else(|| {
        reply
            .lines()
            .map(|l| l.trim_start_matches(|c: char| c.is_ascii_digit() || "-*. ".contains(c)))
            .map(str::to_string)
            .collect()
    });
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .take(count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_have_expected_shape() {
        let names = placeholder_names(3);
        assert_eq!(names.len(), 3);
        for name in names {
            let n: u32 = name.strip_prefix("Person ").unwrap().parse().unwrap();
            assert!((1000..10000).contains(&n));
        }
    }

    #[test]
    fn json_reply_is_parsed_and_truncated() {
        let names = parse_names("Sure!\n[\"Ada Lovelace\", \"Alan Turing\", \"Grace Hopper\"]", 2);
        assert_eq!(names, vec!["Ada Lovelace", "Alan Turing"]);
    }

    #[test]
    fn list_reply_is_parsed() {
        let names = parse_names("1. Ada Lovelace\n2. Alan Turing\n\n", 5);
        assert_eq!(names, vec!["Ada Lovelace", "Alan Turing"]);
    }

    #[tokio::test]
    async fn unconfigured_suggester_errors() {
        assert!(matches!(
            UnconfiguredNameSuggester.suggest(2, "").await,
            Err(NameError::NotConfigured)
        ));
    }
}
