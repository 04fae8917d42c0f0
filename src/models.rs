//! Data types returned by the mail.tm API.
//!
//! The provider speaks JSON-LD: collections arrive either as a bare array or
//! wrapped in a Hydra object under `hydra:member`. Messages are normalized
//! on the way in so the rest of the crate sees plain strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const PREVIEW_CHARS: usize = 100;

/// A domain that accounts can be registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(default)]
    pub id: String,
    pub domain: String,
    #[serde(default = "default_true", alias = "isActive")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Address and password of a mail.tm account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub address: String,
    pub password: String,
}

impl Credentials {
    pub fn new(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
        }
    }
}

/// Inbox listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    /// Sender address.
    #[serde(default, deserialize_with = "sender_address")]
    pub from: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subject: String,
    #[serde(default, alias = "createdAt", deserialize_with = "null_as_empty")]
    pub received_at: String,
    /// First 100 characters of the provider's `intro`.
    #[serde(default, alias = "intro", deserialize_with = "preview")]
    pub preview: String,
}

/// Full message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDetails {
    pub id: String,
    #[serde(default, deserialize_with = "sender_address")]
    pub from: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subject: String,
    /// Plain-text body.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    /// HTML body parts. A single string from the provider becomes one part.
    #[serde(default, deserialize_with = "html_parts")]
    pub html: Vec<String>,
    #[serde(default, alias = "createdAt", deserialize_with = "null_as_empty")]
    pub received_at: String,
}

impl MessageDetails {
    /// Text body followed by every HTML part, space separated.
    pub fn combined_content(&self) -> String {
        let mut all = self.text.clone();
        for part in &self.html {
            all.push(' ');
            all.push_str(part);
        }
        all
    }
}

/// Snapshot of the local session, as reported by `status` commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub current_email: Option<String>,
    pub authenticated: bool,
    pub service_status: String,
    pub timestamp: DateTime<Utc>,
}

impl Status {
    pub fn new(current_email: Option<&str>) -> Self {
        Self {
            current_email: current_email.map(str::to_string),
            authenticated: current_email.is_some(),
            service_status: "active".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Items of a provider collection, bare or Hydra-wrapped.
///
/// Entries that don't decode as `T` are skipped.
pub(crate) fn collection<T: serde::de::DeserializeOwned>(value: Value) -> Vec<T> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map
            .remove("hydra:member")
            .or_else(|| map.remove("data"))
        {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

/// Truncate to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn sender_address<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .get("address")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn preview<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let intro = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    Ok(truncate_chars(&intro, PREVIEW_CHARS).to_string())
}

fn html_parts<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => vec![s],
        Value::Array(parts) => parts
            .into_iter()
            .filter_map(|p| match p {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hydra_and_bare_collections_match() {
        let item = json!({"id": "1", "domain": "example.com", "isActive": true});
        let hydra: Vec<Domain> = collection(json!({"hydra:member": [item.clone()]}));
        let bare: Vec<Domain> = collection(json!([item]));
        assert_eq!(hydra, bare);
        assert_eq!(hydra[0].domain, "example.com");
    }

    #[test]
    fn collection_skips_malformed_entries() {
        let domains: Vec<Domain> = collection(json!([
            {"id": "1", "domain": "a.com"},
            {"id": "2"},
            "garbage"
        ]));
        assert_eq!(domains.len(), 1);
        assert!(domains[0].is_active);
    }

    #[test]
    fn summary_normalizes_provider_fields() {
        let intro = "x".repeat(150);
        let msg: MessageSummary = serde_json::from_value(json!({
            "id": "m1",
            "from": {"address": "noreply@svc.io", "name": "Service"},
            "subject": "Welcome",
            "intro": intro,
            "createdAt": "2024-05-01T10:00:00+00:00",
        }))
        .unwrap();

        assert_eq!(msg.from, "noreply@svc.io");
        assert_eq!(msg.preview.len(), 100);
        assert_eq!(msg.received_at, "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn details_accept_single_html_string() {
        let msg: MessageDetails = serde_json::from_value(json!({
            "id": "m1",
            "from": "plain@sender.org",
            "subject": null,
            "text": "hello",
            "html": "<p>hi</p>",
        }))
        .unwrap();

        assert_eq!(msg.html, vec!["<p>hi</p>".to_string()]);
        assert_eq!(msg.subject, "");
        assert_eq!(msg.combined_content(), "hello <p>hi</p>");
    }

    #[test]
    fn details_drop_unexpected_html_shape() {
        let msg: MessageDetails =
            serde_json::from_value(json!({"id": "m1", "html": {"bad": true}})).unwrap();
        assert!(msg.html.is_empty());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
