//! Pattern matching over message bodies.
//!
//! Verification codes are searched in the plain-text body only; links are
//! searched in the text and every HTML part. Results are deduplicated in
//! order of first appearance.

use crate::MessageDetails;
use crate::models::truncate_chars;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

const TEXT_PREVIEW_CHARS: usize = 200;

/// Keyword patterns only ignore case in the keyword; the captured code must
/// be upper case or digits, otherwise "verification code is" yields "code".
static CODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i:verification|verify|code|otp|pin)[:\s]+([A-Z0-9]{4,8})\b",
        r"(?i:code|otp|pin)\s*(?i:is|:)\s*([A-Z0-9]{4,8})\b",
        r"\b([0-9]{4,6})\b",
        r"\b([A-Z0-9]{6})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("code pattern compiles"))
    .collect()
});

static VERIFICATION_LINK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        concat!(
            r#"(?i)https?://[^\s<>"{}|\\^`\[\]]+"#,
            r#"(?:verify|confirm|activate|validation|auth)[^\s<>"{}|\\^`\[\]]*"#,
        ),
        r#"(?i)https?://[^\s<>"{}|\\^`\[\]]*(?:token|code|key)=[^\s<>"{}|\\^`\[\]]+"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("link pattern compiles"))
    .collect()
});

static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"{}|\\^`\[\]]+"#).expect("link pattern compiles")
});

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
        .expect("email pattern compiles")
});

/// Everything worth knowing about a message, extracted in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMessage {
    pub verification_code: Option<String>,
    pub verification_links: Vec<String>,
    pub all_links: Vec<String>,
    pub email_addresses: Vec<String>,
    pub sender: String,
    pub subject: String,
    pub received_at: String,
    /// First 200 characters of the text body.
    pub text_preview: String,
}

/// Find a verification code in plain text.
///
/// Patterns are tried from most to least specific and the first capture of
/// the first pattern that matches wins:
/// a code right after a keyword ("verify", "code", "otp", "pin"),
/// "code is X", a bare 4-6 digit number, then any 6-character upper-case
/// alphanumeric token.
///
/// ```
/// use mailtm_client::extract::verification_code;
///
/// assert_eq!(
///     verification_code("Your code is 482913. It expires in 10 minutes.").as_deref(),
///     Some("482913")
/// );
/// assert_eq!(verification_code("Nothing to see here"), None);
/// ```
pub fn verification_code(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    CODE_PATTERNS.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Links that look like verification or confirmation URLs.
///
/// Matches URLs mentioning `verify`, `confirm`, `activate`, `validation` or
/// `auth`, plus any URL carrying a `token=`, `code=` or `key=` parameter.
pub fn verification_links(content: &str) -> Vec<String> {
    dedup(
        VERIFICATION_LINK_PATTERNS
            .iter()
            .flat_map(|re| re.find_iter(content).map(|m| m.as_str())),
    )
}

/// Every http(s) URL in the content.
pub fn all_links(content: &str) -> Vec<String> {
    dedup(LINK_PATTERN.find_iter(content).map(|m| m.as_str()))
}

/// Email addresses mentioned in the text.
pub fn email_addresses(text: &str) -> Vec<String> {
    dedup(EMAIL_PATTERN.find_iter(text).map(|m| m.as_str()))
}

/// Run every extractor over a fetched message.
pub fn parse(message: &MessageDetails) -> ParsedMessage {
    let combined = message.combined_content();
    ParsedMessage {
        verification_code: verification_code(&message.text),
        verification_links: verification_links(&combined),
        all_links: all_links(&combined),
        email_addresses: email_addresses(&message.text),
        sender: message.from.clone(),
        subject: message.subject.clone(),
        received_at: message.received_at.clone(),
        text_preview: truncate_chars(&message.text, TEXT_PREVIEW_CHARS).to_string(),
    }
}

fn dedup<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .filter(|s| seen.insert(*s))
        .map(str::to_string)
        .collect()
}
