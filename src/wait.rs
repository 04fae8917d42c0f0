//! Polling until a verification code, link, or new email shows up.

use crate::extract::{self, ParsedMessage};
use crate::{Error, Mailbox, MessageDetails, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

/// What a wait loop is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitKind {
    /// A verification code in the text body.
    Code,
    /// A verification link in the text or HTML body.
    Link,
    /// A code, or failing that a link.
    Any,
    /// Any message that arrives after the wait starts.
    Email,
}

impl FromStr for WaitKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "code" => Ok(WaitKind::Code),
            "link" => Ok(WaitKind::Link),
            "any" => Ok(WaitKind::Any),
            "email" => Ok(WaitKind::Email),
            other => Err(format!("unknown wait kind: {other}")),
        }
    }
}

impl fmt::Display for WaitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WaitKind::Code => "verification code",
            WaitKind::Link => "verification link",
            WaitKind::Any => "any verification",
            WaitKind::Email => "new email",
        };
        f.write_str(s)
    }
}

/// Timing of a wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up after this long.
    pub timeout: Duration,
    /// Pause between inbox polls.
    pub interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            interval: Duration::from_secs(2),
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// The result of a successful wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Verification {
    Code {
        code: String,
        message: MessageDetails,
        found_at: DateTime<Utc>,
    },
    Link {
        primary_link: String,
        links: Vec<String>,
        message: MessageDetails,
        found_at: DateTime<Utc>,
    },
    Email {
        message: MessageDetails,
        parsed: ParsedMessage,
        found_at: DateTime<Utc>,
    },
}

impl Verification {
    /// The code or primary link; `None` for a plain new email.
    pub fn value(&self) -> Option<&str> {
        match self {
            Verification::Code { code, .. } => Some(code.as_str()),
            Verification::Link { primary_link, .. } => Some(primary_link.as_str()),
            Verification::Email { .. } => None,
        }
    }

    /// The message the result was found in.
    pub fn message(&self) -> &MessageDetails {
        match self {
            Verification::Code { message, .. }
            | Verification::Link { message, .. }
            | Verification::Email { message, .. } => message,
        }
    }

    pub fn found_at(&self) -> DateTime<Utc> {
        match self {
            Verification::Code { found_at, .. }
            | Verification::Link { found_at, .. }
            | Verification::Email { found_at, .. } => *found_at,
        }
    }

    fn from_message(kind: WaitKind, message: MessageDetails) -> Option<Self> {
        let found_at = Utc::now();
        let code = || extract::verification_code(&message.text);
        let links = || extract::verification_links(&message.combined_content());

        match kind {
            WaitKind::Code => code().map(|code| Verification::Code {
                code,
                message: message.clone(),
                found_at,
            }),
            WaitKind::Link => Self::link(links(), &message, found_at),
            WaitKind::Any => match code() {
                Some(code) => Some(Verification::Code {
                    code,
                    message: message.clone(),
                    found_at,
                }),
                None => Self::link(links(), &message, found_at),
            },
            WaitKind::Email => Some(Verification::Email {
                parsed: extract::parse(&message),
                message,
                found_at,
            }),
        }
    }

    fn link(
        links: Vec<String>,
        message: &MessageDetails,
        found_at: DateTime<Utc>,
    ) -> Option<Self> {
        let primary_link = links.first()?.clone();
        Some(Verification::Link {
            primary_link,
            links,
            message: message.clone(),
            found_at,
        })
    }
}

impl Mailbox {
    /// Poll the inbox until something matching `kind` arrives.
    ///
    /// Returns `Ok(None)` once `options.timeout` has elapsed without a match.
    /// Transient request failures during a round are logged and the round is
    /// retried after the usual interval.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::{Client, WaitKind, WaitOptions};
    /// # use std::time::Duration;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let mailbox = Client::new()?.generate().await?;
    /// let options = WaitOptions::with_timeout(Duration::from_secs(120));
    /// if let Some(found) = mailbox.wait_for(WaitKind::Code, options).await? {
    ///     println!("code: {}", found.value().unwrap_or_default());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(
        skip(self, options),
        fields(address = %self.address(), timeout = ?options.timeout)
    )]
    pub async fn wait_for(
        &self,
        kind: WaitKind,
        options: WaitOptions,
    ) -> Result<Option<Verification>> {
        let start = Instant::now();
        let mut baseline = None;
        let mut inspected = HashSet::new();
        let mut round = 0u32;

        loop {
            round += 1;
            match self.poll_once(kind, &mut baseline, &mut inspected).await {
                Ok(Some(found)) => {
                    tracing::debug!(round, "wait satisfied");
                    return Ok(Some(found));
                }
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    tracing::warn!(round, error = %e, "poll failed, retrying");
                }
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= options.timeout {
                tracing::debug!(round, "wait timed out");
                return Ok(None);
            }
            tokio::time::sleep(options.interval.min(options.timeout - elapsed)).await;
        }
    }

    pub async fn wait_for_code(&self, timeout: Duration) -> Result<Option<Verification>> {
        self.wait_for(WaitKind::Code, WaitOptions::with_timeout(timeout))
            .await
    }

    pub async fn wait_for_link(&self, timeout: Duration) -> Result<Option<Verification>> {
        self.wait_for(WaitKind::Link, WaitOptions::with_timeout(timeout))
            .await
    }

    pub async fn wait_for_any(&self, timeout: Duration) -> Result<Option<Verification>> {
        self.wait_for(WaitKind::Any, WaitOptions::with_timeout(timeout))
            .await
    }

    pub async fn wait_for_new_email(&self, timeout: Duration) -> Result<Option<Verification>> {
        self.wait_for(WaitKind::Email, WaitOptions::with_timeout(timeout))
            .await
    }

    /// One inbox round. `inspected` remembers messages that held no match,
    /// since message bodies never change.
    ///
    /// For [`WaitKind::Email`], the first successful listing only sets
    /// `baseline`, the message count later rounds compare against.
    async fn poll_once(
        &self,
        kind: WaitKind,
        baseline: &mut Option<usize>,
        inspected: &mut HashSet<String>,
    ) -> Result<Option<Verification>> {
        let messages = self.messages().await?;

        if kind == WaitKind::Email {
            let Some(count) = *baseline else {
                tracing::debug!(count = messages.len(), "inbox baseline taken");
                *baseline = Some(messages.len());
                return Ok(None);
            };
            let Some(newest) = messages.first().filter(|_| messages.len() > count) else {
                return Ok(None);
            };
            return match self.message(&newest.id).await {
                Ok(details) => Ok(Verification::from_message(kind, details)),
                Err(Error::MessageNotFound(_)) => Ok(None),
                Err(e) => Err(e),
            };
        }

        for summary in messages {
            if inspected.contains(&summary.id) {
                continue;
            }
            let details = match self.message(&summary.id).await {
                Ok(details) => details,
                Err(Error::MessageNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            match Verification::from_message(kind, details) {
                Some(found) => return Ok(Some(found)),
                None => {
                    inspected.insert(summary.id);
                }
            }
        }
        Ok(None)
    }
}
