//! Session history persisted as a JSON file.
//!
//! Every mailbox that was generated or logged into is remembered with its
//! password so it can be reopened later, along with the codes and links
//! received in it.

use crate::{Credentials, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name used when no explicit history path is given.
pub const DEFAULT_HISTORY_FILE: &str = "tempmail_history.json";

/// One remembered mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    #[serde(default)]
    pub codes_received: Vec<String>,
    #[serde(default)]
    pub links_received: Vec<String>,
}

impl SessionRecord {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.email, &self.password)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    sessions: Vec<SessionRecord>,
}

/// Handle on the history file.
///
/// The whole file is small: it is re-read before every change and rewritten
/// after it, so sessions written by another process are kept.
#[derive(Debug)]
pub struct History {
    path: PathBuf,
    file: HistoryFile,
}

impl History {
    /// Load history from `path`.
    ///
    /// A missing or unreadable file yields an empty history; it is created on
    /// the first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = read_file(&path);
        Self { path, file }
    }

    /// Re-read the file, replacing what this handle holds in memory.
    pub fn load(&mut self) {
        self.file = read_file(&self.path);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All sessions, oldest first.
    pub fn sessions(&self) -> &[SessionRecord] {
        &self.file.sessions
    }

    /// The last `n` sessions, oldest first.
    pub fn recent(&self, n: usize) -> &[SessionRecord] {
        let sessions = &self.file.sessions;
        &sessions[sessions.len().saturating_sub(n)..]
    }

    /// Most recently added session.
    pub fn latest(&self) -> Option<&SessionRecord> {
        self.file.sessions.last()
    }

    /// Most recently used session, by `last_used`.
    pub fn last_used(&self) -> Option<&SessionRecord> {
        self.file.sessions.iter().max_by_key(|s| s.last_used)
    }

    pub fn find(&self, email: &str) -> Option<&SessionRecord> {
        self.file.sessions.iter().find(|s| s.email == email)
    }

    /// Remember a mailbox, or mark an existing one as used now.
    pub fn record_session(&mut self, credentials: &Credentials) -> Result<()> {
        self.load();
        self.upsert(credentials);
        self.save()
    }

    /// Append received codes to a session, creating it when absent.
    pub fn record_codes(&mut self, credentials: &Credentials, codes: &[String]) -> Result<()> {
        self.load();
        self.upsert(credentials).codes_received.extend_from_slice(codes);
        self.save()
    }

    /// Append received links to a session, creating it when absent.
    pub fn record_links(&mut self, credentials: &Credentials, links: &[String]) -> Result<()> {
        self.load();
        self.upsert(credentials).links_received.extend_from_slice(links);
        self.save()
    }

    /// Write the history back to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.file)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn upsert(&mut self, credentials: &Credentials) -> &mut SessionRecord {
        let now = Utc::now();
        let sessions = &mut self.file.sessions;

        match sessions.iter().position(|s| s.email == credentials.address) {
            Some(idx) => {
                let session = &mut sessions[idx];
                session.last_used = now;
                session.password.clone_from(&credentials.password);
                session
            }
            None => {
                sessions.push(SessionRecord {
                    email: credentials.address.clone(),
                    password: credentials.password.clone(),
                    created_at: now,
                    last_used: now,
                    codes_received: Vec::new(),
                    links_received: Vec::new(),
                });
                let last = sessions.len() - 1;
                &mut sessions[last]
            }
        }
    }
}

fn read_file(path: &Path) -> HistoryFile {
    match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt history file");
            HistoryFile::default()
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HistoryFile::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read history file");
            HistoryFile::default()
        }
    }
}
