//! # mail.tm Client
//! Asynchronous wrapper around the mail.tm disposable email REST API: create throwaway accounts with [`Client`], read their inbox through a [`Mailbox`], and pull verification codes and links out of incoming messages.
//!
//! ## Audience and uses
//! For Rust developers and scripts that need to sign up somewhere and receive the confirmation mail: generate an address, hand it to the service under test, then [`Mailbox::wait_for`] a code or link. The [`extract`] module works on any text, so it is usable without the network.
//!
//! ## Runtime requirements
//! Async-only; run inside a Tokio (v1) runtime. HTTP calls use `reqwest`.
//!
//! ## Out of scope
//! Not a general-purpose mail client or SMTP sender. Mailboxes live only as long as mail.tm keeps them, and the extraction patterns are heuristics.
//!
//! ## Errors
//! Transport failures and non-2xx statuses surface as [`Error::Request`]; shape problems become [`Error::ResponseParse`] or [`Error::Json`]. [`Error::is_transient`] tells the wait loop which failures to ride out. The crate-wide [`Result`] alias wraps these errors.
//!
//! ## Example
//! ```no_run
//! use mailtm_client::{Client, WaitKind, WaitOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mailtm_client::Error> {
//!     let client = Client::new()?;
//!     let mailbox = client.generate().await?;
//!     println!("Created: {}", mailbox.address());
//!
//!     for msg in mailbox.messages().await? {
//!         println!("From: {}, Subject: {}", msg.from, msg.subject);
//!     }
//!
//!     if let Some(found) = mailbox.wait_for(WaitKind::Any, WaitOptions::default()).await? {
//!         println!("Got: {:?}", found.value());
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod mailbox;
mod models;
mod wait;

pub mod clipboard;
pub mod extract;
pub mod history;
pub mod server;

pub use client::{Client, ClientBuilder};
pub use error::Error;
pub use extract::ParsedMessage;
pub use history::{History, SessionRecord};
pub use mailbox::Mailbox;
pub use models::{Credentials, Domain, MessageDetails, MessageSummary, Status};
pub use wait::{Verification, WaitKind, WaitOptions};

/// Result type alias for mail.tm operations.
///
/// This is equivalent to `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
