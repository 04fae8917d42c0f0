//! Authenticated mailbox session.

use crate::models::{self, Credentials, MessageDetails, MessageSummary};
use crate::{Client, Error, Result};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

/// A logged-in mail.tm account.
///
/// Obtained from [`Client::login`] or [`Client::generate`]. Holds the bearer
/// token used for inbox requests; cloning is cheap.
#[derive(Debug, Clone)]
pub struct Mailbox {
    client: Client,
    credentials: Credentials,
    token: String,
}

impl Mailbox {
    pub(crate) fn new(client: Client, credentials: Credentials, token: String) -> Self {
        Self {
            client,
            credentials,
            token,
        }
    }

    /// The full email address of this mailbox.
    pub fn address(&self) -> &str {
        &self.credentials.address
    }

    /// The account password, needed to log in again later.
    pub fn password(&self) -> &str {
        &self.credentials.password
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Bearer token issued at login.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// List messages in the inbox, newest first.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let mailbox = Client::new()?.generate().await?;
    /// for msg in mailbox.messages().await? {
    ///     println!("{}: {}", msg.from, msg.subject);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self), fields(address = %self.address()))]
    pub async fn messages(&self) -> Result<Vec<MessageSummary>> {
        let response: serde_json::Value = self
            .client
            .http()
            .get(self.client.url("/messages"))
            .headers(self.headers())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let messages: Vec<MessageSummary> = models::collection(response);
        tracing::debug!(count = messages.len(), "listed messages");
        Ok(messages)
    }

    /// Fetch the full content of a message.
    ///
    /// A `404` from the provider becomes [`Error::MessageNotFound`].
    #[tracing::instrument(skip(self), fields(address = %self.address()))]
    pub async fn message(&self, id: &str) -> Result<MessageDetails> {
        let response = self
            .client
            .http()
            .get(self.client.url(&format!("/messages/{id}")))
            .headers(self.headers())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::MessageNotFound(id.to_string()));
        }

        let value: serde_json::Value = response.error_for_status()?.json().await?;
        serde_json::from_value(value).map_err(Into::into)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = self.client.headers();
        headers.remove(CONTENT_TYPE);
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }
}
