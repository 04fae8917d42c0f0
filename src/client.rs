//! mail.tm async client implementation.

use crate::models::{self, Credentials, Domain};
use crate::{Error, Mailbox, Result};
use rand::Rng;
use rand::seq::IndexedRandom;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;

/// Async client for the mail.tm temporary email service.
///
/// The client itself is unauthenticated: it lists domains, registers
/// accounts and logs in. Logging in yields a [`Mailbox`] that carries the
/// bearer token for inbox calls.
///
/// Use [`Client::new`] for defaults or [`Client::builder`] for custom settings
/// like proxies, timeouts, and a custom API endpoint.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    proxy: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

impl Client {
    /// Create a builder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a new mail.tm client with default settings.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// Get the proxy URL if one was configured.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// API root this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List domains accounts can be registered under.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// for domain in client.domains().await? {
    ///     println!("{}", domain.domain);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self))]
    pub async fn domains(&self) -> Result<Vec<Domain>> {
        let response: serde_json::Value = self
            .http
            .get(self.url("/domains"))
            .headers(self.headers())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let domains: Vec<Domain> = models::collection(response);
        tracing::debug!(count = domains.len(), "fetched domains");
        Ok(domains)
    }

    /// Register a new account.
    ///
    /// The provider answers `201 Created` on success; any other status is
    /// reported as [`Error::AccountCreation`].
    #[tracing::instrument(skip(self, credentials), fields(address = %credentials.address))]
    pub async fn create_account(&self, credentials: &Credentials) -> Result<()> {
        let response = self
            .http
            .post(self.url("/accounts"))
            .headers(self.headers())
            .json(credentials)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => Ok(()),
            status => {
                tracing::warn!(%status, "account creation rejected");
                Err(Error::AccountCreation(status))
            }
        }
    }

    /// Log in with existing credentials and open the mailbox.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::{Client, Credentials};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// let mailbox = client
    ///     .login(Credentials::new("someone@example.com", "secret"))
    ///     .await?;
    /// println!("{}", mailbox.address());
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self, credentials), fields(address = %credentials.address))]
    pub async fn login(&self, credentials: Credentials) -> Result<Mailbox> {
        let response: TokenResponse = self
            .http
            .post(self.url("/token"))
            .headers(self.headers())
            .json(&credentials)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or(Error::ResponseParse("token missing from /token response"))?;

        tracing::debug!("authenticated");
        Ok(Mailbox::new(self.clone(), credentials, token))
    }

    /// Create a random account on a random active domain and log in.
    ///
    /// Usernames are 10 lowercase alphanumerics, passwords 16 mixed-case
    /// alphanumerics.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// let mailbox = client.generate().await?;
    /// println!("{} / {}", mailbox.address(), mailbox.password());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn generate(&self) -> Result<Mailbox> {
        let domains = self.domains().await?;
        let credentials = Self::random_credentials(&domains)?;
        self.create_account(&credentials).await?;
        self.login(credentials).await
    }

    /// Pick a domain and invent a username and password for it.
    fn random_credentials(domains: &[Domain]) -> Result<Credentials> {
        let active: Vec<&Domain> = domains.iter().filter(|d| d.is_active).collect();
        let mut rng = rand::rng();
        let domain = active.choose(&mut rng).ok_or(Error::NoDomains)?;

        let username = random_string(&mut rng, USERNAME_CHARSET, 10);
        let password = random_string(&mut rng, PASSWORD_CHARSET, 16);

        Ok(Credentials::new(
            format!("{username}@{}", domain.domain),
            password,
        ))
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build headers for API requests.
    pub(crate) fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

const USERNAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn random_string(rng: &mut impl Rng, charset: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| charset[rng.random_range(0..charset.len())] as char)
        .collect()
}

const BASE_URL: &str = "https://api.mail.tm";
const USER_AGENT_VALUE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Builder for configuring a mail.tm client.
///
/// Start with [`Client::builder`] to override defaults.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    proxy: Option<String>,
    danger_accept_invalid_certs: bool,
    user_agent: String,
    base_url: String,
    timeout: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    ///
    /// Defaults:
    /// - No proxy
    /// - `danger_accept_invalid_certs = false`
    /// - Browser-like user agent
    /// - `https://api.mail.tm` as the API root
    /// - 15 second request timeout
    pub fn new() -> Self {
        Self {
            proxy: None,
            danger_accept_invalid_certs: false,
            user_agent: USER_AGENT_VALUE.to_string(),
            base_url: BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a proxy URL (e.g., "socks5://127.0.0.1:9050").
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Control whether to accept invalid TLS certificates (default: false).
    pub fn danger_accept_invalid_certs(mut self, value: bool) -> Self {
        self.danger_accept_invalid_certs = value;
        self
    }

    /// Override the default user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override the API root.
    ///
    /// Useful for testing or for mail.tm-compatible providers.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Per-request timeout (default: 15 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client.
    ///
    /// No network traffic happens here; mail.tm needs no bootstrap request.
    pub fn build(self) -> Result<Client> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .user_agent(self.user_agent)
            .timeout(self.timeout);

        if let Some(proxy_url) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Client {
            http: builder.build()?,
            base_url: self.base_url,
            proxy: self.proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> Client {
        Client::builder().base_url(server.base_url()).build().unwrap()
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let client = Client::builder()
            .base_url("http://localhost:9999/")
            .build()
            .unwrap();
        assert_eq!(client.url("/domains"), "http://localhost:9999/domains");
        assert!(client.proxy().is_none());
    }

    #[test]
    fn random_credentials_use_active_domains_only() {
        let domains = vec![
            Domain {
                id: "1".into(),
                domain: "dead.io".into(),
                is_active: false,
            },
            Domain {
                id: "2".into(),
                domain: "live.io".into(),
                is_active: true,
            },
        ];
        let creds = Client::random_credentials(&domains).unwrap();
        let (user, domain) = creds.address.split_once('@').unwrap();

        assert_eq!(domain, "live.io");
        assert_eq!(user.len(), 10);
        assert!(user.bytes().all(|b| USERNAME_CHARSET.contains(&b)));
        assert_eq!(creds.password.len(), 16);
        assert!(creds.password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn random_credentials_without_domains_fails() {
        assert!(matches!(
            Client::random_credentials(&[]),
            Err(Error::NoDomains)
        ));
    }

    #[tokio::test]
    async fn domains_reads_hydra_collection() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/domains");
                then.status(200).json_body(json!({
                    "hydra:member": [
                        {"id": "d1", "domain": "mail.example", "isActive": true}
                    ],
                    "hydra:totalItems": 1
                }));
            })
            .await;

        let domains = client_for(&server).domains().await.unwrap();
        mock.assert_async().await;
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].domain, "mail.example");
    }

    #[tokio::test]
    async fn generate_registers_and_logs_in() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/domains");
                then.status(200)
                    .json_body(json!([{"id": "d1", "domain": "mail.example"}]));
            })
            .await;
        let accounts = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/accounts")
                    .header("content-type", "application/json");
                then.status(201).json_body(json!({"id": "acc"}));
            })
            .await;
        let token = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(json!({"id": "acc", "token": "jwt"}));
            })
            .await;

        let mailbox = client_for(&server).generate().await.unwrap();

        accounts.assert_async().await;
        token.assert_async().await;
        assert!(mailbox.address().ends_with("@mail.example"));
        assert_eq!(mailbox.token(), "jwt");
    }

    #[tokio::test]
    async fn create_account_rejection_surfaces_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/accounts");
                then.status(422).json_body(json!({"detail": "taken"}));
            })
            .await;

        let err = client_for(&server)
            .create_account(&Credentials::new("a@b.c", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountCreation(s) if s.as_u16() == 422));
    }

    #[tokio::test]
    async fn login_without_token_is_parse_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(json!({"id": "acc"}));
            })
            .await;

        let err = client_for(&server)
            .login(Credentials::new("a@b.c", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResponseParse(_)));
    }

    #[tokio::test]
    async fn login_bad_credentials_is_request_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(401).json_body(json!({"message": "Invalid credentials."}));
            })
            .await;

        let err = client_for(&server)
            .login(Credentials::new("a@b.c", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Request(_)));
        assert!(!err.is_transient());
    }
}
