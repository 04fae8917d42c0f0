//! Command-line interface.

use anyhow::{Context, anyhow};
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use mailtm_client::history::DEFAULT_HISTORY_FILE;
use mailtm_client::server::{self, AppState};
use mailtm_client::{
    Client, Credentials, History, Mailbox, Status, Verification, WaitKind, WaitOptions, clipboard,
    extract,
};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Disposable mail.tm inboxes from the command line.
#[derive(Parser, Debug)]
#[command(name = "tempmail", version)]
pub struct Args {
    /// mail.tm API root
    #[arg(long, env = "TEMPMAIL_BASE_URL", default_value = "https://api.mail.tm", global = true)]
    pub base_url: String,

    /// Session history file
    #[arg(long, env = "TEMPMAIL_HISTORY", default_value = DEFAULT_HISTORY_FILE, global = true)]
    pub history: PathBuf,

    /// Proxy URL for provider requests (e.g. "socks5://127.0.0.1:9050")
    #[arg(long, env = "TEMPMAIL_PROXY", global = true)]
    pub proxy: Option<String>,

    /// Don't copy addresses, codes or links to the clipboard
    #[arg(long, global = true)]
    pub no_clipboard: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new random mailbox
    Generate,
    /// Log in to an existing mailbox
    Login { email: String, password: String },
    /// List domains accounts can be created under
    Domains,
    /// List messages in the current mailbox
    Messages,
    /// Show one message with everything extracted from it
    Message { id: String },
    /// Wait for a verification code
    WaitCode(WaitArgs),
    /// Wait for a verification link
    WaitLink(WaitArgs),
    /// Wait for a code or a link
    WaitAny(WaitArgs),
    /// Wait for any new email
    WaitEmail(WaitArgs),
    /// Show the current session
    Status,
    /// List saved sessions
    History,
    /// Menu-driven mode (default)
    Interactive,
    /// Run the JSON HTTP wrapper
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
}

#[derive(ClapArgs, Debug)]
pub struct WaitArgs {
    /// Seconds to wait before giving up
    #[arg(default_value_t = 60)]
    pub timeout: u64,
}

/// State shared by the one-shot commands and the interactive menu.
pub struct App {
    pub client: Client,
    pub history: History,
    pub clipboard: bool,
    pub mailbox: Option<Mailbox>,
}

impl App {
    pub fn new(args: &Args) -> anyhow::Result<Self> {
        let mut builder = Client::builder().base_url(&args.base_url);
        if let Some(proxy) = &args.proxy {
            builder = builder.proxy(proxy);
        }
        Ok(Self {
            client: builder.build().context("building HTTP client")?,
            history: History::open(&args.history),
            clipboard: !args.no_clipboard,
            mailbox: None,
        })
    }

    /// Copy to the clipboard if enabled, announcing success.
    pub fn copy(&self, what: &str, text: &str) {
        if self.clipboard && clipboard::copy(text) {
            println!("📋 {what} copied to clipboard!");
        }
    }

    pub async fn generate(&mut self) -> anyhow::Result<&Mailbox> {
        let mailbox = self.client.generate().await.context("generating email")?;
        self.activate(mailbox)
    }

    pub async fn login(&mut self, credentials: Credentials) -> anyhow::Result<&Mailbox> {
        let mailbox = self
            .client
            .login(credentials)
            .await
            .context("login failed, the account may have expired")?;
        self.activate(mailbox)
    }

    /// The active mailbox, logging back into the last used session if needed.
    pub async fn mailbox(&mut self) -> anyhow::Result<&Mailbox> {
        if self.mailbox.is_none() {
            let credentials = self
                .history
                .last_used()
                .map(|s| s.credentials())
                .ok_or_else(|| anyhow!("No active email. Generate an email first."))?;
            tracing::debug!(address = %credentials.address, "resuming session from history");
            self.login(credentials).await?;
        }
        self.mailbox
            .as_ref()
            .ok_or_else(|| anyhow!("No active email. Generate an email first."))
    }

    /// Wait, then record what was found in the history.
    pub async fn wait(
        &mut self,
        kind: WaitKind,
        options: WaitOptions,
    ) -> anyhow::Result<Option<Verification>> {
        let mailbox = self.mailbox().await?.clone();
        let found = mailbox.wait_for(kind, options).await?;

        match &found {
            Some(Verification::Code { code, .. }) => self
                .history
                .record_codes(mailbox.credentials(), std::slice::from_ref(code))?,
            Some(Verification::Link { primary_link, .. }) => self
                .history
                .record_links(mailbox.credentials(), std::slice::from_ref(primary_link))?,
            _ => {}
        }
        Ok(found)
    }

    pub fn status(&self) -> Status {
        Status::new(self.mailbox.as_ref().map(Mailbox::address))
    }

    fn activate(&mut self, mailbox: Mailbox) -> anyhow::Result<&Mailbox> {
        if let Err(e) = self.history.record_session(mailbox.credentials()) {
            println!("⚠️  Could not save history: {e}");
        }
        Ok(self.mailbox.insert(mailbox))
    }
}

pub fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!(error = %e, "could not render json"),
    }
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let mut app = App::new(&args)?;

    match args.command.unwrap_or(Command::Interactive) {
        Command::Generate => {
            println!("🔄 Generating new email...");
            let mailbox = app.generate().await?;
            let (email, password) = (mailbox.address().to_string(), mailbox.password().to_string());
            println!("✅ Email: {email}");
            println!("🔑 Password: {password}");
            app.copy("Email", &email);
        }
        Command::Login { email, password } => {
            let mailbox = app.login(Credentials::new(email, password)).await?;
            println!("✅ Logged in as {}", mailbox.address());
        }
        Command::Domains => {
            println!("🌐 Available domains:");
            let domains = app.client.domains().await?;
            for domain in &domains {
                println!("  • {}", domain.domain);
            }
            println!("\nTotal: {} domains available", domains.len());
        }
        Command::Messages => {
            let mailbox = app.mailbox().await?;
            let messages = mailbox.messages().await?;
            println!(
                "📬 Found {} messages for {}",
                messages.len(),
                mailbox.address()
            );
            if messages.is_empty() {
                println!("📭 No messages found");
            } else {
                print_json(&messages);
            }
        }
        Command::Message { id } => {
            let mailbox = app.mailbox().await?;
            println!("📖 Getting message {id}...");
            let content = mailbox.message(&id).await?;
            println!("📄 Parsed Content:");
            print_json(&extract::parse(&content));
            println!("\n📄 Raw Content:");
            print_json(&content);
        }
        Command::WaitCode(w) => wait_command(&mut app, WaitKind::Code, w.timeout).await?,
        Command::WaitLink(w) => wait_command(&mut app, WaitKind::Link, w.timeout).await?,
        Command::WaitAny(w) => wait_command(&mut app, WaitKind::Any, w.timeout).await?,
        Command::WaitEmail(w) => wait_command(&mut app, WaitKind::Email, w.timeout).await?,
        Command::Status => {
            println!("📊 Service Status:");
            print_json(&app.status());
            println!("Saved Emails: {}", app.history.sessions().len());
        }
        Command::History => {
            let sessions = app.history.sessions();
            if sessions.is_empty() {
                println!("📭 No saved emails in history.");
            }
            for session in sessions {
                println!("{}", session.email);
                println!("    Created: {}", session.created_at.format("%Y-%m-%d %H:%M"));
                if !session.codes_received.is_empty() {
                    println!("    Codes: {}", session.codes_received.join(", "));
                }
                if !session.links_received.is_empty() {
                    println!("    Links: {}", session.links_received.join(", "));
                }
            }
        }
        Command::Interactive => crate::menu::run(app).await?,
        Command::Serve { host, port } => {
            let addr = SocketAddr::new(host, port);
            println!("📧 TempMail API listening on http://{addr}");
            server::serve(AppState::new(app.client, app.history), addr).await?;
        }
    }
    Ok(())
}

async fn wait_command(app: &mut App, kind: WaitKind, timeout: u64) -> anyhow::Result<()> {
    println!("⏳ Waiting for {kind} (timeout: {timeout}s)...");
    let options = WaitOptions::with_timeout(Duration::from_secs(timeout));

    let Some(found) = app.wait(kind, options).await? else {
        println!("❌ No {kind} received within timeout");
        return Ok(());
    };

    match &found {
        Verification::Code { code, .. } => {
            println!("✅ Verification code received!");
            println!("🔑 Code: {code}");
            app.copy("Code", code);
        }
        Verification::Link {
            primary_link, links, ..
        } => {
            println!("✅ Verification link received!");
            println!("🔗 Primary Link: {primary_link}");
            println!("🔗 All Links: {}", links.join(", "));
            app.copy("Link", primary_link);
        }
        Verification::Email { parsed, .. } => {
            println!("✅ New email received!");
            println!("📧 From: {}", parsed.sender);
            println!("📝 Subject: {}", parsed.subject);
            if let Some(code) = &parsed.verification_code {
                println!("🔑 Verification Code: {code}");
            }
            if !parsed.verification_links.is_empty() {
                println!(
                    "🔗 Verification Links: {}",
                    parsed.verification_links.join(", ")
                );
            }
        }
    }
    print_json(&found);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wait_with_default_timeout() {
        let args = Args::try_parse_from(["tempmail", "wait-code"]).unwrap();
        match args.command {
            Some(Command::WaitCode(w)) => assert_eq!(w.timeout, 60),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "tempmail",
            "wait-link",
            "120",
            "--no-clipboard",
            "--history",
            "/tmp/h.json",
            "-vv",
        ])
        .unwrap();
        assert!(args.no_clipboard);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.history, PathBuf::from("/tmp/h.json"));
        assert!(matches!(args.command, Some(Command::WaitLink(WaitArgs { timeout: 120 }))));
    }

    #[test]
    fn serve_defaults() {
        let args = Args::try_parse_from(["tempmail", "serve"]).unwrap();
        match args.command {
            Some(Command::Serve { host, port }) => {
                assert_eq!(port, 3001);
                assert!(host.is_loopback());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_means_interactive() {
        let args = Args::try_parse_from(["tempmail"]).unwrap();
        assert!(args.command.is_none());
    }

    #[tokio::test]
    async fn mailbox_without_history_errors() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::try_parse_from([
            "tempmail",
            "messages",
            "--history",
            dir.path().join("h.json").to_str().unwrap(),
            "--base-url",
            "http://127.0.0.1:9",
        ])
        .unwrap();
        let mut app = App::new(&args).unwrap();
        let err = app.mailbox().await.unwrap_err();
        assert!(err.to_string().contains("No active email"));
    }
}
