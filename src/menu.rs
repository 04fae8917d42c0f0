//! Interactive menu mode.

use crate::cli::App;
use mailtm_client::{Verification, WaitKind, WaitOptions, extract, history::SessionRecord};
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const RULE_WIDTH: usize = 60;
const HISTORY_SHOWN: usize = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const BODY_PREVIEW_CHARS: usize = 500;

/// Animated "waiting" line with elapsed seconds.
struct Spinner {
    handle: JoinHandle<()>,
}

impl Spinner {
    const FRAMES: [char; 10] = [
        '⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏',
    ];

    fn start(message: String) -> Self {
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            for frame in Self::FRAMES.iter().cycle() {
                ticker.tick().await;
                print!(
                    "\r{frame} {message}... [{}s elapsed]   ",
                    started.elapsed().as_secs()
                );
                let _ = io::stdout().flush();
            }
        });
        Self { handle }
    }

    fn stop(self) {
        self.handle.abort();
        print!("\r{}\r", " ".repeat(RULE_WIDTH));
        let _ = io::stdout().flush();
    }
}

/// Print `label` and read one line; `None` on end of input.
async fn prompt(label: &str) -> io::Result<Option<String>> {
    print!("{label}");
    io::stdout().flush()?;
    // Reading stdin blocks, so keep it off the runtime's worker threads.
    tokio::task::spawn_blocking(|| read_answer(io::stdin().lock()))
        .await
        .map_err(io::Error::other)?
}

fn read_answer(mut input: impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

async fn pause() -> io::Result<()> {
    prompt("\nPress Enter to continue...").await.map(|_| ())
}

fn print_header(email: Option<&str>) {
    println!("\n{}", "═".repeat(RULE_WIDTH));
    println!("            📧 TEMPMAIL INTERACTIVE v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "═".repeat(RULE_WIDTH));
    if let Some(email) = email {
        println!("\n📬 Current Email: {email}");
    }
    println!();
}

fn print_menu() {
    println!("{}", "─".repeat(RULE_WIDTH));
    println!("                    MAIN MENU");
    println!("{}", "─".repeat(RULE_WIDTH));
    println!("  [1] 🔄 Generate New Email");
    println!("  [2] 📂 Load Previous Email (from history)");
    println!("  [3] ⏳ Wait for Verification Code");
    println!("  [4] 🔗 Wait for Verification Link");
    println!("  [5] 🎯 Wait for Any Verification");
    println!("  [6] 📬 Wait for Any New Email");
    println!("  [7] 📋 Check All Messages");
    println!("  [8] 📖 Read Specific Message");
    println!("  [9] 📊 Service Status");
    println!("  [0] ❌ Exit");
    println!("{}", "─".repeat(RULE_WIDTH));
}

/// Parse a timeout answer; blank or invalid input means the default.
fn parse_timeout(input: &str) -> u64 {
    input.trim().parse().unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Parse a 1-based menu pick against `len` entries.
fn parse_choice(input: &str, len: usize) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Some(n - 1),
        _ => None,
    }
}

fn session_label(session: &SessionRecord) -> String {
    format!(
        "{}\n      Created: {}",
        session.email,
        session.created_at.format("%Y-%m-%d %H:%M")
    )
}

pub async fn run(mut app: App) -> anyhow::Result<()> {
    print_header(None);
    println!("🔄 Generating temporary email...");
    let generated = app.generate().await.map(|m| m.address().to_string());
    match generated {
        Ok(email) => {
            println!("✅ Email generated: {email}");
            app.copy("Email", &email);
        }
        Err(e) => println!("❌ Failed to generate email: {e:#}"),
    }
    if prompt("\nPress Enter to continue to menu...").await?.is_none() {
        return Ok(());
    }

    loop {
        print_header(app.mailbox.as_ref().map(|m| m.address()));
        print_menu();

        let Some(choice) = prompt("\nEnter choice [0-9]: ").await? else {
            break;
        };

        let outcome = match choice.as_str() {
            "0" => break,
            "1" => generate(&mut app).await,
            "2" => load_from_history(&mut app).await,
            "3" => wait(&mut app, WaitKind::Code).await,
            "4" => wait(&mut app, WaitKind::Link).await,
            "5" => wait(&mut app, WaitKind::Any).await,
            "6" => wait(&mut app, WaitKind::Email).await,
            "7" => list_messages(&mut app).await,
            "8" => read_message(&mut app).await,
            "9" => {
                show_status(&app);
                Ok(())
            }
            _ => continue,
        };

        if let Err(e) = outcome {
            println!("\n❌ Error: {e:#}");
        }
        pause().await?;
    }

    println!("\n👋 Goodbye!");
    Ok(())
}

async fn generate(app: &mut App) -> anyhow::Result<()> {
    println!("\n🔄 Generating new email...");
    let email = app.generate().await?.address().to_string();
    println!("✅ New email: {email}");
    app.copy("Email", &email);
    Ok(())
}

async fn load_from_history(app: &mut App) -> anyhow::Result<()> {
    let sessions: Vec<SessionRecord> = app.history.recent(HISTORY_SHOWN).to_vec();
    if sessions.is_empty() {
        println!("\n📭 No saved emails in history.");
        return Ok(());
    }

    println!("\n{}", "─".repeat(RULE_WIDTH));
    println!("              📂 SAVED EMAILS (History)");
    println!("{}", "─".repeat(RULE_WIDTH));
    for (i, session) in sessions.iter().enumerate() {
        println!("  [{}] {}", i + 1, session_label(session));
    }
    println!("  [0] ← Back to Main Menu");
    println!("{}", "─".repeat(RULE_WIDTH));

    let answer = prompt(&format!("\nSelect email to load [0-{}]: ", sessions.len())).await?;
    let Some(idx) = answer.and_then(|a| parse_choice(&a, sessions.len())) else {
        return Ok(());
    };

    let selected = &sessions[idx];
    println!("\n🔄 Logging in to {}...", selected.email);
    app.login(selected.credentials()).await?;
    println!("✅ Logged in successfully!");
    app.copy("Email", &selected.email);
    Ok(())
}

async fn wait(app: &mut App, kind: WaitKind) -> anyhow::Result<()> {
    app.mailbox().await?;
    let answer = prompt(&format!("⏱️  Timeout in seconds [{DEFAULT_TIMEOUT_SECS}]: ")).await?;
    let timeout = parse_timeout(answer.as_deref().unwrap_or_default());
    println!("\n⏳ Waiting for {kind} (max {timeout}s)...\n");

    let spinner = Spinner::start(format!("Waiting for {kind}"));
    let found = app
        .wait(kind, WaitOptions::with_timeout(Duration::from_secs(timeout)))
        .await;
    spinner.stop();

    match found? {
        Some(Verification::Code { code, .. }) => {
            println!("\n✅ Code received: {code}");
            app.copy("Code", &code);
        }
        Some(Verification::Link { primary_link, .. }) => {
            println!("\n✅ Link received: {primary_link}");
            app.copy("Link", &primary_link);
        }
        Some(Verification::Email { message, .. }) => {
            println!("\n✅ New email received!");
            println!("   From: {}", message.from);
            let subject = if message.subject.is_empty() {
                "No subject"
            } else {
                &message.subject
            };
            println!("   Subject: {subject}");
        }
        None => println!("\n❌ No {kind} received within timeout"),
    }
    Ok(())
}

async fn list_messages(app: &mut App) -> anyhow::Result<()> {
    let mailbox = app.mailbox().await?;
    let messages = mailbox.messages().await?;
    println!("\n📋 Messages for {}:", mailbox.address());
    println!("{}", "─".repeat(50));
    if messages.is_empty() {
        println!("📭 No messages found");
    }
    for (i, msg) in messages.iter().enumerate() {
        println!("\n[{}] From: {}", i + 1, msg.from);
        println!("    Subject: {}", msg.subject);
        println!("    ID: {}", msg.id);
    }
    Ok(())
}

async fn read_message(app: &mut App) -> anyhow::Result<()> {
    let mailbox = app.mailbox().await?.clone();
    let messages = mailbox.messages().await?;
    if messages.is_empty() {
        println!("📭 No messages to read");
        return Ok(());
    }

    println!("\nAvailable messages:");
    for (i, msg) in messages.iter().enumerate() {
        let subject: String = msg.subject.chars().take(40).collect();
        let subject = if subject.is_empty() { "No subject".to_string() } else { subject };
        println!("  [{}] {subject}", i + 1);
    }

    let answer = prompt("\nSelect message number: ").await?;
    let Some(idx) = answer.and_then(|a| parse_choice(&a, messages.len())) else {
        return Ok(());
    };

    let content = mailbox.message(&messages[idx].id).await?;
    println!("\n{}", "─".repeat(50));
    println!("From: {}", content.from);
    println!("Subject: {}", content.subject);
    println!("{}", "─".repeat(50));
    println!("{}", content.text.chars().take(BODY_PREVIEW_CHARS).collect::<String>());

    let parsed = extract::parse(&content);
    if let Some(code) = &parsed.verification_code {
        println!("\n🔑 Verification Code: {code}");
        app.copy("Code", code);
    }
    if !parsed.verification_links.is_empty() {
        println!("\n🔗 Verification Links:");
        for link in &parsed.verification_links {
            println!("   {link}");
        }
    }
    Ok(())
}

fn show_status(app: &App) {
    let status = app.status();
    println!("\n📊 Service Status");
    println!("{}", "─".repeat(40));
    println!(
        "Current Email: {}",
        status.current_email.as_deref().unwrap_or("None")
    );
    println!(
        "Authenticated: {}",
        if status.authenticated { "Yes" } else { "No" }
    );
    println!(
        "Timestamp: {}",
        status.timestamp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
    );
    println!("Saved Emails: {}", app.history.sessions().len());
}
