//! # airwave
//!
//! Terminal client for an Airwave station: joins the live chat, shows the
//! listener count, who is in the room and the shared color, all over one
//! self-healing WebSocket session.

#![deny(unsafe_code)]

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use airwave_adapters::{ChatAdapter, ChatMessage, ColorSyncAdapter, ListenerCountAdapter, PresenceAdapter};
use airwave_core::logging::init_subscriber;
use airwave_session::{SessionConfig, SessionManager, WebSocketTransport};
use airwave_settings::{AirwaveSettings, IdentityStore, load_unvalidated_from_path, resolve_nickname, settings_path};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::{Command, HELP, parse_line};

/// Airwave terminal client.
#[derive(Parser, Debug)]
#[command(name = "airwave", about = "Airwave live chat client", version)]
struct Cli {
    /// WebSocket endpoint (overrides settings).
    #[arg(long)]
    url: Option<String>,

    /// Nickname for this run (overrides the identity store).
    #[arg(long)]
    nickname: Option<String>,

    /// Settings file (default `~/.airwave/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `airwave_session=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

/// Everything a command may touch.
struct Client {
    session: SessionManager,
    store: IdentityStore,
    chat: ChatAdapter,
    listeners: ListenerCountAdapter,
    presence: PresenceAdapter,
    color: ColorSyncAdapter,
}

impl Client {
    /// Run one input line. Returns `false` when the user asked to quit.
    fn handle(&self, line: &str) -> bool {
        match parse_line(line) {
            Command::Empty => {}
            Command::Chat(text) => {
                if let Err(e) = self.chat.send(&text) {
                    println!("! {e}");
                }
            }
            Command::Nick(nickname) => match self.chat.rename(&nickname) {
                Ok(()) => {
                    if let Err(e) = self.store.set_nickname(&nickname) {
                        warn!(error = %e, "failed to persist nickname");
                    }
                    println!("* you are now {}", nickname.trim());
                }
                Err(e) => println!("! {e}"),
            },
            Command::Color(color) => {
                if let Err(e) = self.color.set_color(&color) {
                    println!("! {e}");
                }
            }
            Command::Reconnect => {
                self.session.connect();
                println!("* reconnecting");
            }
            Command::Status => self.print_status(),
            Command::Help => println!("{HELP}"),
            Command::Quit => return false,
            Command::Invalid(msg) => println!("! {msg} (try /help)"),
        }
        true
    }

    fn print_status(&self) {
        println!("* status: {}", self.session.status());
        println!("* url: {}", self.session.url());
        println!(
            "* nickname: {}",
            self.session.identity().as_deref().unwrap_or("(none)")
        );
        let attempts = self.session.reconnect_attempts();
        if attempts > 0 {
            println!("* failed attempts: {attempts}/{}", self.session.policy().max_attempts());
        }
        if let Some(wait) = self.session.reconnect_pending() {
            println!("* next attempt in {} ms", wait.as_millis());
        }
        match self.listeners.current() {
            Some(n) => println!("* listeners: {n}"),
            None => println!("* listeners: unknown"),
        }
        println!("* in the room: {}", self.presence.users().join(", "));
        if let Some(update) = self.color.current() {
            println!("* color: {}", update.color);
        }
    }
}

fn format_chat(message: &ChatMessage) -> String {
    let time = message
        .timestamp
        .map(|ts| ts.with_timezone(&chrono::Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    format!("[{time}] <{}> {}", message.nickname, message.text)
}

fn spawn_chat_printer(mut rx: broadcast::Receiver<ChatMessage>, shutdown: CancellationToken) {
    drop(tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(message) => println!("{}", format_chat(&message)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "chat output fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }));
}

/// Print a line whenever a watched value changes and `render` has something
/// to say about it.
fn spawn_watch_printer<T, F>(mut rx: watch::Receiver<T>, shutdown: CancellationToken, render: F)
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> Option<String> + Send + 'static,
{
    drop(tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let line = render(&rx.borrow_and_update());
                    if let Some(line) = line {
                        println!("{line}");
                    }
                }
            }
        }
    }));
}

/// Settings file and env, then command-line flags, validated once at the end.
fn resolve_settings(args: Cli) -> Result<AirwaveSettings> {
    let path = args.settings.unwrap_or_else(settings_path);
    let mut settings = load_unvalidated_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    if let Some(url) = args.url {
        settings.session.url = url;
    }
    if let Some(nickname) = args.nickname {
        settings.identity.nickname = Some(nickname);
    }
    if let Some(level) = args.log_level {
        settings.logging.level = level;
    }
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = resolve_settings(Cli::parse())?;

    init_subscriber(&settings.logging.level, settings.logging.format);

    let store = IdentityStore::from_settings(&settings);
    let nickname = resolve_nickname(&settings, &store).context("Failed to read identity store")?;

    let session = SessionManager::new(
        SessionConfig::new(settings.session.url.clone()).with_reconnect(settings.session.reconnect.clone()),
        Arc::new(WebSocketTransport::new()),
    );
    session.set_identity(nickname.as_deref());
    info!(session_id = %session.id(), url = %settings.session.url, "starting airwave client");

    let client = Client {
        chat: ChatAdapter::new(&session),
        listeners: ListenerCountAdapter::new(&session),
        presence: PresenceAdapter::new(&session),
        color: ColorSyncAdapter::new(&session),
        session,
        store,
    };

    let shutdown = CancellationToken::new();
    spawn_chat_printer(client.chat.messages(), shutdown.clone());
    spawn_watch_printer(client.session.status_changes(), shutdown.clone(), |status| {
        Some(format!("* {status}"))
    });
    spawn_watch_printer(client.listeners.changes(), shutdown.clone(), |count| {
        count.map(|n| format!("* {n} listening"))
    });
    spawn_watch_printer(client.presence.changes(), shutdown.clone(), |users| {
        Some(format!("* in the room: {}", users.join(", ")))
    });
    spawn_watch_printer(client.color.changes(), shutdown.clone(), |update| {
        update.as_ref().map(|u| match &u.nickname {
            Some(who) => format!("* {who} set the color to {}", u.color),
            None => format!("* color is now {}", u.color),
        })
    });

    if client.session.identity().is_none() {
        println!("* pick a nickname with /nick <name> to chat");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("interrupt received, shutting down");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else { break };
                if !client.handle(&line) {
                    break;
                }
            }
        }
    }

    shutdown.cancel();
    client.session.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags() {
        let cli = Cli::try_parse_from([
            "airwave",
            "--url",
            "wss://radio.example/ws",
            "--nickname",
            "nik",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.url.as_deref(), Some("wss://radio.example/ws"));
        assert_eq!(cli.nickname.as_deref(), Some("nik"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.settings.is_none());
    }

    fn settings_file(content: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, content).unwrap();
        let path = path.to_string_lossy().into_owned();
        (dir, path)
    }

    #[test]
    fn url_flag_overrides_bad_file_url() {
        let (_dir, path) = settings_file(r#"{"session": {"url": "ftp://nope"}}"#);
        let cli = Cli::try_parse_from(["airwave", "--settings", &path, "--url", "wss://radio.example/ws"]).unwrap();
        let settings = resolve_settings(cli).unwrap();
        assert_eq!(settings.session.url, "wss://radio.example/ws");
    }

    #[test]
    fn bad_url_without_flag_is_rejected() {
        let (_dir, path) = settings_file(r#"{"session": {"url": "ftp://nope"}}"#);
        let cli = Cli::try_parse_from(["airwave", "--settings", &path]).unwrap();
        assert!(resolve_settings(cli).is_err());
    }

    #[test]
    fn bad_url_flag_is_rejected() {
        let (_dir, path) = settings_file("{}");
        let cli = Cli::try_parse_from(["airwave", "--settings", &path, "--url", "http://radio.example"]).unwrap();
        assert!(resolve_settings(cli).is_err());
    }

    #[test]
    fn chat_line_without_timestamp() {
        let message = ChatMessage {
            nickname: "dj".into(),
            text: "next up".into(),
            timestamp: None,
        };
        assert_eq!(format_chat(&message), "[--:--] <dj> next up");
    }
}
