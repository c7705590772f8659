//! # Storefront Realtime Console
//!
//! Console client for the storefront real-time endpoint.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - The client event loop for the configured principal
//!
//! Lines read from stdin:
//!
//! ```text
//! /join <room>            /leave <room>
//! /say <room> <text>      /type <room>
//! /notifications          /read-all
//! /status                 /reconnect
//! /quit
//! ```

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::info;

use storefront_realtime::config::Settings;
use storefront_realtime::domain::{Credential, Principal, RoomId, UserId};
use storefront_realtime::startup::{Application, ClientHandle};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    storefront_realtime::telemetry::init_tracing();

    info!("Starting storefront realtime client...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        url = %settings.transport.url,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let Some(credential) = settings.principal.token.clone().and_then(Credential::new) else {
        bail!("no credential configured; set REALTIME_TOKEN or principal.token");
    };
    let user_id = settings
        .principal
        .user_id
        .clone()
        .unwrap_or_else(|| "console".to_string());
    let display_name = settings
        .principal
        .display_name
        .clone()
        .unwrap_or_else(|| user_id.clone());
    let principal = Principal::new(UserId::new(user_id), display_name, credential);

    let (_principal_tx, principal_rx) = watch::channel(Some(principal));
    let application = Application::build(&settings, principal_rx)?;
    let handle = application.handle();
    let mut client = tokio::spawn(application.run_until_stopped());

    for room in &settings.principal.rooms {
        let outcome = handle.join(RoomId::new(room.as_str())).await?;
        info!(room_id = %room, outcome = ?outcome, "Room requested");
    }

    let mut domain_events = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = domain_events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => info!(event = %line, "Domain event"),
                Err(e) => tracing::warn!(error = %e, "Unprintable domain event"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("reading stdin")? {
                Some(line) => {
                    if !run_line(&handle, line.trim()).await? {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            result = &mut client => {
                result??;
                return Ok(());
            }
        }
    }

    handle.shutdown()?;
    client.await??;
    Ok(())
}

/// Execute one console line. Returns false on `/quit`.
async fn run_line(handle: &ClientHandle, line: &str) -> Result<bool> {
    let mut parts = line.splitn(3, ' ');
    let command = parts.next().unwrap_or_default();
    let room = parts.next().map(RoomId::new);
    let rest = parts.next().unwrap_or_default();

    match (command, room) {
        ("", _) => {}
        ("/quit", _) => return Ok(false),
        ("/join", Some(room)) => println!("{:?}", handle.join(room).await?),
        ("/leave", Some(room)) => println!("{:?}", handle.leave(room).await?),
        ("/say", Some(room)) => println!("{:?}", handle.send_message(room, rest).await?),
        ("/type", Some(room)) => handle.keystroke(room)?,
        ("/notifications", _) => {
            for record in handle.notifications().await? {
                let marker = if record.is_read() { ' ' } else { '*' };
                println!("{} [{}] {}: {}", marker, record.kind, record.title, record.message);
            }
        }
        ("/read-all", _) => handle.mark_all_read()?,
        ("/reconnect", _) => handle.reconnect()?,
        ("/status", _) => println!("{}", serde_json::to_string(&handle.status())?),
        _ => println!("unrecognized command: {}", line),
    }
    Ok(true)
}
