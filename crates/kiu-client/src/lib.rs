pub mod api;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;
pub mod socket;
pub mod state;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use kiu_sync::{Collaborators, SubscriptionRegistry};

use crate::api::HttpApi;
use crate::commands::channels;
use crate::config::ClientConfig;
use crate::console::ConsoleCommand;
use crate::error::ClientError;
use crate::socket::{Backoff, WsTransport};
use crate::state::{AppState, SharedState};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            EnvFilter::new("kiu_client=info,kiu_client_lib=debug,kiu_sync=debug,warn")
        });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Subscribe to every configured channel and serve the console until Ctrl+C,
/// `quit`, or end of input.
pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    if config.channels.is_empty() {
        return Err(ClientError::NoChannels.into());
    }

    let api = Arc::new(HttpApi::new(&config.api_base, config.device_id.clone())?);
    let transport = Arc::new(WsTransport::new(
        &config.socket_base,
        config.device_id.clone(),
        Backoff {
            initial: config.reconnect_initial,
            max: config.reconnect_max,
        },
    )?);
    let collaborators = Collaborators::new(api.clone(), transport, api);

    let mut registry = SubscriptionRegistry::new(collaborators, config.sync.clone());
    let opened = registry
        .start(config.channels.clone())
        .context("Failed to start channel subscriptions")?;
    info!(channels = opened.len(), "Subscriptions started");

    let state: SharedState = Arc::new(Mutex::new(AppState::new(registry)));

    let mut ticker = tokio::time::interval(config.summary_interval);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
            _ = ticker.tick() => log_summaries(&state).await,
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match ConsoleCommand::parse(&line) {
                    Some(command) => {
                        if !console::dispatch(&state, command).await {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("unknown command: {}", line.trim()),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Console input failed");
                    stdin_open = false;
                }
            },
        }
    }

    state.lock().await.registry.stop_all().await;
    info!("All subscriptions closed");
    Ok(())
}

async fn log_summaries(state: &SharedState) {
    for summary in channels::list_channels(state).await {
        info!(
            channel = %summary.channel_id,
            state = %summary.connection_state,
            status = %summary.status,
            unread = summary.unread_count,
            messages = summary.message_count,
            preview = summary.preview.as_deref().unwrap_or(""),
            "Channel summary"
        );
    }
}
