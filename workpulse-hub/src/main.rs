//! `WorkPulse` development hub.
//!
//! Stands in for the portal's notification hub when running the client
//! locally or in tests.
//!
//! ```bash
//! cargo run --bin workpulse-hub -- --bind 127.0.0.1:5080 --token dev
//!
//! # Push a message to every connected client
//! curl -X POST localhost:5080/notify -H 'content-type: application/json' \
//!     -d '{"target":"ReceiveNotification","arguments":["TaskUpdated"]}'
//! ```

use std::sync::Arc;

use clap::Parser;
use workpulse_hub::config::{HubCliArgs, HubConfig};
use workpulse_hub::hub::{self, HubState};

#[tokio::main]
async fn main() {
    let cli = HubCliArgs::parse();

    let config = match HubConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        authenticated = !config.accepted_tokens.is_empty(),
        "starting workpulse hub"
    );

    let state = Arc::new(
        HubState::with_config(config.broadcast_capacity, config.accepted_tokens)
            .with_keep_alive(config.keep_alive),
    );

    match hub::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "hub listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "hub server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start hub");
            std::process::exit(1);
        }
    }
}
