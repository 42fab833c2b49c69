use anyhow::Context;
use clap::Parser;
use socket2::{SockRef, TcpKeepalive};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod client;
mod config;
mod content;
mod coordinator;
mod error;
mod messages;
mod registry;
mod room;
mod session;
mod settings;
mod utils;

#[cfg(test)]
mod test_utils;

use crate::client::handle_client;
use crate::config::ServerConfig;
use crate::content::ContentCache;
use crate::coordinator::spawn_coordinator;

/// Entry point: loads config and content, then accepts clients
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Arc::new(ServerConfig::parse());
    let content = Arc::new(ContentCache::from_file(
        config.content_path.clone(),
        config.content_refresh(),
    ));
    // Rooms can still be created if this fails; BEGIN reports it until a reload works.
    if let Err(e) = content.snapshot().await {
        warn!("Content not loaded from {}: {}", config.content_path.display(), e);
    }

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!("Server listening on {}", config.bind);
    if config.admin_key.is_none() {
        info!("No admin key configured; admin commands are disabled");
    }

    let coordinator_tx = spawn_coordinator(config.clone(), content.clone());

    loop {
        let (socket, addr) = listener.accept().await?;

        // Configure TCP keep-alive
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(10))
            .with_interval(Duration::from_secs(1));
        let sf = SockRef::from(&socket);
        if let Err(e) = sf.set_tcp_keepalive(&keepalive) {
            warn!("Could not set keep-alive for {}: {}", addr, e);
        }

        let (reader, writer) = socket.into_split();
        tokio::spawn(handle_client(
            reader,
            writer,
            addr,
            coordinator_tx.clone(),
            content.clone(),
        ));
    }
}
