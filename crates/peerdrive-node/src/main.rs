//! Peerdrive Node binary
//!
//! Runs one device: answers liveness probes and, when `PEERDRIVE_USER` is set,
//! logs that user in until Ctrl-C.
//!
//! The directory lives in a private in-process replica, so each binary only
//! sees the locations it wrote itself. Devices find each other once a DHT
//! transport replicates that state; until then use the library with a shared
//! [`DhtDirectory`] for multi-device runs.

use std::sync::Arc;

use peerdrive_dht::PeerAddress;
use peerdrive_node::{identity, DhtDirectory, NodeConfig, PeerNode, TcpMessenger};
use peerdrive_process::{Process, Waiter};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peerdrive_node=info,peerdrive=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Peerdrive Node");

    let config = NodeConfig::from_env()?;
    let peer_id = identity::load_or_create(&config.data_dir)?;

    let listener = TcpListener::bind(config.p2p_addr).await?;
    let address = PeerAddress::new(peer_id, listener.local_addr()?);

    tracing::info!("  Peer: {}", address);
    tracing::info!("  Data: {:?}", config.data_dir);
    tracing::info!("  Contact window: {:?}", config.contact_peers_timeout);

    let node = PeerNode::new(
        config.clone(),
        address,
        // single replica, not shared with other devices
        Arc::new(DhtDirectory::default()),
        Arc::new(TcpMessenger::default()),
    );

    let server = node.clone();
    tokio::spawn(async move {
        if let Err(e) = server.serve_probes(listener).await {
            tracing::error!("Probe server error: {}", e);
        }
    });

    if let Some(user) = &config.user {
        let login = node.login(user, config.user_root(user))?;
        run_to_end(&login, &config).await?;
        tracing::info!("Node status: {:?}", node.status());
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    if node.sessions().is_logged_in() {
        let logout = node.logout()?;
        run_to_end(&logout, &config).await?;
    }

    Ok(())
}

async fn run_to_end(process: &Process, config: &NodeConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !config.autostart {
        process.start()?;
    }
    process.wait(Waiter::new(config.max_process_wait)).await?;
    Ok(())
}
