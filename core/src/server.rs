//! TCP accept loop — one task per connection

use crate::connection::Connection;
use crate::ingest::FileIngest;
use crate::store::AccountStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
    /// Directory that holds one subdirectory per account.
    pub storage_root: PathBuf,
}

/// Accept connections forever. Each accepted socket gets its own task,
/// its own `Session`, and a `FileIngest` rooted at the storage directory;
/// the account store is the only shared resource.
pub async fn run(config: ServerConfig, store: Arc<dyn AccountStore>) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, root = %config.storage_root.display(), "listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "accept failed");
                continue;
            }
        };
        info!(peer = %peer, "connection accepted");
        let connection = Connection::new(
            stream,
            peer.to_string(),
            store.clone(),
            FileIngest::new(&config.storage_root),
        );
        tokio::spawn(connection.run());
    }
}
