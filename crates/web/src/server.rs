use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::HttpBridge;
use crate::connection::Connection;

#[derive(Debug)]
pub struct ServerBuilder {
    address: Option<Vec<SocketAddr>>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { address: None }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Result<Self, ServerBuildError> {
        let resolved = address.to_socket_addrs().map_err(|e| ServerBuildError::InvalidAddress { reason: e.to_string() })?;
        self.address = Some(resolved.collect::<Vec<_>>());
        Ok(self)
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?;
        Ok(Server { address })
    }
}

#[derive(Debug)]
pub struct Server {
    address: Vec<SocketAddr>,
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: String },
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Accepts connections forever, serving each through the bridge.
    ///
    /// Every accepted connection gets its own task; each of those tasks
    /// blocks only itself inside `Bridge::call`, so slow responses never
    /// stall the accept loop or other connections.
    pub async fn serve(self, bridge: HttpBridge) {
        info!("start listening at {:?}", self.address);
        let tcp_listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return;
            }
        };

        let bridge = Arc::new(bridge);
        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let bridge = Arc::clone(&bridge);

            tokio::spawn(async move {
                let connection = Connection::new(tcp_stream, remote_addr);
                match connection.serve(&bridge).await {
                    Ok(()) => {
                        info!(peer = %remote_addr, "finished serving, connection shutdown");
                    }
                    Err(e) => {
                        error!(peer = %remote_addr, cause = %e, "serving connection failed, connection shutdown");
                    }
                }
            });
        }
    }
}
