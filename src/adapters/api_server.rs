use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::ServerConfig;
use crate::error::{LedgerError, Result};

/// Resolve the configured host and port into a socket address
pub fn bind_address(server: &ServerConfig) -> Result<SocketAddr> {
    let ip: IpAddr = server.host.parse().map_err(|_| {
        LedgerError::Validation(format!("server.host '{}' is not an IP address", server.host))
    })?;
    Ok(SocketAddr::new(ip, server.port))
}

/// Start the API server and serve until the process is stopped
pub async fn start_api_server(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("🚀 API server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
