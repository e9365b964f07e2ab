//! Web server and API endpoints for the dashboard.
//!
//! Serves the latest published snapshot as JSON and the dashboard's static
//! files. The server only reads snapshots; it never triggers sampling.

pub mod config;
pub mod handlers;
pub mod router;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;

use crate::error::{Result, SystemError};
use crate::monitor::SnapshotReceiver;
use std::future::Future;
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// Start the web server and serve snapshots from `snapshots` until `shutdown` resolves.
pub async fn start_web_server<F>(config: WebConfig, snapshots: SnapshotReceiver, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(&config, snapshots);

    let addr = config.bind_address()?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SystemError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    info!("Dashboard available at http://{}/", addr);
    if addr.ip().is_unspecified() {
        for ip in lan_ipv4_addresses() {
            info!("  on the network at http://{}:{}/", ip, addr.port());
        }
    }
    info!("API endpoint: http://{}/api/stats", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| SystemError::web_server_error(format!("Server error: {}", e)))?;

    Ok(())
}

/// IPv4 addresses of every interface that is up, excluding loopback.
pub fn lan_ipv4_addresses() -> Vec<Ipv4Addr> {
    pnet::datalink::interfaces()
        .into_iter()
        .filter(|interface| interface.is_up() && !interface.is_loopback())
        .flat_map(|interface| {
            debug!("Found interface {} with {} addresses", interface.name, interface.ips.len());
            interface.ips
        })
        .filter_map(|network| match network {
            pnet::ipnetwork::IpNetwork::V4(v4) => Some(v4.ip()),
            pnet::ipnetwork::IpNetwork::V6(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lan_addresses_exclude_loopback() {
        assert!(lan_ipv4_addresses().iter().all(|ip| !ip.is_loopback()));
    }
}
