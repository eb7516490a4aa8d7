// Liveness endpoint for hosting platforms that probe an HTTP port.

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

async fn health() -> &'static str {
    "Bot is running"
}

pub fn router() -> Router {
    Router::new().route("/", get(health))
}

/// Serve the health check on 0.0.0.0:`port` until the process exits.
///
/// Bind and serve failures are logged; they never take the bot down.
pub async fn run_health_server(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind health server");
            return;
        }
    };

    info!(%addr, "Health server listening");
    if let Err(e) = axum::serve(listener, router()).await {
        error!(error = %e, "Health server stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_root_reports_running() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router()).await.unwrap();
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("Bot is running"));
    }
}
