//! Ambient health/status/metrics HTTP surface. The user-facing JSON-RPC API
//! (`ptx_*`, `pstate_*`) is out of scope; only its shapes live in
//! `crate::rpc::interface`. This is purely operational plumbing.

use std::net::SocketAddr;
use std::time::Instant;

use eyre::Result;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use sqlx::PgPool;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use crate::metrics;
use crate::orchestrator::engine::EngineHandle;

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    uptime_seconds: u64,
    orchestrators: usize,
    transactions_in_flight: usize,
}

pub async fn start_api_server(addr: SocketAddr, db: PgPool, engine: EngineHandle) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "api server started");

    let start_time = Instant::now();
    metrics::UP.set(1.0);

    loop {
        let (mut socket, _) = listener.accept().await?;
        let db = db.clone();
        let engine = engine.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            if socket.readable().await.is_ok() {
                let _ = socket.try_read(&mut buf);
            }

            let request = String::from_utf8_lossy(&buf);

            if request.starts_with("GET /metrics") {
                let encoder = TextEncoder::new();
                let metric_families = prometheus::gather();
                let mut buffer = Vec::new();
                let _ = encoder.encode(&metric_families, &mut buffer);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\n\r\n",
                    buffer.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.write_all(&buffer).await;
            } else if request.starts_with("GET /health") {
                let response = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nOK";
                let _ = socket.write_all(response.as_bytes()).await;
            } else if request.starts_with("GET /status") {
                let status = StatusResponse {
                    status: "ok".to_string(),
                    uptime_seconds: start_time.elapsed().as_secs(),
                    orchestrators: engine.orchestrator_count().await,
                    transactions_in_flight: engine.in_flight_count().await,
                };
                let _ = db.acquire().await;
                let body = serde_json::to_string(&status).unwrap_or_else(|_| "{}".to_string());
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            } else {
                let response = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
    }
}
