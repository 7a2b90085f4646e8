//! Start a numflow worker over WebSocket.
//!
//! Usage: cargo run --example serve_worker -- [port] [config.json]
//!
//! Example:
//!   RUST_LOG=debug cargo run --example serve_worker -- 9000 worker.json

use std::net::SocketAddr;

use log::info;
use numflow_serve::{Engine, EngineConfig, NumflowServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let port: u16 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(9000);

    let config = match args.get(2) {
        Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    if let Some(locality) = &config.locality {
        info!("worker {} of {}", locality.worker, locality.workers);
    }

    let engine = Engine::new().with_config(config);
    engine.run("define(norm2(x, y), x * x + y * y)").await?;

    let server = NumflowServer::new(engine);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    server.listen(addr).await?;

    Ok(())
}
