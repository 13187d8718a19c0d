//! Process shell: reads configuration from the environment, owns the
//! process-wide Room Registry, accepts WebSocket connections, and serves a
//! small `/status` endpoint. Not part of the game engine or coordinator —
//! this module exists only to wire those components to a real TCP listener,
//! the way the teacher's own `main.rs` wires `SessionManager` to a listener.

use std::net::{Ipv4Addr, SocketAddrV4};

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::registry::Registry;

mod api;
mod error;
mod game;
mod key;
mod registry;
mod session;
mod wire;
mod ws;

/// Process configuration, read once at startup. Mirrors the teacher's direct
/// `std::env::var` reads rather than introducing a config crate.
struct Config {
    port: u16,
    status_port: u16,
}

impl Config {
    fn from_env() -> Result<Self> {
        let port: u16 = std::env::var("PORT")
            .context("PORT is unspecified")?
            .parse()
            .context("PORT is invalid")?;
        let status_port = std::env::var("STATUS_PORT")
            .ok()
            .map(|s| s.parse::<u16>().context("STATUS_PORT is invalid"))
            .transpose()?
            .unwrap_or(port + 1);
        Ok(Self { port, status_port })
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::try_init().ok();

    let config = Config::from_env().unwrap_or_else(|err| {
        log::error!("bad configuration: {err:#}");
        std::process::exit(1);
    });

    let registry: &'static Registry = Box::leak(Box::new(Registry::new()));

    let addr = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), config.port);
    let listener = bind(addr).await.unwrap_or_else(|err| {
        log::error!("{err:#}");
        std::process::exit(1);
    });
    log::info!("listening for game connections on {addr}");

    let status_addr = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), config.status_port);
    tokio::spawn(async move {
        let status_listener = match TcpListener::bind(status_addr).await {
            Ok(listener) => listener,
            Err(err) => {
                log::error!("could not bind status endpoint to {status_addr}: {err}");
                return;
            }
        };
        log::info!("serving /status on {status_addr}");
        if let Err(err) = axum::serve(status_listener, api::make_router(registry)).await {
            log::error!("status server stopped: {err}");
        }
    });

    while let Ok((stream, peer)) = listener.accept().await {
        log::debug!("accepted connection from {peer}");
        tokio::spawn(ws::accept_connection(stream, registry));
    }
}

async fn bind(addr: SocketAddrV4) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind to {addr}"))
}
