use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use todos_server::{AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("todos_server=info,tower_http=info")),
        )
        .init();

    let config = Config::load()?;
    let addr = SocketAddr::new(config.host, config.port);
    let state = AppState::from_config(config).await?;

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    todos_server::run(listener, state).await?;
    Ok(())
}
