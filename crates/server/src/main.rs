mod api;
mod db;
mod router;
mod state;

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "taxi-server", about = "Read-only metrics API over the taxi trip warehouse")]
struct Cli {
    /// Bind address (overrides SERVER_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides SERVER_PORT)
    #[arg(long)]
    port: Option<u16>,
}

fn load_config() -> taxi_core::Config {
    taxi_core::config::load_dotenv();
    taxi_core::Config::from_env()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = load_config();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;
    config.log_summary();

    let pool = db::init_pg_pool(&config.warehouse)?;
    let state = Arc::new(AppState {
        pool,
        table: config.warehouse.table.clone(),
    });
    let app = router::build_router(state, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
