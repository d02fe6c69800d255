mod cache;
mod handlers;
mod server;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "unmc_ics_server=info,unmc_ics_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = server::ServerConfig::from_env()?;
    if config.redis_url.is_none() {
        tracing::info!("REDIS_URL not set, timetable pages will not be cached");
    }

    server::start_server(config).await
}
