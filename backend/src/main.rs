use std::sync::Arc;

use anyhow::{Context, Result};
use backend::{
    api::{self, AppState},
    config::Config,
    db::ReadingStore,
    udp,
    utils::SystemClock,
};
use log::{error, info};

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let store = ReadingStore::open(
        &config.database_url,
        config.read_pool_size,
        Arc::new(SystemClock),
    )
    .with_context(|| format!("failed to open reading store at {}", config.database_url))?;

    let state = AppState::new(store, config.aggregation.clone());

    let listener = config.udp_bind.clone().map(|bind| {
        let gateway = state.gateway.clone();
        actix_web::rt::spawn(async move {
            if let Err(err) = udp::listen(bind, gateway).await {
                error!("Datagram listener failed: {err}");
            }
        })
    });

    api::new_http_server(state, &config)
        .await
        .context("HTTP server failed")?;

    if let Some(listener) = listener {
        listener.abort();
    }
    info!("Shut down");
    Ok(())
}
