use anyhow::Context;

use stockbook_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::load().context("failed to load configuration")?;
    stockbook_observability::init(config.log.format);

    let app = stockbook_api::app::build_app(&config);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        environment = %config.environment,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
