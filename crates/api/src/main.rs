use anyhow::Context;

use ferrepos_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("invalid configuration")?;
    ferrepos_observability::init(config.log_format);
    for key in &config.defaulted_secrets {
        tracing::warn!(key, "not set; using insecure dev default");
    }

    let bind_addr = config.bind_addr;
    let app = ferrepos_api::app::build_app(config).context("failed to start services")?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
