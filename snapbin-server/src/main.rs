use anyhow::Result;
use snapbin_core::SnapConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = SnapConfig::from_env()?;
    let addr = config.http_addr();

    let app = snapbin_server::build(config).await?;

    tracing::info!("[snapbin] listening on http://{addr}");

    app.listen(addr).await?;

    Ok(())
}
