//! Indigo Server
//!
//! Standalone binary for the streaming API; `indigo serve` runs the same server.

use indigo_core::IndigoConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = IndigoConfig::load()?;
    indigo_server::start_server(config).await
}
