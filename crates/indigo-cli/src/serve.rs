//! `indigo serve` - streaming API server

use anyhow::Result;

use indigo_core::IndigoConfig;

/// Run the serve command.
pub async fn run(mut config: IndigoConfig, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    // Server mode logs to stdout, not a file
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    print_banner(&config);

    let server = indigo_server::start_server(config);
    tokio::select! {
        result = server => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("\n  Shutting down...");
        }
    }

    Ok(())
}

fn print_banner(config: &IndigoConfig) {
    println!();
    println!("  \x1b[1;36mIndigo\x1b[0m server starting");
    println!("  ─────────────────────────────────────");
    println!("  Local:    http://localhost:{}", config.server.port);
    println!(
        "  Stream:   http://localhost:{}/stream?thread_id=1&message=Hello!",
        config.server.port
    );
    println!("  Calendar: {:?} ({})", config.calendar.backend, config.calendar.calendar_id);
    println!();
}
