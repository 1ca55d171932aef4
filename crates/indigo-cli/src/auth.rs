//! `indigo auth` - Google authorization flow

use anyhow::{Context, Result};

use indigo_core::auth::{ClientSecrets, InstalledAppFlow};
use indigo_core::paths;
use indigo_core::IndigoConfig;

/// Run the installed-app flow and save the authorized-user token.
pub async fn run(config: &IndigoConfig, port: u16) -> Result<()> {
    let credentials_path = config.credentials_path();
    let secrets = ClientSecrets::load(&credentials_path).with_context(|| {
        format!(
            "Download an OAuth client (Desktop app) from the Google Cloud console and save it as {}",
            credentials_path.display()
        )
    })?;

    let user = InstalledAppFlow::with_port(secrets, port).run().await?;

    let token_path = config.token_path();
    if config.calendar.token_path.is_none() {
        paths::ensure_tokens_dir()?;
    } else if let Some(dir) = token_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    user.save(&token_path)?;

    tracing::info!(path = %token_path.display(), "Saved Google token");
    println!();
    println!("  \x1b[32m✓\x1b[0m Authorized. Token saved to {}", token_path.display());
    println!();
    Ok(())
}
