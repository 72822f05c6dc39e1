use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;

use crate::config::AppConfig;

pub async fn validate_config_command(config_path: PathBuf) -> Result<()> {
    let config = AppConfig::load_from_file(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    config.validate()?;

    println!("{}", style("✓ configuration is valid").green());
    println!("  rules_path: {}", config.rules_path);
    println!(
        "  webhook_url: {}",
        config.webhook_url.as_deref().unwrap_or("(none)")
    );
    Ok(())
}
