//! `sonet config` - print the effective configuration.

use std::path::Path;

use anyhow::Result;
use console::style;

use sonet_infra::sqlite::pool::default_database_url;
use sonet_types::config::GlobalConfig;

/// Copy of `config` that is safe to print.
fn redacted(config: &GlobalConfig) -> GlobalConfig {
    let mut config = config.clone();
    if config.auth.cookie_signing_key.is_some() {
        config.auth.cookie_signing_key = Some("<redacted>".to_string());
    }
    config
}

/// Display the configuration the server would start with.
pub fn show_config(config: &GlobalConfig, data_dir: &Path, json: bool) -> Result<()> {
    let config = redacted(config);
    let database_url = config
        .server
        .database_url
        .clone()
        .unwrap_or_else(|| default_database_url(data_dir));

    if json {
        let output = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": data_dir.display().to_string(),
            "database_url": database_url,
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} sonet v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("  {:<10} {}", style("Data dir").dim(), data_dir.display());
    println!("  {:<10} {}", style("Database").dim(), database_url);
    println!(
        "  {:<10} {}",
        style("Listen").dim(),
        style(format!("{}:{}", config.server.host, config.server.port)).cyan()
    );
    println!(
        "  {:<10} {}",
        style("Cookies").dim(),
        if config.auth.cookie_signing_key.is_some() {
            style("signed").green()
        } else {
            style("unsigned").yellow()
        }
    );
    println!();
    for line in toml::to_string_pretty(&config)?.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}
