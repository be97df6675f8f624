use crate::cli::{Cli, ConfigCommands};
use crate::terminal::{print_view, TerminalSink};
use anyhow::{bail, Context, Result};
use bully_monitor::{
    Dashboard, DashboardConfig, DashboardView, HttpSnapshotFetcher, ObserverPanel, RosterBody,
};
use colored::*;
use std::path::Path;
use std::time::Duration;

/// Effective configuration: file (or defaults) overridden by flags
pub fn load_config(cli: &Cli) -> Result<DashboardConfig> {
    let mut config = match &cli.config {
        Some(path) => DashboardConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => DashboardConfig::default(),
    };

    if let Some(url) = &cli.url {
        config.base_url = url.clone();
    }
    if let Some(push_url) = &cli.push_url {
        config.push_url = Some(push_url.clone());
    }
    if let Some(secs) = cli.interval {
        config.refresh_interval = Duration::from_secs(secs);
    }

    config.validate()?;
    Ok(config)
}

pub async fn watch(config: DashboardConfig, clear_screen: bool) -> Result<()> {
    let handle = Dashboard::mount(&config, Box::new(TerminalSink::new(clear_screen)))?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    let model = handle.shutdown().await?;
    tracing::debug!("Final model: {:?}", model);
    Ok(())
}

pub async fn status(config: DashboardConfig) -> Result<()> {
    let fetcher = HttpSnapshotFetcher::new(&config)?;
    let view = Dashboard::render_once(&fetcher).await;

    print_view(&view);

    if nothing_reported(&view) {
        bail!("Status service at {} is unavailable", config.base_url);
    }
    Ok(())
}

/// Neither the observer status nor the roster arrived
fn nothing_reported(view: &DashboardView) -> bool {
    matches!(view.observer, ObserverPanel::Waiting)
        && matches!(view.roster.body, RosterBody::Loading)
}

pub fn handle_config_command(command: ConfigCommands, config: &DashboardConfig) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            println!("Observer endpoint: {}", config.observer_url());
            println!("Cluster endpoint:  {}", config.cluster_url());
            println!(
                "Push channel:      {}",
                config.push_url.as_deref().unwrap_or("disabled (pull only)")
            );
            println!("Refresh interval:  {:?}", config.refresh_interval);
            println!("Request timeout:   {:?}", config.request_timeout);
            println!("Reconnect delay:   {:?}", config.reconnect_delay);
            Ok(())
        }
        ConfigCommands::Init { output, force } => init_config(&output, force),
    }
}

fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists; use --force to overwrite it",
            output.display()
        );
    }

    DashboardConfig::default().to_file(output)?;
    println!(
        "{}",
        format!("✓ Wrote default configuration to {}", output.display()).green()
    );
    Ok(())
}
