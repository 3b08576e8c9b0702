//! Sync command - bring local content up to date from a mirror directory.

use std::path::PathBuf;
use std::sync::Arc;

use bundlesync::catalog::{DirectoryCatalog, JsonFlagStore};
use bundlesync::connectivity::TcpProbe;
use bundlesync::coordinator::{ContentCoordinator, InitOutcome, SyncContext};
use bundlesync::events::ChannelObserver;
use bundlesync::manifest::ProfileSelection;
use bundlesync::SyncSignal;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the sync command.
pub struct SyncArgs {
    pub mirror: Option<PathBuf>,
    pub profile: Option<String>,
    pub probe: Option<String>,
    pub no_monitor: bool,
}

/// Run the sync command.
pub fn run(runner: &CliRunner, args: SyncArgs) -> Result<(), CliError> {
    let file = runner.config_file();
    let mut config = runner.config().clone();

    if let Some(name) = args.profile {
        config.profile_override = Some(ProfileSelection::new(name, ""));
    }

    let mirror = args.mirror.or_else(|| file.paths.mirror.clone()).ok_or_else(|| {
        CliError::Config("no mirror directory; pass --mirror or set paths.mirror".to_string())
    })?;
    let catalog_dir = config.catalog_dir.clone().ok_or_else(|| {
        CliError::Config("paths.catalog_dir is required for sync".to_string())
    })?;

    println!("bundlesync v{}", env!("CARGO_PKG_VERSION"));
    println!("==================");
    println!();
    println!("Mirror: {}", mirror.display());
    println!("Cache:  {}", config.cache_dir.display());
    println!();

    let catalog = DirectoryCatalog::open(&mirror, &config.cache_dir, &catalog_dir)?;
    let flags = JsonFlagStore::new(&config.flags_path);
    let (observer, signals) = ChannelObserver::new();

    let mut ctx = SyncContext::new(config, Arc::new(catalog), Arc::new(flags))
        .with_observer(Arc::new(observer));

    let probe_address = args.probe.or_else(|| file.connectivity.probe_address.clone());
    let monitor = file.connectivity.enabled && !args.no_monitor;
    if let (true, Some(address)) = (monitor, probe_address) {
        println!("Monitoring connectivity via {}", address);
        ctx = ctx.with_probe(Arc::new(TcpProbe::new(address)));
    }

    let shutdown = CancellationToken::new();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received shutdown signal, cancelling the current download...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let coordinator = ContentCoordinator::new(ctx);
    let outcome = runner.block_on(async move {
        let progress = tokio::spawn(render_progress(signals, progress_bar()));
        let outcome = coordinator.initialize(&shutdown).await;
        // Dropping the coordinator closes the signal channel
        drop(coordinator);
        let _ = progress.await;
        outcome
    })??;

    println!();
    match outcome {
        InitOutcome::Initialized(report) => {
            println!("{}", style("Content initialized").green().bold());
            println!("  Profile:     {}", report.profile.name);
            println!("  Keys:        {} ({:?})", report.downloaded, report.source);
            println!("  Validation:  {}", report.validation);
            if report.full_redownloads > 0 {
                println!("  Re-downloads: {}", report.full_redownloads);
            }
        }
        InitOutcome::EditorHosted(profile) => {
            println!("Profile {} serves content from the host, nothing to do", profile.name);
        }
        InitOutcome::Cancelled => {
            println!("{}", style("Sync cancelled").yellow());
            println!("Pending downloads resume on the next run.");
        }
    }

    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar
}

async fn render_progress(mut signals: mpsc::UnboundedReceiver<SyncSignal>, bar: ProgressBar) {
    while let Some(signal) = signals.recv().await {
        match signal {
            SyncSignal::DownloadStarted { total_keys } => {
                bar.set_position(0);
                bar.set_message(format!("{} keys", total_keys));
            }
            SyncSignal::PercentageChanged(pct) => bar.set_position(pct.round() as u64),
            SyncSignal::UpdateAvailable => bar.println("Catalog update available, cache refreshed"),
            SyncSignal::ValidationFailed(failure) => {
                bar.println(format!("{} {}", style("Validation failed:").red(), failure));
            }
            SyncSignal::Initialized => bar.finish_with_message("done"),
            SyncSignal::CustomCatalogLoaded { locator_id } => {
                bar.println(format!("Loaded catalog {}", locator_id));
            }
        }
    }

    if !bar.is_finished() {
        bar.abandon();
    }
}
