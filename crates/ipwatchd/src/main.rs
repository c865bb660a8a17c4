// # ipwatchd - Public IPv4 Change Watcher
//
// Runs one reconciliation and exits. Meant to be started periodically by a
// systemd timer, cron or a container scheduler; runs must not overlap.
//
// The binary is a thin integration layer:
// 1. Parse arguments and initialize logging
// 2. Load, override and validate the configuration
// 3. Resolve collaborators through the registry
// 4. Run the reconciler under a deadline, cancelling it on SIGINT/SIGTERM
//
// ## Configuration
//
// JSON file at `--config-path`, `CONFIG_PATH`, or
// `/var/lib/dynamic-ip-watcher/config.json`. After the file is read these
// environment variables take precedence:
//
// - `ZONE_ID`: Cloudflare zone name
// - `RECORD_NAME`: A-record to update
// - `LOCAL_STORAGE_DIR`: Directory holding the last known address
// - `DISCORD_WEBHOOK`: Discord webhook URL
//
// Any string setting that names an existing file is replaced with that
// file's contents, so secrets can be mounted as files.
//
// ## Example
//
// ```bash
// export RECORD_NAME=home.example.com
// export DISCORD_WEBHOOK=/run/secrets/discord_webhook
// LOG_LEVEL=debug ipwatchd --config-path ./config.json
// ```

use anyhow::{Context, Result};
use clap::Parser;
use ipwatch_core::config::DEFAULT_CONFIG_PATH;
use ipwatch_core::{
    ChangeReconciler, CollaboratorRegistry, Config, FileAddressStore, ReconcileError, RunContext,
    RunOutcome,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchExitCode {
    /// The run completed, changed or not
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// A reconciliation stage failed or the run timed out
    RunFailed = 2,
    /// Interrupted by SIGINT or SIGTERM
    Interrupted = 3,
}

impl From<WatchExitCode> for ExitCode {
    fn from(code: WatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Parser)]
#[command(name = "ipwatchd", version, about = "Detect public IPv4 changes and update DNS")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

/// Read the config file, then apply environment overrides and secret files
fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config
        .resolve_secret_files()
        .context("Failed to resolve secret files")?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn registry() -> CollaboratorRegistry {
    let mut registry = CollaboratorRegistry::new();
    ipwatch_ip_http::register(&mut registry);

    #[cfg(feature = "cloudflare")]
    ipwatch_dns_cloudflare::register(&mut registry);

    #[cfg(feature = "discord")]
    ipwatch_notify_discord::register(&mut registry);

    registry
}

/// Resolve every configured collaborator into a ready reconciler
async fn build_reconciler(config: &Config) -> Result<ChangeReconciler> {
    let registry = registry();

    let store = FileAddressStore::new(&config.storage.directory)
        .await
        .with_context(|| {
            format!(
                "Failed to open storage directory {}",
                config.storage.directory.display()
            )
        })?;
    let retriever = registry.create_retriever(&config.address_source)?;
    let sinks = registry.create_notifiers(&config.notifiers)?;

    let mut reconciler = ChangeReconciler::new(Box::new(store), retriever).with_sinks(sinks);

    match &config.dns_record {
        Some(dns_record) => {
            reconciler = reconciler.with_dns_updater(registry.create_dns_updater(dns_record)?);
        }
        None => info!("No DNS record configured, only tracking the address"),
    }

    Ok(reconciler)
}

fn exit_code_for(result: &Result<RunOutcome, ReconcileError>, interrupted: bool) -> WatchExitCode {
    if interrupted {
        return WatchExitCode::Interrupted;
    }

    match result {
        Ok(_) => WatchExitCode::Success,
        Err(_) => WatchExitCode::RunFailed,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = match parse_log_level(&args.log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return WatchExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WatchExitCode::ConfigError.into();
    }

    let config = match load_config(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return WatchExitCode::ConfigError.into();
        }
    };

    info!(
        config = %args.config_path.display(),
        source = config.address_source.type_name(),
        dns = config.dns_record.as_ref().map(|d| d.type_name()),
        notifiers = config.notifiers.len(),
        "Configuration loaded"
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WatchExitCode::ConfigError.into();
        }
    };

    rt.block_on(run(config)).into()
}

/// Run one reconciliation, racing it against shutdown signals
async fn run(config: Config) -> WatchExitCode {
    let reconciler = match build_reconciler(&config).await {
        Ok(reconciler) => reconciler,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return WatchExitCode::ConfigError;
        }
    };

    let ctx = RunContext::new().with_timeout(config.run.timeout());
    let run = reconciler.reconcile(&ctx);
    tokio::pin!(run);

    let (result, interrupted) = tokio::select! {
        result = &mut run => (result, false),
        signal = wait_for_shutdown() => {
            warn!("Received {}, cancelling run", signal);
            ctx.cancel();
            // The reconciler still delivers the failure notification
            (run.await, true)
        }
    };

    if let Err(e) = &result
        && e.is_interruption()
        && !interrupted
    {
        error!(timeout = ?config.run.timeout(), "Run timed out");
    }

    exit_code_for(&result, interrupted)
}

/// Wait for SIGTERM or SIGINT
///
/// Never resolves if the handlers cannot be installed; the run deadline still
/// bounds the process.
#[cfg(unix)]
async fn wait_for_shutdown() -> &'static str {
    let handlers = signal(SignalKind::terminate()).and_then(|sigterm| {
        signal(SignalKind::interrupt()).map(|sigint| (sigterm, sigint))
    });

    let (mut sigterm, mut sigint) = match handlers {
        Ok(handlers) => handlers,
        Err(e) => {
            warn!("Failed to set up signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(e) => {
            warn!("Failed to wait for CTRL-C: {}", e);
            std::future::pending().await
        }
    }
}
