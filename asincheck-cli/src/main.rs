//! asincheck - Main entry point
//!
//! Command-line client for the ASIN eligibility backend: sign in, run batch
//! checks with live progress, inspect plan usage and export results as CSV.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use asincheck_cli::cli::{Cli, Commands, ConfigAction};
use asincheck_cli::gateway::GatewayError;
use asincheck_cli::render;
use asincheck_cli::results::{
    default_export_file_name, export_to_path, ResultSet, SortDirection, SortKey, SortSpec,
};
use asincheck_cli::subscription::RefreshOutcome;
use asincheck_cli::AppContext;
use asincheck_common::config::{
    write_toml_config, ClientConfig, ConfigOverrides, ConfigResolver, LoggingConfig, TomlConfig,
};
use asincheck_common::events::{AsincheckEvent, EventBus};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for the subscription listener to apply a batch's usage
const USAGE_SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolver = ConfigResolver::new(ConfigOverrides {
        config_path: cli.config.clone(),
        base_url: cli.base_url.clone(),
    });
    let config = resolver.resolve().context("Failed to resolve configuration")?;

    // Initialize tracing (stderr, so stdout carries only results)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "asincheck_cli={lvl},asincheck_common={lvl}",
                    lvl = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    debug!(base_url = %config.base_url, session = %config.session_file.display(), "Configuration resolved");

    match cli.command {
        Commands::Config { action } => run_config(action, &resolver, &config),
        command => {
            let ctx = AppContext::init(config)
                .await
                .context("Failed to initialize client")?;
            run_command(command, ctx).await
        }
    }
}

async fn run_command(command: Commands, ctx: AppContext) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt_password()?,
            };
            match ctx.gateway.login(&email, &password).await {
                Ok(user) => {
                    println!("Signed in as {}", render::whoami_line(Some(&user)));
                    Ok(())
                }
                Err(GatewayError::VerificationPending(email)) => {
                    bail!("Please verify {} before signing in", email)
                }
                Err(e) => Err(e).context("Login failed"),
            }
        }
        Commands::Logout => {
            ctx.session.sign_out().await.context("Failed to clear session")?;
            println!("Signed out");
            Ok(())
        }
        Commands::Whoami => {
            println!("{}", render::whoami_line(ctx.session.user().await.as_ref()));
            if let Some(email) = ctx.session.pending_verification_email().await {
                println!("Email verification pending for {}", email);
            }
            Ok(())
        }
        Commands::Check {
            asins,
            file,
            sort,
            desc,
            export,
            export_default,
        } => {
            let input = read_input(asins, file)?;
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            let export_path = match (export, export_default) {
                (Some(path), _) => Some(path),
                (None, true) => Some(PathBuf::from(default_export_file_name(
                    &asincheck_common::time::today(),
                ))),
                (None, false) => None,
            };
            run_check(&ctx, &input, SortSpec::new(SortKey::from(sort), direction), export_path)
                .await
        }
        Commands::Usage => {
            let outcome = ctx.subscription.force_refresh().await;
            debug!(?outcome, "Subscription refreshed");
            let snapshot = ctx.subscription.snapshot().await;
            let mut stdout = io::stdout().lock();
            render::write_usage_summary(&snapshot, &mut stdout)?;
            if outcome == RefreshOutcome::Failed && snapshot.data.is_none() {
                bail!("Could not load subscription data");
            }
            Ok(())
        }
        Commands::Config { .. } => unreachable!("handled before client init"),
    }
}

async fn run_check(
    ctx: &AppContext,
    input: &str,
    sort: SortSpec,
    export_path: Option<PathBuf>,
) -> Result<()> {
    let listener = ctx.subscription.spawn_listener();
    let printer = spawn_progress_printer(&ctx.event_bus);
    let mut usage_rx = ctx.event_bus.subscribe();

    // Load the snapshot so the batch's usage bump has something to apply to
    if ctx.session.is_authenticated().await {
        ctx.subscription.refresh().await;
    }

    let cancel = CancellationToken::new();
    let ctrl_c = spawn_cancel_on_ctrl_c(cancel.clone());

    let mut results = ResultSet::new();
    let outcome = ctx
        .batch_processor()
        .run(input, &mut results, &cancel)
        .await;

    cancel.cancel();
    let _ = ctrl_c.await;
    if tokio::time::timeout(Duration::from_secs(1), printer).await.is_err() {
        debug!("Progress printer did not finish");
    }

    let summary = outcome.context("ASIN check failed")?;
    info!(
        processed = summary.progress.processed,
        cancelled = summary.cancelled,
        "Check finished"
    );

    let view = results.sorted(sort);
    {
        let mut stdout = io::stdout().lock();
        render::write_results_table(&view, &mut stdout)?;
    }

    if let Some(path) = export_path {
        export_to_path(&view, &asincheck_common::time::today(), &path)
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        eprintln!("Exported {} results to {}", view.len(), path.display());
    }

    if ctx.subscription.usage().await.is_some() {
        if let Some(usage) = wait_for_usage_change(&mut usage_rx).await {
            println!("{}", render::usage_line(&usage));
        }
    }

    listener.abort();
    Ok(())
}

/// Print batch progress and notices to stderr until the batch's final notice
fn spawn_progress_printer(event_bus: &EventBus) -> JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        let mut stderr = io::stderr();
        loop {
            match rx.recv().await {
                Ok(AsincheckEvent::BatchProgress { progress, .. }) => {
                    let _ = write!(stderr, "\r{}", render::progress_line(&progress));
                    let _ = stderr.flush();
                }
                Ok(AsincheckEvent::Notice { level, message, .. }) => {
                    let _ = writeln!(stderr, "\n{}", render::notice_line(level, &message));
                    break;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Progress printer lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Latest usage applied by the subscription listener after the batch
async fn wait_for_usage_change(
    rx: &mut broadcast::Receiver<AsincheckEvent>,
) -> Option<asincheck_common::api::Usage> {
    let mut latest = None;
    let _ = tokio::time::timeout(USAGE_SETTLE_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(AsincheckEvent::UsageChanged {
                    current,
                    limit,
                    percentage,
                    pending_reconciliation,
                    ..
                }) => {
                    latest = Some(asincheck_common::api::Usage {
                        current,
                        limit,
                        percentage,
                        reset_date: None,
                    });
                    if pending_reconciliation {
                        break;
                    }
                }
                Ok(AsincheckEvent::BatchAborted { .. }) => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
    .await;
    latest
}

/// Cancel `token` on Ctrl+C; exits when the token is cancelled elsewhere
fn spawn_cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("Received Ctrl+C, cancelling batch");
                    token.cancel();
                }
                Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
            },
            _ = token.cancelled() => {}
        }
    })
}

/// ASINs from arguments, a file, or stdin (in that order)
fn read_input(asins: Vec<String>, file: Option<PathBuf>) -> Result<String> {
    if !asins.is_empty() {
        return Ok(asins.join(" "));
    }
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read ASINs from stdin")?;
    Ok(input)
}

fn prompt_password() -> Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

fn run_config(action: ConfigAction, resolver: &ConfigResolver, config: &ClientConfig) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let Some(path) = resolver.config_path() else {
                bail!("Could not determine config directory; pass --config");
            };
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }

            let toml_config = TomlConfig {
                base_url: Some(config.base_url.clone()),
                request_delay_ms: Some(config.request_delay.as_millis() as u64),
                refresh_throttle_ms: Some(config.refresh_throttle.as_millis() as u64),
                request_timeout_secs: Some(config.request_timeout.as_secs()),
                event_bus_capacity: Some(config.event_bus_capacity),
                session_file: Some(config.session_file.clone()),
                logging: LoggingConfig {
                    level: config.log_level.clone(),
                },
            };
            write_toml_config(&toml_config, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let path = resolver
                .config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string());
            println!("config_file          = {}", path);
            println!("base_url             = {}", config.base_url);
            println!("request_delay_ms     = {}", config.request_delay.as_millis());
            println!("refresh_throttle_ms  = {}", config.refresh_throttle.as_millis());
            println!("request_timeout_secs = {}", config.request_timeout.as_secs());
            println!("event_bus_capacity   = {}", config.event_bus_capacity);
            println!("session_file         = {}", config.session_file.display());
            println!("log_level            = {}", config.log_level);
            Ok(())
        }
    }
}
