//! certsmith - Main entry point
//!
//! Keeps an ACME certificate valid and reloads the service that uses it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use certsmith_acme::acme::{CertificateError, CertificateLifecycleManager, RenewalScheduler};
use certsmith_acme::reload::{
    exit_code, LogOnly, PidFileTarget, ReloadTarget, ShutdownSignal, SupervisedService,
};
use certsmith_common::SecretRegistry;
use certsmith_config::{ConfigError, RawConfiguration, ResolvedConfiguration};

/// Time the service gets to exit after SIGTERM
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// certsmith - ACME certificates for a service that cannot renew its own
#[derive(Parser, Debug)]
#[command(name = "certsmith")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true, env = "CERTSMITH_VERBOSE")]
    verbose: bool,

    /// Arguments of `run` when no subcommand is given
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ensure the certificate, then supervise the service (default)
    Run(RunArgs),
    /// Ensure the certificate once and exit
    Check {
        /// Renew when fewer days than this remain
        #[arg(long, env = "RENEW_DAYS", default_value_t = 21, allow_negative_numbers = true)]
        renew_days: i64,
    },
    /// Resolve the configuration, print a summary and exit
    Validate,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Renewal threshold for the check at startup, in days
    #[arg(long, env = "INITIAL_RENEW_DAYS", default_value_t = 21, allow_negative_numbers = true)]
    initial_renew_days: i64,

    /// Renewal threshold for the periodic checks, in days
    #[arg(long, env = "RENEW_DAYS", default_value_t = 21, allow_negative_numbers = true)]
    renew_days: i64,

    /// Hours between periodic checks (at least 1)
    #[arg(long, env = "CHECK_INTERVAL_HOURS", default_value_t = 24)]
    check_interval_hours: u64,

    /// Signal the process whose pid is in this file instead of a child
    #[arg(long, env = "CERTSMITH_PID_FILE", conflicts_with = "command")]
    pid_file: Option<PathBuf>,

    /// Service to start and supervise
    #[arg(last = true)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    install_crypto_provider();

    let cli = Cli::parse();

    certsmith_common::init_tracing(cli.verbose)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let code = runtime.block_on(async move {
        match cli.command {
            Some(Commands::Run(args)) => run(args).await,
            Some(Commands::Check { renew_days }) => check(renew_days).await,
            Some(Commands::Validate) => validate().await,
            None => run(cli.run).await,
        }
    })?;
    drop(runtime);

    std::process::exit(code);
}

/// Pick the process-wide rustls provider
///
/// Both ring and aws-lc-rs are linked in, so rustls cannot choose one itself
/// and the ACME client would panic on first use.
fn install_crypto_provider() {
    // Err only means a provider is already installed
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Render a configuration error with its diagnostic help
fn config_error(err: ConfigError) -> anyhow::Error {
    anyhow!("{:?}", miette::Report::new(err))
}

async fn load_configuration() -> Result<ResolvedConfiguration> {
    let raw = RawConfiguration::from_env().map_err(config_error)?;
    let secrets = SecretRegistry::default_stores();
    certsmith_config::resolve(&raw, &secrets)
        .await
        .map_err(config_error)
}

async fn lifecycle_manager(config: &ResolvedConfiguration) -> Result<Arc<CertificateLifecycleManager>> {
    let manager = CertificateLifecycleManager::from_config(config)
        .await
        .context("Failed to set up the ACME issuer")?;
    Ok(Arc::new(manager))
}

/// Resolve and print the configuration
async fn validate() -> Result<i32> {
    let config = load_configuration().await?;

    println!("certsmith: configuration is valid");
    println!("  domains:            {}", config.domains.join(", "));
    println!("  account email:      {}", config.account_email);
    println!("  account key:        {}", config.account_key.algorithm());
    println!("  CA directory:       {}", config.ca_directory_url);
    println!("  key type:           {}", config.key_algorithm);
    println!(
        "  bundle:             {}",
        config
            .output_directory
            .join(format!("{}.crt", config.artifact_name))
            .display()
    );
    println!("  DNS credential:     {}", config.credential_source.describe());
    if config.dns_resolvers.is_empty() {
        println!("  DNS resolvers:      system default");
    } else {
        println!("  DNS resolvers:      {}", config.dns_resolvers.join(", "));
    }
    println!(
        "  propagation check:  {}",
        if config.disable_propagation_check {
            "recursive resolvers only"
        } else {
            "recursive and authoritative"
        }
    );

    Ok(0)
}

/// Ensure the certificate once
async fn check(renew_days: i64) -> Result<i32> {
    let config = load_configuration().await?;
    let manager = lifecycle_manager(&config).await?;

    let changed = manager
        .ensure_valid(renew_days)
        .await
        .context("Certificate check failed")?;

    if changed {
        println!("certsmith: new certificate written");
    } else {
        println!("certsmith: certificate is still valid");
    }
    Ok(0)
}

/// Ensure the certificate, then keep it valid while supervising the service
async fn run(args: RunArgs) -> Result<i32> {
    let mut shutdown = ShutdownSignal::register().context("Failed to install signal handlers")?;

    let startup = async {
        let config = load_configuration().await?;
        let manager = lifecycle_manager(&config).await?;
        let changed = manager
            .ensure_valid(args.initial_renew_days)
            .await
            .context("Initial certificate check failed")?;
        Ok::<_, anyhow::Error>((manager, changed))
    };

    let (manager, changed) = match shutdown.interrupt(startup).await {
        Some(result) => result?,
        None => {
            info!("Shutdown requested during the initial certificate check");
            return Ok(0);
        }
    };

    let service = match args.command.split_first() {
        Some((program, rest)) => Some(Arc::new(
            SupervisedService::spawn(program, rest).context("Failed to start the service")?,
        )),
        None => None,
    };

    let target: Arc<dyn ReloadTarget> = match (&service, &args.pid_file) {
        (Some(service), _) => service.clone(),
        (None, Some(path)) => Arc::new(PidFileTarget::new(path)),
        (None, None) => Arc::new(LogOnly),
    };

    // A child started after the check already has the new bundle
    if changed && service.is_none() {
        if let Err(e) = target.reload().await {
            warn!(service = %target.describe(), error = %e, "Failed to notify service");
        }
    }

    let scheduler = RenewalScheduler::new(manager, target, args.renew_days)
        .with_interval(Duration::from_secs(args.check_interval_hours.saturating_mul(3600)));
    let mut renewal = tokio::spawn(scheduler.run());

    let code = match service {
        Some(service) => {
            tokio::select! {
                status = service.wait() => {
                    let status = status.context("Failed to wait for the service")?;
                    let code = exit_code(status);
                    warn!(code, "Service exited, stopping");
                    code
                }
                _ = shutdown.recv() => {
                    info!("Shutdown requested, stopping service");
                    service
                        .terminate(SHUTDOWN_GRACE)
                        .await
                        .context("Failed to stop the service")?;
                    0
                }
                joined = &mut renewal => {
                    let err = scheduler_failure(joined);
                    if let Err(e) = service.terminate(SHUTDOWN_GRACE).await {
                        error!(error = %e, "Failed to stop the service");
                    }
                    return Err(err);
                }
            }
        }
        None => {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown requested");
                    0
                }
                joined = &mut renewal => return Err(scheduler_failure(joined)),
            }
        }
    };

    renewal.abort();
    Ok(code)
}

fn scheduler_failure(
    joined: Result<Result<(), CertificateError>, tokio::task::JoinError>,
) -> anyhow::Error {
    match joined {
        Ok(Err(e)) => anyhow::Error::new(e).context("Certificate renewal stopped"),
        Ok(Ok(())) => anyhow!("Certificate renewal stopped unexpectedly"),
        Err(e) => anyhow::Error::new(e).context("Certificate renewal task failed"),
    }
}
