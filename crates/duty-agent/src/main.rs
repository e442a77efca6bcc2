mod sim;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use triage::{intake_channel, Channel, Incident, Intake, TriageConfig, TriageScheduler};

/// Run the on-call triage duty cycle.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML config file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Submit one sample incident per channel at start and every minute
    #[arg(long)]
    seed_demo: bool,

    /// Override the tick interval in seconds
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Seed for the simulated oracle
    #[arg(long)]
    seed: Option<u64>,
}

const DEMO_INTERVAL: Duration = Duration::from_secs(60);

const DEMO_INCIDENTS: [(Channel, &str, &str); 4] = [
    (Channel::FirstLineRequest, "L1", "Database connectivity issue"),
    (Channel::PagingAlert, "OG", "Service outage detected"),
    (Channel::ChatAlert, "S", "High memory usage detected"),
    (
        Channel::InternalHelpRequest,
        "D",
        "Request for deployment assistance",
    ),
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = TriageConfig::load(cli.config.as_deref())?;
    if let Some(tick_secs) = cli.tick_secs {
        config.tick_secs = tick_secs;
        config.validate().context("Invalid --tick-secs")?;
    }
    info!(
        tick_secs = config.tick_secs,
        remediation_budget_secs = config.remediation_budget_secs,
        start = %config.duty_window.start,
        end = %config.duty_window.end,
        "Duty agent starting"
    );

    let (intake, receiver) = intake_channel(config.intake_capacity);
    let mut scheduler =
        TriageScheduler::new(sim::simulated(cli.seed), &config)?.with_intake(receiver);
    let shutdown = scheduler.shutdown_token();

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C; shutting down"),
        }
        ctrl_c.cancel();
    });

    let feeder = cli
        .seed_demo
        .then(|| tokio::spawn(feed_demo_incidents(intake, shutdown.clone())));

    scheduler.run().await;

    shutdown.cancel();
    if let Some(feeder) = feeder {
        if let Err(e) = feeder.await {
            warn!(error = %e, "Demo feeder task failed");
        }
    }

    let unresolved = scheduler.pending();
    if unresolved > 0 {
        warn!(unresolved, "Incidents still queued at shutdown");
    }
    Ok(())
}

/// Submit a fresh round of sample incidents every minute until shutdown.
async fn feed_demo_incidents(intake: Intake, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(DEMO_INTERVAL);
    let mut round: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }
        round += 1;

        for incident in demo_round(round) {
            if let Err(e) = intake.submit(incident).await {
                warn!(error = %e, "Demo intake closed");
                return;
            }
        }
        info!(round, "Submitted demo incidents");
    }
}

fn demo_round(round: u32) -> Vec<Incident> {
    DEMO_INCIDENTS
        .iter()
        .map(|(channel, prefix, description)| {
            Incident::new(*channel, format!("{prefix}-{round:03}"), *description)
        })
        .collect()
}
