use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use heat_collector::agent::PollingAgent;
use heat_collector::collector_core::Discovery;
use heat_collector::collectors::{build_pollsters, ec2::Ec2InstancesDiscovery, MeterKind};
use heat_collector::config::AgentConfig;
use heat_collector::heat::HeatClient;
use heat_collector::inspector::{CloudWatchInspector, Inspector};
use heat_collector::mock::{MockDiscovery, MockInspector};
use heat_collector::out::{OutMode, Publisher};

/// Polls CloudWatch CPU utilization of instances declared in Heat stacks
#[derive(Parser, Debug)]
#[command(name = "heat-collector")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "heat-collector.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Use built-in instances and metrics instead of OpenStack and AWS
    #[arg(long)]
    mock: bool,

    /// Output mode: stdout | http (overrides the config file)
    #[arg(long)]
    out: Option<String>,

    /// Sample sink URL for http output (overrides the config file)
    #[arg(long)]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = if cli.config.exists() {
        AgentConfig::from_file(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    } else {
        tracing::warn!(path = %cli.config.display(), "config file not found, using defaults");
        AgentConfig::default()
    };
    if let Some(out) = &cli.out {
        config.publisher.mode = OutMode::parse(out);
    }
    if let Some(endpoint) = cli.endpoint {
        config.publisher.endpoint = endpoint;
    }

    let (discovery, inspector): (Arc<dyn Discovery>, Arc<dyn Inspector>) = if cli.mock {
        (Arc::new(MockDiscovery), Arc::new(MockInspector))
    } else {
        let heat = HeatClient::connect(&config)
            .await
            .context("failed to build orchestration client")?;
        (
            Arc::new(Ec2InstancesDiscovery::new(Arc::new(heat), &config)),
            Arc::new(CloudWatchInspector::from_config(&config.cloudwatch).await),
        )
    };

    let meters = MeterKind::parse_list(&config.polling.meters)?;
    let pollsters = build_pollsters(&meters, inspector, &config);
    let publisher = Publisher::new(&config.publisher, &config.polling.source)?;
    let agent = PollingAgent::new(vec![discovery], pollsters);

    tracing::info!(
        interval_secs = config.polling.interval_secs,
        meters = ?config.polling.meters,
        out = ?publisher.mode(),
        mock = cli.mock,
        "starting collector"
    );
    agent
        .run(&publisher, Duration::from_secs(config.polling.interval_secs), cli.once)
        .await;

    Ok(())
}
