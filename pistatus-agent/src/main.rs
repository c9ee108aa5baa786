//! Raspberry Pi status publisher.
//!
//! Publishes the CPU temperature and disk usage to an MQTT broker until the
//! configured number of cycles is done or Ctrl+C is received.

use anyhow::{Context, Result};
use tokio::sync::watch;

use pistatus_common::init_tracing;
use pistatus_publisher::{
    MqttTransport, Publisher, PublisherArgs, PublisherConfig, PublisherError, Scheduler,
};

use pistatus_agent::build_registry;
use pistatus_agent::config::AgentConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = PublisherArgs::parse();
    let path = args.config_path();

    // A config file is optional when the environment names the broker.
    let mut config = match AgentConfig::load(&path) {
        Ok(config) => config,
        Err(PublisherError::ConfigNotFound { .. })
            if !args.has_explicit_config() && std::env::var_os("MQTT_SERVER").is_some() =>
        {
            AgentConfig::default()
        }
        Err(e) => return Err(e).with_context(|| format!("loading {}", path.display())),
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    args.apply(&mut config.schedule);
    config.resolve_client_id();

    // Initialize logging with optional CLI override
    let mut logging = config.logging.clone();
    if let Some(level) = &args.log_level {
        logging.level = level.clone();
    }
    init_tracing(&logging)?;

    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        server = %config.mqtt.server,
        port = config.mqtt.port,
        client_id = %config.mqtt.client_id,
        interval_secs = config.schedule.interval_secs,
        cycles = ?config.schedule.cycles,
        test_mode = config.schedule.test_mode,
        "Starting pistatus"
    );

    let registry = build_registry(&config.sensors)?;
    let publisher = Publisher::new(MqttTransport::new(), config.topics.clone(), config.mqtt.format);
    let mut scheduler = Scheduler::new(config.schedule.clone(), &config.mqtt, registry, publisher);

    // Ctrl+C requests a cooperative shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Received shutdown signal");
        shutdown_tx.send(true).ok();
    });

    let summary = scheduler
        .run(shutdown_rx)
        .await
        .context("could not connect to the MQTT broker")?;

    tracing::info!(
        started_at = %summary.started_at,
        cycles = summary.cycles,
        published = summary.stats.success,
        failed = summary.stats.failed(),
        success_rate = summary.stats.success_rate(),
        "Goodbye!"
    );

    Ok(())
}
