//! Sample-and-publish scheduler.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pistatus_common::{FailureReport, MqttConfig, Qos};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::backoff::Backoff;
use crate::error::{ConnectError, PublisherError, Result};
use crate::publisher::{PublishStats, Publisher};
use crate::registry::SourceRegistry;
use crate::status::Availability;
use crate::transport::{ConnectOptions, Credentials, Endpoint, Transport};

/// Cadence and retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between cycles (default: 60).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Number of cycles to run (default: unbounded).
    #[serde(default)]
    pub cycles: Option<u64>,

    /// Seconds between successive publishes within a cycle (default: 5).
    #[serde(default = "default_inter_metric_delay")]
    pub inter_metric_delay_secs: u64,

    /// Replace every source with random values in [0, 100).
    #[serde(default)]
    pub test_mode: bool,

    /// Connect attempts before giving up (default: 3).
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// First delay between connect attempts, in milliseconds (default: 1000).
    #[serde(default = "default_backoff_initial")]
    pub backoff_initial_ms: u64,

    /// Longest delay between connect attempts, in milliseconds (default: 30000).
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

fn default_interval() -> u64 {
    60
}

fn default_inter_metric_delay() -> u64 {
    5
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_backoff_initial() -> u64 {
    1000
}

fn default_backoff_max() -> u64 {
    30_000
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            cycles: None,
            inter_metric_delay_secs: default_inter_metric_delay(),
            test_mode: false,
            connect_attempts: default_connect_attempts(),
            backoff_initial_ms: default_backoff_initial(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

impl ScheduleConfig {
    /// A single cycle, like one invocation of a cron job.
    pub fn once() -> Self {
        Self {
            cycles: Some(1),
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn inter_metric_delay(&self) -> Duration {
        Duration::from_secs(self.inter_metric_delay_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(PublisherError::validation("interval_secs must be > 0"));
        }
        if self.cycles == Some(0) {
            return Err(PublisherError::validation("cycles must be > 0 when set"));
        }
        if self.connect_attempts == 0 {
            return Err(PublisherError::validation("connect_attempts must be > 0"));
        }
        Ok(())
    }
}

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not running (initial state and after a clean shutdown).
    Idle,
    /// Opening the broker session.
    Connecting,
    /// Sampling and publishing.
    Cycling,
    /// Closing the broker session.
    Disconnecting,
    /// Gave up connecting.
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Connecting => "connecting",
            SchedulerState::Cycling => "cycling",
            SchedulerState::Disconnecting => "disconnecting",
            SchedulerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// What one cycle did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// Publish counts.
    pub stats: PublishStats,
    /// Sources that failed to produce a value.
    pub sample_failures: usize,
    /// Whether the cycle was cut short by cancellation.
    pub cancelled: bool,
}

/// What a whole run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Completed (or cancelled) cycles.
    pub cycles: u64,
    /// Publish counts over all cycles.
    pub stats: PublishStats,
    /// Sample failures over all cycles.
    pub sample_failures: usize,
    /// Whether the run ended on cancellation.
    pub cancelled: bool,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            cycles: 0,
            stats: PublishStats::default(),
            sample_failures: 0,
            cancelled: false,
        }
    }

    fn add(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.stats.merge(&report.stats);
        self.sample_failures += report.sample_failures;
        self.cancelled |= report.cancelled;
    }
}

/// Drives sample → publish cycles over one broker session.
///
/// Runs on a single task: sleeps are the only suspension points, metrics go
/// out one at a time in registration order, and the publisher's session is
/// released exactly once on every way out of [`run`](Self::run).
///
/// # Example
///
/// ```ignore
/// let registry = SourceRegistry::new()
///     .with_source("cpu_temperature", CpuTemperatureSource::default())?;
/// let publisher = Publisher::new(MqttTransport::new(), topics, Format::Plain);
/// let mut scheduler = Scheduler::new(ScheduleConfig::once(), &mqtt, registry, publisher);
///
/// let (_tx, shutdown) = tokio::sync::watch::channel(false);
/// let summary = scheduler.run(shutdown).await?;
/// ```
#[derive(Debug)]
pub struct Scheduler<T: Transport> {
    config: ScheduleConfig,
    endpoint: Endpoint,
    credentials: Option<Credentials>,
    connect_options: ConnectOptions,
    qos: Qos,
    retain: bool,
    availability: Option<Availability>,
    registry: SourceRegistry,
    publisher: Publisher<T>,
    state: SchedulerState,
}

impl<T: Transport> Scheduler<T> {
    /// Create a scheduler.
    ///
    /// In test mode every registered source is swapped for a random one.
    pub fn new(
        config: ScheduleConfig,
        mqtt: &MqttConfig,
        registry: SourceRegistry,
        publisher: Publisher<T>,
    ) -> Self {
        let registry = if config.test_mode {
            tracing::info!("Test mode: publishing random values instead of sensor readings");
            registry.into_test_mode()
        } else {
            registry
        };

        let availability = mqtt.availability_topic.as_deref().map(Availability::new);
        let mut connect_options = ConnectOptions::from_config(mqtt);
        if let Some(availability) = &availability {
            connect_options = connect_options.with_last_will(availability.last_will());
        }

        Self {
            config,
            endpoint: Endpoint::from_config(mqtt),
            credentials: Credentials::from_config(mqtt),
            connect_options,
            qos: mqtt.qos,
            retain: mqtt.retain,
            availability,
            registry,
            publisher,
            state: SchedulerState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Get a reference to the publisher.
    pub fn publisher(&self) -> &Publisher<T> {
        &self.publisher
    }

    /// Get a reference to the registry.
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    fn set_state(&mut self, state: SchedulerState) {
        tracing::debug!(from = %self.state, to = %state, "Scheduler state change");
        self.state = state;
    }

    /// Run until the configured number of cycles is done or `shutdown` turns true.
    ///
    /// Returns the run summary, or the [`ConnectError`] that stopped the run
    /// when no session could be established within the retry budget.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> std::result::Result<RunSummary, ConnectError> {
        let mut summary = RunSummary::new();

        self.set_state(SchedulerState::Connecting);
        match self.connect_with_retry(&mut shutdown).await {
            Ok(true) => {}
            Ok(false) => {
                summary.cancelled = true;
                self.shutdown_session().await;
                self.set_state(SchedulerState::Idle);
                return Ok(summary);
            }
            Err(e) => {
                FailureReport::connect(e.to_string()).emit();
                self.publisher.disconnect().await.ok();
                self.set_state(SchedulerState::Stopped);
                return Err(e);
            }
        }

        if let Some(availability) = &self.availability {
            availability.publish_online(&mut self.publisher).await;
        }

        self.set_state(SchedulerState::Cycling);
        let mut cycle = 0;
        loop {
            if is_cancelled(&shutdown) {
                summary.cancelled = true;
                break;
            }

            cycle += 1;
            let report = self.run_cycle(cycle, &mut shutdown).await;
            summary.add(&report);

            if report.cancelled || self.config.cycles.is_some_and(|n| cycle >= n) {
                break;
            }

            if !self.pause(self.config.interval(), &mut shutdown).await {
                summary.cancelled = true;
                break;
            }
        }

        self.shutdown_session().await;
        self.set_state(SchedulerState::Idle);

        tracing::info!(
            cycles = summary.cycles,
            published = summary.stats.success,
            failed = summary.stats.failed(),
            sample_failures = summary.sample_failures,
            cancelled = summary.cancelled,
            "Publisher run finished"
        );

        Ok(summary)
    }

    /// Try to connect within the retry budget.
    ///
    /// `Ok(false)` means cancellation arrived first.
    async fn connect_with_retry(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> std::result::Result<bool, ConnectError> {
        let attempts = self.config.connect_attempts.max(1);
        let mut backoff = Backoff::new(
            Duration::from_millis(self.config.backoff_initial_ms),
            Duration::from_millis(self.config.backoff_max_ms),
        );

        let mut attempt = 0;
        loop {
            if is_cancelled(shutdown) {
                return Ok(false);
            }

            attempt += 1;
            let error = match self
                .publisher
                .connect(&self.endpoint, self.credentials.as_ref(), &self.connect_options)
                .await
            {
                Ok(()) => return Ok(true),
                Err(e) => e,
            };

            if attempt >= attempts || !error.is_retryable() {
                return Err(error);
            }

            let delay = backoff.next_delay();
            tracing::warn!(
                attempt,
                attempts,
                error = %error,
                retry_in_ms = delay.as_millis() as u64,
                "Connect attempt failed"
            );

            if !self.pause(delay, shutdown).await {
                return Ok(false);
            }
        }
    }

    /// Sample every source and publish the results in order.
    async fn run_cycle(&mut self, cycle: u64, shutdown: &mut watch::Receiver<bool>) -> CycleReport {
        let mut report = CycleReport {
            cycle,
            ..CycleReport::default()
        };
        let mut first = true;

        for sample in self.registry.sample_all() {
            let metric = match sample {
                Ok(metric) => metric,
                Err(failure) => {
                    failure.report().emit();
                    report.sample_failures += 1;
                    continue;
                }
            };

            if !first && !self.pause(self.config.inter_metric_delay(), shutdown).await {
                report.cancelled = true;
                break;
            }
            if is_cancelled(shutdown) {
                report.cancelled = true;
                break;
            }
            first = false;

            let result = self.publisher.publish(&metric, self.qos, self.retain).await;
            report.stats.record(&result.outcome);
        }

        tracing::debug!(
            cycle,
            published = report.stats.success,
            failed = report.stats.failed(),
            sample_failures = report.sample_failures,
            "Cycle complete"
        );

        report
    }

    /// Sleep for `period` unless cancelled; returns `false` on cancellation.
    async fn pause(&mut self, period: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        if is_cancelled(shutdown) {
            return false;
        }
        if period.is_zero() {
            return true;
        }

        tokio::select! {
            _ = self.publisher.idle(period) => true,
            _ = wait_for_cancel(shutdown) => false,
        }
    }

    /// Announce offline and close the session.
    async fn shutdown_session(&mut self) {
        self.set_state(SchedulerState::Disconnecting);

        if self.publisher.is_connected() {
            if let Some(availability) = &self.availability {
                availability.publish_offline(&mut self.publisher).await;
            }
        }

        // Errors are logged by the publisher.
        self.publisher.disconnect().await.ok();
    }
}

fn is_cancelled(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Resolve once cancellation is requested. Never resolves if the sender is gone.
async fn wait_for_cancel(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
