//! pistatus publisher core
//!
//! Samples a set of named metric sources on a fixed cadence and publishes each
//! reading to an MQTT broker over one long-lived session.
//!
//! # Overview
//!
//! This crate provides:
//! - [`SampleSource`] and [`SourceRegistry`] for named metric producers
//! - [`Transport`] with the [`MqttTransport`] implementation and the recording [`MockTransport`]
//! - [`Publisher`] for connect/publish/disconnect with structured failure reports
//! - [`Scheduler`] for the sample → publish cycle loop with cancellation
//! - [`PublisherConfig`] trait for configuration loading and validation
//! - [`PublisherArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use pistatus_publisher::{
//!     MqttTransport, Publisher, PublisherArgs, PublisherConfig, Scheduler, SourceRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = PublisherArgs::parse();
//!     let config = MyConfig::load(args.config_path())?;
//!
//!     let registry = SourceRegistry::new().with_source("uptime", read_uptime)?;
//!     let publisher = Publisher::new(MqttTransport::new(), config.topics().clone(), config.mqtt().format);
//!     let mut scheduler = Scheduler::new(config.schedule().clone(), config.mqtt(), registry, publisher);
//!
//!     let (_tx, shutdown) = tokio::sync::watch::channel(false);
//!     scheduler.run(shutdown).await?;
//!     Ok(())
//! }
//! ```

mod args;
mod backoff;
mod config;
mod error;
pub mod mock;
mod mqtt;
mod publisher;
mod registry;
mod scheduler;
mod source;
mod status;
mod transport;

pub use args::{DEFAULT_CONFIG_FILE, PublisherArgs};
pub use backoff::Backoff;
pub use config::{PublisherConfig, validate_common};
pub use error::{
    ConnectError, PublisherError, RegistryError, Result, SampleError, TransportError,
    connack_reason,
};
pub use mock::MockTransport;
pub use mqtt::MqttTransport;
pub use publisher::{PublishOutcome, PublishResult, PublishStats, Publisher};
pub use registry::{SampleFailure, SourceRegistry};
pub use scheduler::{CycleReport, RunSummary, ScheduleConfig, Scheduler, SchedulerState};
pub use source::{SampleSource, TestRandomSource};
pub use status::{Availability, OFFLINE, ONLINE};
pub use transport::{ConnectOptions, Credentials, Delivery, Endpoint, LastWill, Transport};

// Re-export commonly used types from pistatus-common
pub use pistatus_common::{
    FailureKind, FailureReport, Format, LoggingConfig, Metric, MqttConfig, Qos, TopicMap,
};
