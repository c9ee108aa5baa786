//! CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::scheduler::ScheduleConfig;

/// Configuration file name looked up in the default locations.
pub const DEFAULT_CONFIG_FILE: &str = "pistatus.json5";

/// Command-line arguments for the publisher.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about = "Publish Raspberry Pi status metrics to an MQTT broker")]
pub struct PublisherArgs {
    /// Path to configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Run a single cycle and exit.
    #[arg(long, conflicts_with = "cycles")]
    pub once: bool,

    /// Run this many cycles and exit.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub cycles: Option<u64>,

    /// Publish random values instead of sensor readings.
    #[arg(long)]
    pub test_mode: bool,
}

impl PublisherArgs {
    /// Parse CLI arguments.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Configuration file to load.
    ///
    /// `--config` wins; otherwise `$XDG_CONFIG_HOME/pistatus/pistatus.json5`
    /// if it exists, then `./pistatus.json5`.
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.config {
            return path.clone();
        }

        dirs::config_dir()
            .map(|dir| dir.join("pistatus").join(DEFAULT_CONFIG_FILE))
            .filter(|path| path.exists())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Whether the config file was named explicitly.
    pub fn has_explicit_config(&self) -> bool {
        self.config.is_some()
    }

    /// Apply the schedule overrides.
    pub fn apply(&self, schedule: &mut ScheduleConfig) {
        if self.once {
            schedule.cycles = Some(1);
        } else if let Some(cycles) = self.cycles {
            schedule.cycles = Some(cycles);
        }
        if self.test_mode {
            schedule.test_mode = true;
        }
    }
}
