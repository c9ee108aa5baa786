//! Raspberry Pi status publisher.
//!
//! Reads the CPU temperature and the usage of one filesystem and publishes
//! both to an MQTT broker on a fixed interval.
//!
//! # Topics
//!
//! ```text
//! <topics.cpu_temperature | MQTT_TOPIC_TEMP>   e.g. 45.7
//! <topics.disk_usage      | MQTT_TOPIC_DISK>   e.g. 78.9
//! <topics.prefix>/<metric>                     when no explicit topic is set
//! ```

pub mod config;
pub mod sensors;

use pistatus_publisher::{Result, SourceRegistry};

use crate::config::{CPU_TEMPERATURE, DISK_USAGE, SensorsConfig};
use crate::sensors::{CpuTemperatureSource, DiskUsageSource};

/// Register the enabled sensors, CPU temperature first.
pub fn build_registry(sensors: &SensorsConfig) -> Result<SourceRegistry> {
    let mut registry = SourceRegistry::new();

    if sensors.cpu_temperature {
        registry.register(
            CPU_TEMPERATURE,
            CpuTemperatureSource::new(&sensors.thermal_zone),
        )?;
    }
    if sensors.disk_usage {
        registry.register(DISK_USAGE, DiskUsageSource::new(&sensors.disk_mount))?;
    }

    Ok(registry)
}
