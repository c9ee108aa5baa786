//! Configuration for the pistatus agent.

use serde::{Deserialize, Serialize};

use pistatus_publisher::{
    LoggingConfig, MqttConfig, PublisherConfig, PublisherError, Result, ScheduleConfig, TopicMap,
    validate_common,
};

/// Metric name of the CPU temperature source.
pub const CPU_TEMPERATURE: &str = "cpu_temperature";
/// Metric name of the disk usage source.
pub const DISK_USAGE: &str = "disk_usage";

/// Complete agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Broker connection settings.
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Metric → topic map.
    #[serde(default)]
    pub topics: TopicMap,

    /// Cadence and retries.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Which sensors to read and where.
    #[serde(default)]
    pub sensors: SensorsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sensor selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorsConfig {
    /// Publish the CPU temperature (default: true).
    #[serde(default = "default_true")]
    pub cpu_temperature: bool,

    /// Publish the disk usage (default: true).
    #[serde(default = "default_true")]
    pub disk_usage: bool,

    /// Thermal zone file holding millidegrees Celsius.
    #[serde(default = "default_thermal_zone")]
    pub thermal_zone: String,

    /// Mount point whose usage is reported (default: "/").
    #[serde(default = "default_mount")]
    pub disk_mount: String,
}

fn default_true() -> bool {
    true
}

fn default_thermal_zone() -> String {
    "/sys/class/thermal/thermal_zone0/temp".to_string()
}

fn default_mount() -> String {
    "/".to_string()
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            cpu_temperature: true,
            disk_usage: true,
            thermal_zone: default_thermal_zone(),
            disk_mount: default_mount(),
        }
    }
}

impl PublisherConfig for AgentConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn topics(&self) -> &TopicMap {
        &self.topics
    }

    fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> Result<()> {
        validate_common(self)?;

        if !self.sensors.cpu_temperature && !self.sensors.disk_usage {
            return Err(PublisherError::validation(
                "At least one sensor must be enabled",
            ));
        }

        Ok(())
    }
}

impl AgentConfig {
    /// Overlay environment variables on top of the file values.
    ///
    /// `lookup` is `std::env::var` in production. Recognised keys:
    /// `MQTT_SERVER`, `MQTT_PORT`, `MQTT_USER`, `MQTT_PASSWORD`,
    /// `MQTT_TOPIC_TEMP`, `MQTT_TOPIC_DISK` and `TEST_MODE`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(server) = get("MQTT_SERVER") {
            self.mqtt.server = server;
        }
        if let Some(port) = get("MQTT_PORT") {
            self.mqtt.port = port.trim().parse().map_err(|_| {
                PublisherError::config(format!("MQTT_PORT is not a valid port: {}", port))
            })?;
        }
        if let Some(user) = get("MQTT_USER") {
            self.mqtt.user = Some(user);
        }
        if let Some(password) = get("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(topic) = get("MQTT_TOPIC_TEMP") {
            self.topics.insert(CPU_TEMPERATURE, topic);
        }
        if let Some(topic) = get("MQTT_TOPIC_DISK") {
            self.topics.insert(DISK_USAGE, topic);
        }
        if let Some(flag) = get("TEST_MODE") {
            self.schedule.test_mode = parse_flag(&flag).ok_or_else(|| {
                PublisherError::config(format!("TEST_MODE is not a boolean: {}", flag))
            })?;
        }

        Ok(())
    }

    /// Replace `client_id: "auto"` with `pistatus-<hostname>`.
    pub fn resolve_client_id(&mut self) {
        if self.mqtt.client_id == "auto" {
            self.mqtt.client_id = format!("pistatus-{}", get_hostname());
        }
    }
}

/// Local host name, or "unknown".
pub fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = AgentConfig::parse(r#"{ mqtt: { server: "broker.local" } }"#).unwrap();

        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.client_id, "auto");
        assert_eq!(config.schedule.interval_secs, 60);
        assert!(config.sensors.cpu_temperature);
        assert!(config.sensors.disk_usage);
        assert_eq!(config.sensors.disk_mount, "/");
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            mqtt: {
                server: "192.168.1.10",
                port: 8883,
                user: "pi",
                password: "raspberry",
                client_id: "pi4-kitchen",
                qos: 1,
                retain: true,
                format: "json",
                availability_topic: "pi4/status",
            },
            topics: {
                prefix: "home/pi4",
                cpu_temperature: "pi4/cpu_temp",
            },
            schedule: {
                interval_secs: 300,
                inter_metric_delay_secs: 2,
                connect_attempts: 5,
            },
            sensors: {
                disk_usage: false,
                thermal_zone: "/sys/class/thermal/thermal_zone1/temp",
            },
            logging: { level: "debug" },
        }"#;

        let config = AgentConfig::parse(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.availability_topic.as_deref(), Some("pi4/status"));
        assert_eq!(config.topics.topic_for(CPU_TEMPERATURE), "pi4/cpu_temp");
        assert_eq!(config.topics.topic_for(DISK_USAGE), "home/pi4/disk_usage");
        assert_eq!(config.schedule.connect_attempts, 5);
        assert!(!config.sensors.disk_usage);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = AgentConfig::parse(r#"{ mqtt: { server: "file.local" } }"#).unwrap();

        config
            .apply_env(env(&[
                ("MQTT_SERVER", "env.local"),
                ("MQTT_PORT", "1884"),
                ("MQTT_USER", "pi"),
                ("MQTT_PASSWORD", "secret"),
                ("MQTT_TOPIC_TEMP", "pi/cpu_temp"),
                ("MQTT_TOPIC_DISK", "pi/disk_usage"),
                ("TEST_MODE", "True"),
            ]))
            .unwrap();

        assert_eq!(config.mqtt.server, "env.local");
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.mqtt.user.as_deref(), Some("pi"));
        assert_eq!(config.mqtt.password.as_deref(), Some("secret"));
        assert_eq!(config.topics.topic_for(CPU_TEMPERATURE), "pi/cpu_temp");
        assert_eq!(config.topics.topic_for(DISK_USAGE), "pi/disk_usage");
        assert!(config.schedule.test_mode);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = AgentConfig::parse(r#"{ mqtt: { server: "file.local" } }"#).unwrap();
        config.apply_env(env(&[("MQTT_SERVER", ""), ("MQTT_USER", "  ")])).unwrap();

        assert_eq!(config.mqtt.server, "file.local");
        assert_eq!(config.mqtt.user, None);
    }

    #[test]
    fn test_invalid_env_values() {
        let mut config = AgentConfig::default();
        assert!(config.apply_env(env(&[("MQTT_PORT", "mqtt")])).is_err());
        assert!(config.apply_env(env(&[("TEST_MODE", "maybe")])).is_err());
    }

    #[test]
    fn test_no_sensors_fails_validation() {
        let config = AgentConfig::parse(
            r#"{ mqtt: { server: "broker.local" }, sensors: { cpu_temperature: false, disk_usage: false } }"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_client_id() {
        let mut config = AgentConfig::default();
        config.resolve_client_id();
        assert!(config.mqtt.client_id.starts_with("pistatus-"));

        let mut config = AgentConfig::default();
        config.mqtt.client_id = "pi4-kitchen".to_string();
        config.resolve_client_id();
        assert_eq!(config.mqtt.client_id, "pi4-kitchen");
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("ON"), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag(""), None);
    }
}
