//! Registry of named sample sources.

use pistatus_common::{FailureKind, FailureReport, Metric, current_timestamp_millis};

use crate::error::{RegistryError, SampleError};
use crate::source::{SampleSource, TestRandomSource};

/// A registered source.
struct Entry {
    name: String,
    source: Box<dyn SampleSource>,
}

/// A source that failed to produce a value this cycle.
#[derive(Debug)]
pub struct SampleFailure {
    /// Name the source was registered under.
    pub name: String,
    /// When the read was attempted (Unix epoch millis).
    pub timestamp: i64,
    /// What went wrong.
    pub error: SampleError,
}

impl SampleFailure {
    /// Structured report for the log.
    pub fn report(&self) -> FailureReport {
        FailureReport::metric(
            &self.name,
            FailureKind::SampleFailed,
            self.error.to_string(),
            self.timestamp,
        )
    }
}

/// Ordered set of named sample sources.
///
/// Sources are sampled in registration order and each read is isolated: a
/// failing source yields a [`SampleFailure`] in its slot while the others
/// still produce metrics.
#[derive(Default)]
pub struct SourceRegistry {
    entries: Vec<Entry>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under a unique name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        source: impl SampleSource + 'static,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(RegistryError::DuplicateName(name));
        }

        tracing::debug!(source = %name, "Sample source registered");
        self.entries.push(Entry {
            name,
            source: Box::new(source),
        });
        Ok(())
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with_source(
        mut self,
        name: impl Into<String>,
        source: impl SampleSource + 'static,
    ) -> Result<Self, RegistryError> {
        self.register(name, source)?;
        Ok(self)
    }

    /// Whether a source is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no source is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sample every source once, in registration order.
    ///
    /// Always returns exactly one result per registered source.
    pub fn sample_all(&mut self) -> Vec<Result<Metric, SampleFailure>> {
        self.entries
            .iter_mut()
            .map(|entry| {
                let timestamp = current_timestamp_millis();
                match entry.source.sample() {
                    Ok(value) => {
                        let metric = Metric::new(&entry.name, value).at(timestamp);
                        Ok(match entry.source.unit() {
                            Some(unit) => metric.with_unit(unit),
                            None => metric,
                        })
                    }
                    Err(error) => Err(SampleFailure {
                        name: entry.name.clone(),
                        timestamp,
                        error,
                    }),
                }
            })
            .collect()
    }

    /// Replace every source with a [`TestRandomSource`], keeping names and units.
    pub fn into_test_mode(self) -> Self {
        let entries = self
            .entries
            .into_iter()
            .map(|entry| {
                let unit = entry.source.unit().map(str::to_string);
                Entry {
                    name: entry.name,
                    source: Box::new(TestRandomSource::new().with_unit(unit)),
                }
            })
            .collect();

        Self { entries }
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(value: f64) -> impl FnMut() -> Result<f64, SampleError> + Send {
        move || Ok(value)
    }

    fn failing(msg: &'static str) -> impl FnMut() -> Result<f64, SampleError> + Send {
        move || Err(SampleError::unavailable(msg))
    }

    struct Celsius(f64);

    impl SampleSource for Celsius {
        fn sample(&mut self) -> Result<f64, SampleError> {
            Ok(self.0)
        }

        fn unit(&self) -> Option<&str> {
            Some("°C")
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = SourceRegistry::new();
        registry.register("cpu_temperature", fixed(40.0)).unwrap();

        let err = registry.register("cpu_temperature", fixed(41.0)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("cpu_temperature".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sample_all_keeps_registration_order() {
        let mut registry = SourceRegistry::new()
            .with_source("disk_usage", fixed(78.9))
            .unwrap()
            .with_source("cpu_temperature", fixed(45.67))
            .unwrap()
            .with_source("load", fixed(0.5))
            .unwrap();

        let results = registry.sample_all();
        let names: Vec<_> = results
            .iter()
            .map(|r| r.as_ref().unwrap().name.as_str())
            .collect();

        assert_eq!(names, ["disk_usage", "cpu_temperature", "load"]);
        assert_eq!(registry.names(), ["disk_usage", "cpu_temperature", "load"]);
    }

    #[test]
    fn test_failure_is_isolated() {
        let mut registry = SourceRegistry::new()
            .with_source("cpu_temperature", failing("no thermal zone"))
            .unwrap()
            .with_source("disk_usage", fixed(78.9))
            .unwrap();

        let results = registry.sample_all();
        assert_eq!(results.len(), 2);

        let failure = results[0].as_ref().unwrap_err();
        assert_eq!(failure.name, "cpu_temperature");
        assert!(failure.error.to_string().contains("no thermal zone"));

        let report = failure.report();
        assert_eq!(report.kind, FailureKind::SampleFailed);
        assert_eq!(report.metric.as_deref(), Some("cpu_temperature"));

        let metric = results[1].as_ref().unwrap();
        assert_eq!(metric.name, "disk_usage");
        assert_eq!(metric.value, 78.9);
    }

    #[test]
    fn test_unit_is_attached() {
        let mut registry = SourceRegistry::new()
            .with_source("cpu_temperature", Celsius(51.0))
            .unwrap();

        let results = registry.sample_all();
        let metric = results[0].as_ref().unwrap();
        assert_eq!(metric.unit.as_deref(), Some("°C"));
    }

    #[test]
    fn test_empty_registry() {
        let mut registry = SourceRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.sample_all().is_empty());
    }

    #[test]
    fn test_test_mode_replaces_values() {
        let mut registry = SourceRegistry::new()
            .with_source("cpu_temperature", Celsius(1000.0))
            .unwrap()
            .with_source("disk_usage", fixed(1000.0))
            .unwrap()
            .into_test_mode();

        let first = registry.sample_all();
        let second = registry.sample_all();

        for (a, b) in first.iter().zip(&second) {
            let (a, b) = (a.as_ref().unwrap(), b.as_ref().unwrap());
            assert_eq!(a.name, b.name);
            assert!((0.0..100.0).contains(&a.value));
            assert!((0.0..100.0).contains(&b.value));
            assert_ne!(a.value, b.value);
        }

        assert_eq!(first[0].as_ref().unwrap().unit.as_deref(), Some("°C"));
        assert_eq!(registry.names(), ["cpu_temperature", "disk_usage"]);
    }
}
