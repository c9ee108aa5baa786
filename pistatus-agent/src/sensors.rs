//! Hardware sample sources.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sysinfo::{Components, Disks};

use pistatus_publisher::{SampleError, SampleSource};

/// CPU temperature in °C.
///
/// Reads the kernel thermal zone (millidegrees Celsius). When the zone does
/// not exist the hottest hwmon component reported by `sysinfo` is used
/// instead.
pub struct CpuTemperatureSource {
    thermal_zone: PathBuf,
    components: Option<Components>,
}

impl CpuTemperatureSource {
    pub fn new(thermal_zone: impl Into<PathBuf>) -> Self {
        Self {
            thermal_zone: thermal_zone.into(),
            components: None,
        }
    }

    fn read_zone(&self) -> Result<Option<f64>, SampleError> {
        match std::fs::read_to_string(&self.thermal_zone) {
            Ok(content) => parse_millidegrees(&content).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SampleError::Io {
                path: self.thermal_zone.display().to_string(),
                source,
            }),
        }
    }

    fn hottest_component(&mut self) -> Option<f64> {
        let components = self
            .components
            .get_or_insert_with(Components::new_with_refreshed_list);
        components.refresh(true);

        components
            .list()
            .iter()
            .filter_map(|c| c.temperature())
            .filter(|t| t.is_finite())
            .map(f64::from)
            .reduce(f64::max)
    }
}

impl std::fmt::Debug for CpuTemperatureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuTemperatureSource")
            .field("thermal_zone", &self.thermal_zone)
            .field("fallback", &self.components.is_some())
            .finish()
    }
}

impl SampleSource for CpuTemperatureSource {
    fn sample(&mut self) -> Result<f64, SampleError> {
        if let Some(celsius) = self.read_zone()? {
            return Ok(celsius);
        }

        tracing::debug!(
            path = %self.thermal_zone.display(),
            "Thermal zone missing, falling back to hwmon components"
        );
        self.hottest_component().ok_or_else(|| {
            SampleError::unavailable(format!(
                "no thermal zone at {} and no temperature sensors",
                self.thermal_zone.display()
            ))
        })
    }

    fn unit(&self) -> Option<&str> {
        Some("°C")
    }
}

/// Used space of one mount point, in percent.
///
/// Uses `statvfs` and counts blocks reserved for root as neither used nor
/// available, the same figure `df` prints. Falls back to the `sysinfo` disk
/// list when `statvfs` cannot be called.
pub struct DiskUsageSource {
    mount: PathBuf,
    disks: Option<Disks>,
}

impl DiskUsageSource {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
            disks: None,
        }
    }

    /// Mount point being reported.
    pub fn mount(&self) -> &Path {
        &self.mount
    }

    #[cfg(unix)]
    fn statvfs_usage(&self) -> Option<Result<f64, SampleError>> {
        match nix::sys::statvfs::statvfs(self.mount.as_path()) {
            Ok(stat) => Some(
                df_usage_percent(
                    u64::from(stat.blocks()),
                    u64::from(stat.blocks_free()),
                    u64::from(stat.blocks_available()),
                )
                .ok_or_else(|| {
                    SampleError::unavailable(format!("{} reports zero size", self.mount.display()))
                }),
            ),
            Err(errno) => {
                tracing::debug!(
                    mount = %self.mount.display(),
                    error = %errno,
                    "statvfs failed, falling back to disk list"
                );
                None
            }
        }
    }

    #[cfg(not(unix))]
    fn statvfs_usage(&self) -> Option<Result<f64, SampleError>> {
        None
    }

    fn disk_list_usage(&mut self) -> Result<f64, SampleError> {
        let disks = self
            .disks
            .get_or_insert_with(Disks::new_with_refreshed_list);
        disks.refresh(true);

        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == self.mount.as_path())
            .ok_or_else(|| {
                SampleError::unavailable(format!("no disk mounted at {}", self.mount.display()))
            })?;

        usage_percent(disk.total_space(), disk.available_space()).ok_or_else(|| {
            SampleError::unavailable(format!("{} reports zero size", self.mount.display()))
        })
    }
}

impl std::fmt::Debug for DiskUsageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskUsageSource")
            .field("mount", &self.mount)
            .field("fallback", &self.disks.is_some())
            .finish()
    }
}

impl SampleSource for DiskUsageSource {
    fn sample(&mut self) -> Result<f64, SampleError> {
        match self.statvfs_usage() {
            Some(usage) => usage,
            None => self.disk_list_usage(),
        }
    }

    fn unit(&self) -> Option<&str> {
        Some("%")
    }
}

/// Parse a thermal zone reading (millidegrees Celsius) into °C.
pub fn parse_millidegrees(content: &str) -> Result<f64, SampleError> {
    let trimmed = content.trim();
    trimmed
        .parse::<i64>()
        .map(|milli| milli as f64 / 1000.0)
        .map_err(|_| SampleError::Parse(format!("'{}' is not a millidegree value", trimmed)))
}

/// Used share of a filesystem as `df` computes it, `None` when empty.
///
/// `used = blocks - free`, and the percentage is taken over
/// `used + available`, so root-reserved blocks are left out of both.
pub fn df_usage_percent(blocks: u64, free: u64, available: u64) -> Option<f64> {
    let used = blocks.saturating_sub(free);
    let usable = used + available;
    if usable == 0 {
        return None;
    }
    Some((used as f64 / usable as f64) * 100.0)
}

/// Used share from total and available bytes, `None` when its size is zero.
pub fn usage_percent(total: u64, available: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available);
    Some((used as f64 / total as f64) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_millidegrees() {
        assert_eq!(parse_millidegrees("45678\n").unwrap(), 45.678);
        assert_eq!(parse_millidegrees("-2500").unwrap(), -2.5);
        assert!(matches!(
            parse_millidegrees("hot"),
            Err(SampleError::Parse(_))
        ));
    }

    #[test]
    fn test_usage_percent() {
        assert_eq!(usage_percent(1000, 250), Some(75.0));
        assert_eq!(usage_percent(1000, 1000), Some(0.0));
        assert_eq!(usage_percent(1000, 2000), Some(0.0));
        assert_eq!(usage_percent(0, 0), None);
    }

    #[test]
    fn test_df_usage_excludes_reserved_blocks() {
        // 5 of 100 blocks reserved for root
        let usage = df_usage_percent(100, 50, 45).unwrap();
        assert!((usage - 52.631_578_947).abs() < 1e-6);
        assert_eq!(pistatus_common::round_to_tenth(usage), 52.6);

        // Without reservation it matches total/available.
        assert_eq!(df_usage_percent(1000, 250, 250), Some(75.0));
        assert_eq!(df_usage_percent(1000, 250, 250), usage_percent(1000, 250));
    }

    #[test]
    fn test_df_usage_edge_cases() {
        assert_eq!(df_usage_percent(0, 0, 0), None);
        assert_eq!(df_usage_percent(100, 100, 95), Some(0.0));
        // Only reserved blocks left
        assert_eq!(df_usage_percent(100, 5, 0), Some(100.0));
    }

    #[cfg(unix)]
    #[test]
    fn test_statvfs_on_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DiskUsageSource::new(dir.path());

        let usage = source.sample().unwrap();
        assert!((0.0..=100.0).contains(&usage), "usage {}", usage);
        assert_eq!(source.mount(), dir.path());
    }

    #[test]
    fn test_reads_thermal_zone_file() {
        let mut zone = tempfile::NamedTempFile::new().unwrap();
        writeln!(zone, "51234").unwrap();

        let mut source = CpuTemperatureSource::new(zone.path());
        assert_eq!(source.sample().unwrap(), 51.234);
        assert_eq!(source.unit(), Some("°C"));
    }

    #[test]
    fn test_garbage_in_thermal_zone() {
        let mut zone = tempfile::NamedTempFile::new().unwrap();
        writeln!(zone, "not a number").unwrap();

        let mut source = CpuTemperatureSource::new(zone.path());
        assert!(matches!(source.sample(), Err(SampleError::Parse(_))));
    }

    #[test]
    fn test_missing_zone_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = CpuTemperatureSource::new(dir.path().join("temp"));

        // Either a hwmon sensor exists on this machine or the source reports
        // itself unavailable; it never fails with an I/O error.
        match source.sample() {
            Ok(celsius) => assert!(celsius.is_finite()),
            Err(e) => assert!(matches!(e, SampleError::Unavailable(_))),
        }
    }

    #[test]
    fn test_unknown_mount_is_unavailable() {
        let mut source = DiskUsageSource::new("/definitely/not/a/mount/point");
        assert!(matches!(source.sample(), Err(SampleError::Unavailable(_))));
        assert_eq!(source.unit(), Some("%"));
    }
}
