//! Sample sources.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SampleError;

/// A producer of a single numeric reading.
///
/// Implemented by the hardware sensors, by [`TestRandomSource`], and by any
/// `FnMut() -> Result<f64, SampleError>` closure.
pub trait SampleSource: Send {
    /// Read the current value.
    fn sample(&mut self) -> Result<f64, SampleError>;

    /// Unit of the readings, if any.
    fn unit(&self) -> Option<&str> {
        None
    }
}

impl<F> SampleSource for F
where
    F: FnMut() -> Result<f64, SampleError> + Send,
{
    fn sample(&mut self) -> Result<f64, SampleError> {
        self()
    }
}

/// Pseudo-random readings in `[0, 100)`, used instead of real hardware in test mode.
#[derive(Debug)]
pub struct TestRandomSource {
    rng: StdRng,
    unit: Option<String>,
}

impl TestRandomSource {
    /// Create a generator seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            unit: None,
        }
    }

    /// Create a generator with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            unit: None,
        }
    }

    /// Report readings in the given unit.
    pub fn with_unit(mut self, unit: Option<String>) -> Self {
        self.unit = unit;
        self
    }
}

impl Default for TestRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for TestRandomSource {
    fn sample(&mut self) -> Result<f64, SampleError> {
        Ok(self.rng.random_range(0.0..100.0))
    }

    fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
}
