use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::SourceResult;

/// One instantaneous power reading.
///
/// Either field may be `None` when the corresponding backend cannot answer;
/// absence means "no data", never "zero watts". All values are milliwatts.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PowerSample {
    /// CPU package power (cores + cache), excluding other components.
    pub package_mw: Option<f64>,

    /// Whole-device power draw, when a platform-level rail exposes it.
    pub system_mw: Option<f64>,

    pub timestamp: DateTime<Utc>,
}

impl PowerSample {
    pub fn new(package_mw: Option<f64>, system_mw: Option<f64>) -> Self {
        Self {
            package_mw,
            system_mw,
            timestamp: Utc::now(),
        }
    }

    /// True when neither rail produced a reading.
    pub fn is_empty(&self) -> bool {
        self.package_mw.is_none() && self.system_mw.is_none()
    }
}

/// A backend that can produce a current power reading.
///
/// `read()` may block on driver I/O; callers are expected to run it off the
/// hot path and impose their own timeout.
pub trait PowerSource: Send {
    fn read(&mut self) -> SourceResult<PowerSample>;

    /// Human-readable backend name for logs and the debug command.
    fn name(&self) -> &'static str;
}
