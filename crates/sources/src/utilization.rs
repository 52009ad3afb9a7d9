use std::collections::HashMap;

use crate::SourceResult;

/// Per-process CPU utilization for one tick.
///
/// Keys are process *names*, not PIDs: several OS processes sharing an
/// executable name are folded into one entry by summing their percentages.
/// That aliasing is deliberate — the accumulation key downstream is the name,
/// so restarted or multi-instance programs keep one energy record.
///
/// Percentages are scaled so that one fully busy core is 100, meaning a
/// single value (and `total_percent`) can legitimately exceed 100 on
/// multi-core machines.
#[derive(Debug, Clone, Default)]
pub struct UtilizationSample {
    pub per_process: HashMap<String, f64>,
    pub total_percent: f64,
}

impl UtilizationSample {
    /// Fold a per-PID observation into the per-name map.
    pub fn add(&mut self, name: &str, percent: f64) {
        if percent < 0.0 {
            return;
        }
        *self.per_process.entry(name.to_string()).or_insert(0.0) += percent;
    }
}

/// A backend that can enumerate per-process CPU utilization.
pub trait UtilizationSource: Send {
    fn read(&mut self) -> SourceResult<UtilizationSample>;

    fn name(&self) -> &'static str;
}
