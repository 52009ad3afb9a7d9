//! sysinfo-backed CPU utilization source.

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use crate::utilization::{UtilizationSample, UtilizationSource};
use crate::{SourceError, SourceResult};

pub struct SysinfoUtilization {
    system: System,
    cpu_count: usize,
}

impl SysinfoUtilization {
    pub fn new() -> SourceResult<Self> {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            process_refresh_kind(),
        );

        let cpu_count = system.cpus().len();
        if cpu_count == 0 {
            return Err(SourceError::unavailable("no CPUs reported by sysinfo"));
        }

        Ok(Self { system, cpu_count })
    }
}

fn process_refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing().with_cpu()
}

impl UtilizationSource for SysinfoUtilization {
    fn read(&mut self) -> SourceResult<UtilizationSample> {
        self.system.refresh_cpu_usage();
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            process_refresh_kind(),
        );

        let mut sample = UtilizationSample::default();

        for process in self.system.processes().values() {
            let cpu = f64::from(process.cpu_usage());
            if cpu <= 0.0 {
                continue;
            }
            sample.add(&process.name().to_string_lossy(), cpu);
        }

        // sysinfo reports per-process usage on a one-core-is-100 scale but
        // the global figure averaged across cores; rescale the total so both
        // sides of the ratio share one unit.
        sample.total_percent = f64::from(self.system.global_cpu_usage()) * self.cpu_count as f64;

        Ok(sample)
    }

    fn name(&self) -> &'static str {
        "sysinfo"
    }
}
