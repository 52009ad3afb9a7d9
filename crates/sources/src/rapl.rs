//! Intel RAPL powercap backend.
//!
//! Reads cumulative energy counters from `/sys/class/powercap/intel-rapl`
//! and turns the delta between two reads into an instantaneous power figure.
//! `package-*` domains feed the package rail; a `psys` domain, when the
//! platform exposes one, feeds the system rail.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::power::{PowerSample, PowerSource};
use crate::{SourceError, SourceResult};

const POWERCAP_PATH: &str = "/sys/class/powercap/intel-rapl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DomainKind {
    Package,
    Psys,
}

#[derive(Debug)]
struct RaplDomain {
    name: String,
    kind: DomainKind,
    energy_path: PathBuf,
    last_energy_uj: u64,
    last_read: Instant,
}

#[derive(Debug)]
pub struct RaplPower {
    domains: Vec<RaplDomain>,
}

impl RaplPower {
    pub fn new() -> SourceResult<Self> {
        Self::at(Path::new(POWERCAP_PATH))
    }

    /// Discover domains under an explicit powercap root.
    pub fn at(root: &Path) -> SourceResult<Self> {
        let domains = discover_domains(root);
        if domains.is_empty() {
            return Err(SourceError::unavailable(format!(
                "no readable RAPL domain under {} (missing intel_rapl module, \
                 or energy_uj not readable by this user)",
                root.display()
            )));
        }

        debug!(count = domains.len(), "Discovered RAPL domains");
        Ok(Self { domains })
    }

    /// Quick probe used by the startup check and the debug command.
    pub fn is_supported() -> bool {
        Path::new(POWERCAP_PATH).exists()
    }

    /// Domain names, for the debug command.
    pub fn domain_names(&self) -> Vec<&str> {
        self.domains.iter().map(|d| d.name.as_str()).collect()
    }
}

impl PowerSource for RaplPower {
    fn read(&mut self) -> SourceResult<PowerSample> {
        let now = Instant::now();
        let mut package_mw: Option<f64> = None;
        let mut system_mw: Option<f64> = None;
        let mut readable = 0usize;

        for domain in &mut self.domains {
            let energy_uj = match read_counter(&domain.energy_path) {
                Some(v) => v,
                None => continue,
            };
            readable += 1;

            let elapsed = now.duration_since(domain.last_read);
            // Wrapped counters restart the delta from zero, matching the
            // kernel's own reset-to-zero behavior at max_energy_range_uj.
            let delta_uj = if energy_uj >= domain.last_energy_uj {
                energy_uj - domain.last_energy_uj
            } else {
                energy_uj
            };

            domain.last_energy_uj = energy_uj;
            domain.last_read = now;

            if elapsed.is_zero() {
                continue;
            }

            let mw = power_mw(delta_uj, elapsed);
            match domain.kind {
                DomainKind::Package => {
                    *package_mw.get_or_insert(0.0) += mw;
                }
                DomainKind::Psys => {
                    *system_mw.get_or_insert(0.0) += mw;
                }
            }
        }

        if readable == 0 {
            return Err(SourceError::unavailable(
                "all RAPL domains became unreadable",
            ));
        }

        Ok(PowerSample::new(package_mw, system_mw))
    }

    fn name(&self) -> &'static str {
        "rapl"
    }
}

/// Energy delta over wall time, in milliwatts. µJ / µs is watts.
fn power_mw(delta_uj: u64, elapsed: Duration) -> f64 {
    let elapsed_us = elapsed.as_micros() as f64;
    if elapsed_us <= 0.0 {
        return 0.0;
    }
    delta_uj as f64 / elapsed_us * 1000.0
}

fn read_counter(path: &Path) -> Option<u64> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

fn discover_domains(root: &Path) -> Vec<RaplDomain> {
    let mut domains = Vec::new();

    let Ok(entries) = fs::read_dir(root) else {
        return domains;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let energy_path = path.join("energy_uj");
        if !energy_path.exists() {
            continue;
        }

        let name = fs::read_to_string(path.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let kind = if name.starts_with("package") {
            DomainKind::Package
        } else if name.starts_with("psys") {
            DomainKind::Psys
        } else {
            continue;
        };

        // An unreadable counter here usually means we are not root; skip it
        // so new() can report Unavailable when nothing is left.
        let Some(last_energy_uj) = read_counter(&energy_path) else {
            warn!(domain = %name, "RAPL energy counter not readable, skipping");
            continue;
        };

        domains.push(RaplDomain {
            name,
            kind,
            energy_path,
            last_energy_uj,
            last_read: Instant::now(),
        });
    }

    domains
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_domain(root: &Path, dir: &str, name: &str, energy_uj: u64) {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("name"), name).unwrap();
        fs::write(path.join("energy_uj"), energy_uj.to_string()).unwrap();
    }

    #[test]
    fn discovers_package_and_psys_domains() {
        let tmp = tempfile::tempdir().unwrap();
        write_domain(tmp.path(), "intel-rapl:0", "package-0", 1_000_000);
        write_domain(tmp.path(), "intel-rapl:1", "psys", 5_000_000);
        write_domain(tmp.path(), "intel-rapl:2", "dram", 42);

        let rapl = RaplPower::at(tmp.path()).unwrap();
        let mut names = rapl.domain_names();
        names.sort_unstable();
        assert_eq!(names, vec!["package-0", "psys"]);
    }

    #[test]
    fn missing_tree_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = RaplPower::at(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[test]
    fn power_math_uj_over_us_is_watts() {
        // 2 J in 1 s is 2 W, i.e. 2000 mW.
        let mw = power_mw(2_000_000, Duration::from_secs(1));
        assert!((mw - 2000.0).abs() < 1e-9);

        // Half the energy in half the time is the same power.
        let mw = power_mw(1_000_000, Duration::from_millis(500));
        assert!((mw - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn zero_elapsed_yields_zero_power() {
        assert_eq!(power_mw(1_000_000, Duration::ZERO), 0.0);
    }

    #[test]
    fn counter_wrap_produces_sane_sample() {
        let tmp = tempfile::tempdir().unwrap();
        write_domain(tmp.path(), "intel-rapl:0", "package-0", 9_000_000);

        let mut rapl = RaplPower::at(tmp.path()).unwrap();

        // Counter went backwards: kernel reset it. Delta restarts from the
        // new absolute value rather than going negative.
        fs::write(
            tmp.path().join("intel-rapl:0").join("energy_uj"),
            "1000000",
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(10));
        let sample = rapl.read().unwrap();
        let package = sample.package_mw.unwrap();
        assert!(package >= 0.0);
    }
}
