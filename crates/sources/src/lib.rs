//! Sample sources for wattop.
//!
//! This crate defines the two contracts the attribution engine is written
//! against — [`PowerSource`] and [`UtilizationSource`] — plus the concrete
//! Linux backends that implement them. The engine never sees anything more
//! specific than these traits, so swapping a sysfs reader for a remote
//! metrics client is a construction-time decision.

mod error;
mod power;
mod rapl;
mod sysinfo_util;
mod utilization;

pub use error::SourceError;
pub use power::{PowerSample, PowerSource};
pub use rapl::RaplPower;
pub use sysinfo_util::SysinfoUtilization;
pub use utilization::{UtilizationSample, UtilizationSource};

/// Result alias used by every `read()` in this crate.
pub type SourceResult<T> = std::result::Result<T, SourceError>;
