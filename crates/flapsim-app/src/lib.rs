//! Shared plumbing for the flapsim command line runner.

use std::path::Path;

use anyhow::{Context, Result};
use flapsim_core::FlapConfig;

pub mod observer;
pub mod runner;

pub use observer::TraceObserver;
pub use runner::{GenerationRunner, GenerationSummary, RunError, RunSummary, StopReason};

/// Load a configuration file, falling back to defaults for every omitted field.
pub fn load_config(path: Option<&Path>) -> Result<FlapConfig> {
    let Some(path) = path else {
        return Ok(FlapConfig::default());
    };
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("config file {} did not contain valid JSON", path.display()))
}

/// Write a run summary as pretty-printed JSON.
pub fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("failed to serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write run report {}", path.display()))
}
