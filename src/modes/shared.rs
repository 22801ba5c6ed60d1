use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use campus_alert::channels::{MemoryRateLimits, RateLimitStore, SqliteRateLimits};
use campus_alert::targeting::TargetingConfig;
use campus_alert::{ChannelRegistry, IncidentReport, LocationCatalog, RecipientDirectory, TargetingPipeline};

pub(super) fn must_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("Missing env var {key}"))
}

pub(super) fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Shared rate-limit file when `RATE_LIMIT_DB_PATH` is set, memory otherwise.
pub(super) fn open_rate_limits() -> Result<Arc<dyn RateLimitStore>> {
    match optional_env("RATE_LIMIT_DB_PATH") {
        Some(path) => {
            let store = SqliteRateLimits::open(&path)
                .with_context(|| format!("failed to open rate-limit database {path}"))?;
            info!("Rate limits: sqlite at {path}");
            Ok(Arc::new(store))
        }
        None => {
            info!("Rate limits: in-memory");
            Ok(Arc::new(MemoryRateLimits::new()))
        }
    }
}

pub(super) fn build_pipeline() -> Result<TargetingPipeline> {
    let catalog = LocationCatalog::from_env();
    let directory = RecipientDirectory::from_env();
    info!("Catalog: {catalog}");
    info!("Directory: {directory}");
    let channels = ChannelRegistry::with_defaults();
    info!("Channels: {channels}");

    let config = TargetingConfig::from_env();
    Ok(TargetingPipeline::with_config(
        catalog.into_shared(),
        directory.into_shared(),
        Arc::new(channels),
        open_rate_limits()?,
        config,
    ))
}

/// One report per file, or one per line.
pub(super) fn load_incidents(path: &str) -> Result<Vec<IncidentReport>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read incident file {path}"))?;
    if let Ok(report) = IncidentReport::from_json(&raw) {
        return Ok(vec![report]);
    }

    let mut reports = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let report = IncidentReport::from_json(line)
            .with_context(|| format!("invalid incident at line {}", idx + 1))?;
        reports.push(report);
    }
    Ok(reports)
}

/// JSONL sink: the file named by `PLAN_OUTPUT_PATH`, else stdout.
pub(super) struct JsonlSink {
    writer: Box<dyn Write>,
}

impl JsonlSink {
    pub(super) fn from_env() -> Result<Self> {
        let writer: Box<dyn Write> = match optional_env("PLAN_OUTPUT_PATH") {
            Some(path) => Box::new(BufWriter::new(open_append(&path)?)),
            None => Box::new(std::io::stdout()),
        };
        Ok(Self { writer })
    }

    pub(super) fn write<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let line = serde_json::to_string(value)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub(super) fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn open_append(path: &str) -> Result<File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory for output file {path}")
            })?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open output file {path}"))
}
