use anyhow::{Result, anyhow};
use tracing::{info, warn};

use super::shared::{JsonlSink, build_pipeline, load_incidents, must_env};

pub(super) async fn run() -> Result<()> {
    let input_path = must_env("INCIDENT_PATH")?;
    let reports = load_incidents(&input_path)?;
    if reports.is_empty() {
        return Err(anyhow!("Incident input is empty: {input_path}"));
    }

    let pipeline = build_pipeline()?;
    info!("Targeting: {pipeline}");
    let mut sink = JsonlSink::from_env()?;

    let mut planned = 0usize;
    let mut failed = 0usize;
    for report in &reports {
        match pipeline.plan(report) {
            Ok(plan) => {
                sink.write(&plan)?;
                planned += 1;
            }
            Err(e) => {
                warn!("Failed to plan {}: {e}", report.incident.incident_id);
                failed += 1;
            }
        }
    }
    sink.finish()?;

    info!(
        "Planning complete: total={}, planned={}, failed={}",
        reports.len(),
        planned,
        failed
    );
    Ok(())
}
