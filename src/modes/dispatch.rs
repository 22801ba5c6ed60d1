use anyhow::{Result, anyhow};
use serde::Serialize;
use tracing::info;

use campus_alert::dispatch::{DeliveryReport, DispatchConfig, Dispatcher, SimulatedTransport};

use super::shared::{JsonlSink, build_pipeline, load_incidents, must_env};

#[derive(Serialize)]
struct DispatchLine<'a> {
    incident_id: &'a str,
    deliveries: Vec<DeliveryReport>,
}

/// Plan every incident and deliver it through the simulated transport.
pub(super) async fn run() -> Result<()> {
    let input_path = must_env("INCIDENT_PATH")?;
    let reports = load_incidents(&input_path)?;
    if reports.is_empty() {
        return Err(anyhow!("Incident input is empty: {input_path}"));
    }

    let pipeline = build_pipeline()?;
    let dispatcher =
        Dispatcher::for_pipeline(SimulatedTransport::from_env(), &pipeline, DispatchConfig::from_env());
    info!("Targeting: {pipeline}");
    info!("Dispatcher: {dispatcher}");
    let mut sink = JsonlSink::from_env()?;

    let mut sent = 0usize;
    let mut failed = 0usize;
    for report in &reports {
        let plan = pipeline.plan(report)?;
        let deliveries = dispatcher.deliver(&plan).await;
        sent += deliveries.iter().filter(|d| d.is_success()).count();
        failed += deliveries.iter().filter(|d| !d.is_success()).count();
        sink.write(&DispatchLine {
            incident_id: &plan.incident_id,
            deliveries,
        })?;
    }
    sink.finish()?;

    info!(
        "Dispatch complete: incidents={}, sent={}, not_sent={}",
        reports.len(),
        sent,
        failed
    );
    Ok(())
}
