//! Plan delivery through a channel transport.
//!
//! The shipped [`SimulatedTransport`] only sleeps a per-channel latency; a
//! real provider integration implements [`Transport`].  Every send is bounded
//! by a timeout, and a failed send hands its rate-limit reservation back.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channels::{ChannelKind, ChannelRegistry, RateLimitStore};
use crate::directory::SharedDirectory;
use crate::targeting::{NotificationPlan, NotificationPlanEntry, SkipReason, TargetingPipeline};

// ───────────────────────────── Transport ─────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Provider credentials are missing.
    #[error("{0}")]
    NotConfigured(&'static str),

    #[error("no {0} handle for recipient")]
    MissingHandle(ChannelKind),

    #[error("provider rejected message: {0}")]
    Rejected(String),
}

/// Provider acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub message_id: String,
    /// Provider confirmed the message reached the device.
    pub confirmed: bool,
}

pub trait Transport: Send + Sync {
    fn send(
        &self,
        kind: ChannelKind,
        handle: &str,
        message: &str,
    ) -> impl Future<Output = Result<Receipt, TransportError>> + Send;
}

/// Stand-in for the real providers: fixed latency, credential checks only.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    sms_configured: bool,
    email_configured: bool,
    latency: bool,
}

impl SimulatedTransport {
    /// | Variable        | Effect                                 |
    /// |-----------------|----------------------------------------|
    /// | `SMS_API_KEY`   | SMS sends succeed when set             |
    /// | `SMTP_USERNAME` | with `SMTP_PASSWORD`, email succeeds   |
    /// | `SMTP_PASSWORD` |                                        |
    pub fn from_env() -> Self {
        let set = |key: &str| std::env::var(key).is_ok_and(|v| !v.trim().is_empty());
        Self {
            sms_configured: set("SMS_API_KEY"),
            email_configured: set("SMTP_USERNAME") && set("SMTP_PASSWORD"),
            latency: true,
        }
    }

    /// Every provider configured.
    pub fn permissive() -> Self {
        Self {
            sms_configured: true,
            email_configured: true,
            latency: true,
        }
    }

    /// Skip the artificial latency.
    pub fn without_latency(mut self) -> Self {
        self.latency = false;
        self
    }

    pub fn latency_for(kind: ChannelKind) -> Duration {
        let ms = match kind {
            ChannelKind::Sms | ChannelKind::AppPush | ChannelKind::Radio => 100,
            ChannelKind::Email | ChannelKind::DigitalSignage => 200,
            ChannelKind::Phone => 300,
        };
        Duration::from_millis(ms)
    }
}

impl Transport for SimulatedTransport {
    fn send(
        &self,
        kind: ChannelKind,
        handle: &str,
        message: &str,
    ) -> impl Future<Output = Result<Receipt, TransportError>> + Send {
        async move {
            if handle.trim().is_empty() {
                return Err(TransportError::MissingHandle(kind));
            }
            match kind {
                ChannelKind::Sms if !self.sms_configured => {
                    warn!("No SMS API key available; message not sent");
                    return Err(TransportError::NotConfigured("No API key configured"));
                }
                ChannelKind::Email if !self.email_configured => {
                    warn!("No email credentials available; message not sent");
                    return Err(TransportError::NotConfigured("No email credentials configured"));
                }
                _ => {}
            }

            let preview: String = message.chars().take(50).collect();
            debug!("Sending {kind} to {handle}: {preview}");
            if self.latency {
                tokio::time::sleep(Self::latency_for(kind)).await;
            }
            let id = Uuid::new_v4().simple().to_string();
            Ok(Receipt {
                message_id: format!("{kind}_{}", &id[..12]),
                confirmed: false,
            })
        }
    }
}

impl fmt::Display for SimulatedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SimulatedTransport(sms={}, email={}, latency={})",
            self.sms_configured, self.email_configured, self.latency
        )
    }
}

// ───────────────────────────── Reports ───────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Sent,
    Delivered,
    Failed,
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub recipient_id: String,
    pub channel_id: String,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl DeliveryReport {
    fn pending(entry: &NotificationPlanEntry) -> Self {
        Self {
            recipient_id: entry.recipient_id.clone(),
            channel_id: entry.channel_id.clone(),
            status: DeliveryStatus::Pending,
            message_id: None,
            error: None,
            attempted_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, DeliveryStatus::Sent | DeliveryStatus::Delivered)
    }
}

// ───────────────────────────── Dispatcher ────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            concurrency: 8,
        }
    }
}

impl DispatchConfig {
    /// | Variable               | Default |
    /// |------------------------|---------|
    /// | `DISPATCH_TIMEOUT_MS`  | `2000`  |
    /// | `DISPATCH_CONCURRENCY` | `8`     |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout_ms = std::env::var("DISPATCH_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0);
        let concurrency = std::env::var("DISPATCH_CONCURRENCY")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0);
        Self {
            timeout: timeout_ms.map_or(defaults.timeout, Duration::from_millis),
            concurrency: concurrency.unwrap_or(defaults.concurrency),
        }
    }
}

pub struct Dispatcher<T> {
    transport: T,
    directory: SharedDirectory,
    channels: Arc<ChannelRegistry>,
    rate_limits: Arc<dyn RateLimitStore>,
    config: DispatchConfig,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(
        transport: T,
        directory: SharedDirectory,
        channels: Arc<ChannelRegistry>,
        rate_limits: Arc<dyn RateLimitStore>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            transport,
            directory,
            channels,
            rate_limits,
            config,
        }
    }

    /// Share the pipeline's directory, channels and rate-limit store.
    pub fn for_pipeline(transport: T, pipeline: &TargetingPipeline, config: DispatchConfig) -> Self {
        Self::new(
            transport,
            Arc::clone(pipeline.directory()),
            Arc::clone(pipeline.channels()),
            Arc::clone(pipeline.rate_limits()),
            config,
        )
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send every plan entry, at most `concurrency` at a time.  Reports come
    /// back in plan order, followed by one `rate_limited` report per
    /// throttled pair.
    pub async fn deliver(&self, plan: &NotificationPlan) -> Vec<DeliveryReport> {
        let mut indexed: Vec<(usize, DeliveryReport)> = stream::iter(plan.recipients.iter().enumerate())
            .map(|(idx, entry)| async move { (idx, self.deliver_one(entry).await) })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(idx, _)| *idx);
        let mut reports: Vec<DeliveryReport> = indexed.into_iter().map(|(_, r)| r).collect();

        for skipped in &plan.skipped {
            if let SkipReason::RateLimited { retry_after_secs } = skipped.reason {
                reports.push(DeliveryReport {
                    recipient_id: skipped.recipient_id.clone(),
                    channel_id: skipped.channel_id.clone(),
                    status: DeliveryStatus::RateLimited,
                    message_id: None,
                    error: Some(format!("retry after {retry_after_secs}s")),
                    attempted_at: plan.generated_at,
                    elapsed_ms: 0,
                });
            }
        }

        let sent = reports.iter().filter(|r| r.is_success()).count();
        let failed = reports
            .iter()
            .filter(|r| r.status == DeliveryStatus::Failed)
            .count();
        info!(
            "Delivered plan {}: sent={sent}, failed={failed}, rate_limited={}",
            plan.incident_id,
            reports.len() - sent - failed
        );
        reports
    }

    async fn deliver_one(&self, entry: &NotificationPlanEntry) -> DeliveryReport {
        let mut report = DeliveryReport::pending(entry);
        let started = Instant::now();

        let outcome = match self.target(entry) {
            Err(e) => Err(e),
            Ok((kind, handle)) => {
                match tokio::time::timeout(
                    self.config.timeout,
                    self.transport.send(kind, &handle, &entry.message),
                )
                .await
                {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err(format!(
                        "timed out after {}ms",
                        self.config.timeout.as_millis()
                    )),
                }
            }
        };
        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(receipt) => {
                report.status = if receipt.confirmed {
                    DeliveryStatus::Delivered
                } else {
                    DeliveryStatus::Sent
                };
                report.message_id = Some(receipt.message_id);
            }
            Err(error) => {
                warn!(
                    "Delivery to {} via {} failed: {error}",
                    entry.recipient_id, entry.channel_id
                );
                self.release(entry);
                report.status = DeliveryStatus::Failed;
                report.error = Some(error);
            }
        }
        report
    }

    /// Channel kind and contact handle, read under a short-lived lock.
    fn target(&self, entry: &NotificationPlanEntry) -> Result<(ChannelKind, String), String> {
        let channel = self
            .channels
            .get(&entry.channel_id)
            .ok_or_else(|| format!("unknown channel {}", entry.channel_id))?;
        let directory = self.directory.read();
        let recipient = directory
            .get_recipient(&entry.recipient_id)
            .ok_or_else(|| format!("unknown recipient {}", entry.recipient_id))?;
        let handle = channel
            .kind
            .handle(recipient)
            .ok_or_else(|| TransportError::MissingHandle(channel.kind).to_string())?;
        Ok((channel.kind, handle.to_string()))
    }

    fn release(&self, entry: &NotificationPlanEntry) {
        if let Err(e) = self.rate_limits.release(
            &entry.recipient_id,
            &entry.channel_id,
            entry.timestamp,
            entry.previous_sent_ms,
        ) {
            warn!(
                "Failed to release rate limit for {}/{}: {e}",
                entry.recipient_id, entry.channel_id
            );
        }
    }
}

impl<T: fmt::Display> fmt::Display for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, timeout={}ms, concurrency={}",
            self.transport,
            self.config.timeout.as_millis(),
            self.config.concurrency
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;

    use super::*;
    use crate::catalog::LocationCatalog;
    use crate::channels::MemoryRateLimits;
    use crate::directory::{EMERGENCY_RESPONDERS, Recipient, RecipientDirectory};
    use crate::geo::Coordinate;
    use crate::incident::{Incident, IncidentReport, Priority};

    const WARREN: Coordinate = Coordinate::new(32.8815, -117.2350);

    fn responder(id: &str, channels: &[&str]) -> Recipient {
        let mut r = Recipient::new(id, "officer", WARREN)
            .with_id(id)
            .with_groups([EMERGENCY_RESPONDERS])
            .with_channels(channels.iter().copied());
        r.email = Some(format!("{id}@ucsd.edu"));
        r.phone_number = Some("+15550002222".into());
        r.device_token = Some(format!("token_{id}"));
        r.radio_id = Some(format!("radio_{id}"));
        r
    }

    fn pipeline(recipients: Vec<Recipient>) -> TargetingPipeline {
        let mut dir = RecipientDirectory::new();
        for r in recipients {
            dir.create_recipient(r).unwrap();
        }
        TargetingPipeline::new(
            LocationCatalog::with_seed().into_shared(),
            dir.into_shared(),
            Arc::new(ChannelRegistry::with_defaults()),
            Arc::new(MemoryRateLimits::new()),
        )
    }

    fn fire(priority: u8) -> IncidentReport {
        let mut incident = Incident::new("fire", Priority::new(priority).unwrap());
        incident.incident_id = "INC-1".into();
        incident.location.address.full_address = "Warren College".into();
        IncidentReport::new(incident)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
    }

    /// Fails or stalls on chosen kinds, confirms everything else.
    struct ScriptedTransport {
        failing: HashSet<ChannelKind>,
        stalling: HashSet<ChannelKind>,
    }

    impl Transport for ScriptedTransport {
        fn send(
            &self,
            kind: ChannelKind,
            _handle: &str,
            _message: &str,
        ) -> impl Future<Output = Result<Receipt, TransportError>> + Send {
            async move {
                if self.stalling.contains(&kind) {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                if self.failing.contains(&kind) {
                    return Err(TransportError::Rejected("bounced".into()));
                }
                Ok(Receipt {
                    message_id: format!("{kind}-ok"),
                    confirmed: true,
                })
            }
        }
    }

    #[tokio::test]
    async fn simulated_transport_checks_credentials() {
        let strict = SimulatedTransport {
            sms_configured: false,
            email_configured: false,
            latency: false,
        };
        let err = strict.send(ChannelKind::Sms, "+1555", "hi").await.unwrap_err();
        assert_eq!(err.to_string(), "No API key configured");
        assert!(strict.send(ChannelKind::Email, "a@b.c", "hi").await.is_err());
        assert!(strict.send(ChannelKind::Radio, "radio_1", "hi").await.is_ok());

        let open = SimulatedTransport::permissive().without_latency();
        let receipt = open.send(ChannelKind::Sms, "+1555", "hi").await.unwrap();
        assert!(receipt.message_id.starts_with("sms_"));
        assert!(!receipt.confirmed);
        assert_eq!(
            open.send(ChannelKind::AppPush, " ", "hi").await,
            Err(TransportError::MissingHandle(ChannelKind::AppPush))
        );
    }

    #[tokio::test]
    async fn delivers_in_plan_order() {
        let p = pipeline(vec![responder("a", &["sms", "radio"]), responder("b", &["app_push"])]);
        let plan = p.plan_at(&fire(1), t0()).unwrap();
        let dispatcher = Dispatcher::for_pipeline(
            SimulatedTransport::permissive(),
            &p,
            DispatchConfig::default(),
        );

        let reports = dispatcher.deliver(&plan).await;
        let order: Vec<(&str, &str)> = reports
            .iter()
            .map(|r| (r.recipient_id.as_str(), r.channel_id.as_str()))
            .collect();
        assert_eq!(order, vec![("a", "sms"), ("a", "radio"), ("b", "app_push")]);
        assert!(reports.iter().all(|r| r.status == DeliveryStatus::Sent));
    }

    #[tokio::test]
    async fn timeout_marks_failed_and_releases_reservation() {
        let p = pipeline(vec![responder("a", &["phone", "radio"])]);
        let plan = p.plan_at(&fire(1), t0()).unwrap();
        let transport = ScriptedTransport {
            failing: HashSet::new(),
            stalling: HashSet::from([ChannelKind::Phone]),
        };
        let config = DispatchConfig {
            timeout: Duration::from_millis(50),
            concurrency: 4,
        };
        let dispatcher = Dispatcher::for_pipeline(transport, &p, config);

        let reports = dispatcher.deliver(&plan).await;
        assert_eq!(reports[0].status, DeliveryStatus::Failed);
        assert!(reports[0].error.as_deref().unwrap().contains("timed out"));
        assert_eq!(reports[1].status, DeliveryStatus::Delivered);

        // The failed pair may be re-planned at once; the delivered one may not.
        let again = p.plan_at(&fire(1), t0() + chrono::TimeDelta::seconds(1)).unwrap();
        let channels: Vec<&str> = again.recipients.iter().map(|e| e.channel_id.as_str()).collect();
        assert_eq!(channels, vec!["phone"]);
    }

    #[tokio::test]
    async fn failure_reports_error_and_rate_limited_pairs() {
        let p = pipeline(vec![responder("a", &["email"])]);
        p.plan_at(&fire(1), t0()).unwrap();
        let throttled = p.plan_at(&fire(1), t0() + chrono::TimeDelta::seconds(5)).unwrap();

        let transport = ScriptedTransport {
            failing: HashSet::from([ChannelKind::Email]),
            stalling: HashSet::new(),
        };
        let dispatcher = Dispatcher::for_pipeline(transport, &p, DispatchConfig::default());
        let reports = dispatcher.deliver(&throttled).await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, DeliveryStatus::RateLimited);

        let fresh = pipeline(vec![responder("b", &["email"])]);
        let plan = fresh.plan_at(&fire(1), t0()).unwrap();
        let transport = ScriptedTransport {
            failing: HashSet::from([ChannelKind::Email]),
            stalling: HashSet::new(),
        };
        let dispatcher = Dispatcher::for_pipeline(transport, &fresh, DispatchConfig::default());
        let reports = dispatcher.deliver(&plan).await;
        assert_eq!(reports[0].status, DeliveryStatus::Failed);
        assert_eq!(
            reports[0].error.as_deref(),
            Some("provider rejected message: bounced")
        );
        assert_eq!(fresh.rate_limits().last_sent("b", "email").unwrap(), None);
    }
}
