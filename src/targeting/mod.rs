//! Notification targeting: incident report in, per-recipient, per-channel
//! plan out.
//!
//! The pipeline resolves the incident coordinate with a stable catalog
//! lookup (never the jittered resolver), widens the radius by type and
//! priority floors, picks target groups, selects recipients, and assembles
//! rate-limited channel messages.
mod scope;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;
use crate::catalog::{PlaceKind, SharedCatalog};
use crate::channels::{Acquire, ChannelRegistry, MessageContent, RateLimitStore};
use crate::directory::{Preferences, Recipient, SharedDirectory};
use crate::geo::Coordinate;
use crate::incident::{IncidentReport, Priority};

pub use scope::{
    DEFAULT_RADIUS_METERS, GeographicTier, NotificationScope, notification_radius, target_groups,
};

/// Fallback incident location when nothing better is known.
pub const CAMPUS_CENTER: Coordinate = Coordinate::new(32.8801, -117.2340);

const DEFAULT_DETAILS_BASE_URL: &str = "https://alerts.ucsd.edu/details";
const DEFAULT_ACTION: &str = "Please remain aware of your surroundings";
const UNKNOWN_LOCATION: &str = "Unknown location";

// ───────────────────────────── Config ────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TargetingConfig {
    /// Radius used when the classifier does not recommend one.
    pub default_radius_meters: u32,
    pub details_base_url: String,
    /// Local offset for quiet-hour checks.
    pub utc_offset_minutes: i32,
    pub campus_center: Coordinate,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            default_radius_meters: DEFAULT_RADIUS_METERS,
            details_base_url: DEFAULT_DETAILS_BASE_URL.into(),
            utc_offset_minutes: -8 * 60,
            campus_center: CAMPUS_CENTER,
        }
    }
}

impl TargetingConfig {
    /// | Variable                  | Default                            |
    /// |---------------------------|------------------------------------|
    /// | `DEFAULT_RADIUS_METERS`   | `100`                              |
    /// | `DETAILS_BASE_URL`        | `https://alerts.ucsd.edu/details`  |
    /// | `LOCAL_TZ_OFFSET_MINUTES` | `-480`                             |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_radius_meters: std::env::var("DEFAULT_RADIUS_METERS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.default_radius_meters),
            details_base_url: std::env::var("DETAILS_BASE_URL")
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.details_base_url),
            utc_offset_minutes: std::env::var("LOCAL_TZ_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .filter(|m: &i32| m.abs() < 24 * 60)
                .unwrap_or(defaults.utc_offset_minutes),
            ..defaults
        }
    }

    fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        match FixedOffset::east_opt(self.utc_offset_minutes * 60) {
            Some(offset) => now.with_timezone(&offset).hour(),
            None => now.hour(),
        }
    }
}

// ───────────────────────────── Plan types ────────────────────────────────

/// Where the incident coordinate came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordinateSource {
    Reported,
    Catalog { name: String },
    CampusDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPlanEntry {
    pub recipient_id: String,
    pub recipient_name: String,
    pub channel_id: String,
    pub message: String,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    /// Rate-limit record this entry replaced, restored if delivery fails.
    #[serde(skip)]
    pub(crate) previous_sent_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    RateLimited { retry_after_secs: u64 },
    MissingHandle,
    UnknownChannel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedNotification {
    pub recipient_id: String,
    pub channel_id: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Why a recipient was selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientSelection {
    pub recipient_id: String,
    pub distance_meters: f64,
    pub in_target_group: bool,
    pub within_radius: bool,
    pub meets_threshold: bool,
    pub emergency_responder: bool,
    /// Informational; quiet hours do not gate delivery.
    pub quiet_hours: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPlan {
    pub incident_id: String,
    pub generated_at: DateTime<Utc>,
    pub incident_coordinate: Coordinate,
    pub coordinate_source: CoordinateSource,
    pub radius_meters: u32,
    pub target_groups: Vec<String>,
    pub scope: NotificationScope,
    pub content: MessageContent,
    pub selections: Vec<RecipientSelection>,
    pub recipients: Vec<NotificationPlanEntry>,
    pub skipped: Vec<SkippedNotification>,
}

impl NotificationPlan {
    pub fn is_selected(&self, recipient_id: &str) -> bool {
        self.selections.iter().any(|s| s.recipient_id == recipient_id)
    }

    pub fn entries_for<'a>(
        &'a self,
        recipient_id: &'a str,
    ) -> impl Iterator<Item = &'a NotificationPlanEntry> + 'a {
        self.recipients
            .iter()
            .filter(move |e| e.recipient_id == recipient_id)
    }
}

// ───────────────────────────── Pipeline ──────────────────────────────────

pub struct TargetingPipeline {
    catalog: SharedCatalog,
    directory: SharedDirectory,
    channels: Arc<ChannelRegistry>,
    rate_limits: Arc<dyn RateLimitStore>,
    config: TargetingConfig,
}

impl TargetingPipeline {
    pub fn new(
        catalog: SharedCatalog,
        directory: SharedDirectory,
        channels: Arc<ChannelRegistry>,
        rate_limits: Arc<dyn RateLimitStore>,
    ) -> Self {
        Self::with_config(catalog, directory, channels, rate_limits, TargetingConfig::default())
    }

    pub fn with_config(
        catalog: SharedCatalog,
        directory: SharedDirectory,
        channels: Arc<ChannelRegistry>,
        rate_limits: Arc<dyn RateLimitStore>,
        config: TargetingConfig,
    ) -> Self {
        Self {
            catalog,
            directory,
            channels,
            rate_limits,
            config,
        }
    }

    pub fn config(&self) -> &TargetingConfig {
        &self.config
    }

    pub fn directory(&self) -> &SharedDirectory {
        &self.directory
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    pub fn rate_limits(&self) -> &Arc<dyn RateLimitStore> {
        &self.rate_limits
    }

    /// Reported coordinate, else a building/area name contained in the
    /// address, else the campus center.  No jitter.
    pub fn incident_coordinate(&self, report: &IncidentReport) -> (Coordinate, CoordinateSource) {
        let incident = &report.incident;
        if let Some(c) = incident.coordinates() {
            return (c, CoordinateSource::Reported);
        }
        let catalog = self.catalog.read();
        if let Some(place) =
            catalog.lookup_place(incident.full_address(), &[PlaceKind::Building, PlaceKind::Area])
        {
            return (
                place.center,
                CoordinateSource::Catalog {
                    name: place.name.clone(),
                },
            );
        }
        (self.config.campus_center, CoordinateSource::CampusDefault)
    }

    pub fn message_content(&self, report: &IncidentReport) -> MessageContent {
        let incident = &report.incident;
        let summary = match incident.incident_sub_type.as_deref().map(str::trim) {
            Some(sub) if !sub.is_empty() => format!("{}: {sub}", incident.incident_type),
            _ => incident.incident_type.clone(),
        };
        let actions = &report.notification.recommended_actions;
        let action_required = if actions.is_empty() {
            DEFAULT_ACTION.to_string()
        } else {
            actions.join("; ")
        };
        let address = incident.full_address().trim();
        let location = if address.is_empty() {
            UNKNOWN_LOCATION
        } else {
            address
        };

        MessageContent {
            incident_type: incident.incident_type.clone(),
            summary,
            description: incident.details.description.clone(),
            location: location.to_string(),
            action_required,
            severity: incident.severity().label().to_string(),
            details_url: format!(
                "{}/{}",
                self.config.details_base_url.trim_end_matches('/'),
                short_id(&incident.incident_id)
            ),
        }
    }

    /// Channel IDs to try for one recipient, gated by priority.
    fn channel_choice(&self, prefs: &Preferences, priority: Priority) -> Vec<String> {
        let preferred = &prefs.channels;
        let most_urgent = |n: usize| -> Vec<String> {
            self.channels
                .by_urgency()
                .into_iter()
                .filter(|c| preferred.contains(&c.id))
                .take(n)
                .map(|c| c.id.clone())
                .collect()
        };

        match priority.get() {
            1 => {
                let mut seen = BTreeSet::new();
                preferred
                    .iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .cloned()
                    .collect()
            }
            2 => most_urgent(2),
            3 => most_urgent(1),
            _ => ["email", "app_push"]
                .into_iter()
                .find(|low| preferred.iter().any(|p| p.as_str() == *low))
                .map(str::to_string)
                .or_else(|| preferred.first().cloned())
                .into_iter()
                .collect(),
        }
    }

    pub fn plan(&self, report: &IncidentReport) -> Result<NotificationPlan> {
        self.plan_at(report, Utc::now())
    }

    /// [`plan`](Self::plan) with an explicit clock, for rate-limit windows.
    pub fn plan_at(&self, report: &IncidentReport, now: DateTime<Utc>) -> Result<NotificationPlan> {
        let incident = &report.incident;
        let priority = incident.priority;
        let severity = incident.severity();
        let hint = report.scope_hint();

        let (coordinate, coordinate_source) = self.incident_coordinate(report);
        let recommended = hint
            .and_then(|h| h.radius_meters)
            .unwrap_or(self.config.default_radius_meters);
        let radius = notification_radius(incident, recommended);
        let population = hint.map(|h| h.population.as_slice()).unwrap_or_default();
        let groups = target_groups(incident, population);
        let scope = NotificationScope::derive(report, radius, &groups);
        let content = self.message_content(report);
        let local_hour = self.config.local_hour(now);

        debug!(
            "Incident {} at {coordinate} ({coordinate_source:?}): radius={radius}m groups={groups:?}",
            incident.incident_id
        );

        let directory = self.directory.read();
        let mut selections = Vec::new();
        let mut entries = Vec::new();
        let mut skipped = Vec::new();

        for recipient in directory.active_recipients() {
            let distance = recipient.distance_to(coordinate);
            let selection = RecipientSelection {
                recipient_id: recipient.id.clone(),
                distance_meters: distance,
                in_target_group: recipient.groups.iter().any(|g| groups.contains(g)),
                within_radius: distance <= f64::from(radius),
                meets_threshold: recipient
                    .notification_preferences
                    .severity_threshold
                    .admits(severity),
                emergency_responder: recipient.is_emergency_responder(),
                quiet_hours: recipient.notification_preferences.is_quiet_hour(local_hour),
            };

            let by_reach =
                selection.in_target_group && selection.within_radius && selection.meets_threshold;
            let by_override = selection.emergency_responder && priority.get() <= 2;
            if !(by_reach || by_override) {
                continue;
            }
            debug!(
                "Selected {} ({:.0}m, reach={by_reach}, override={by_override})",
                recipient.id, distance
            );

            self.assemble(recipient, priority, &content, now, &mut entries, &mut skipped)?;
            selections.push(selection);
        }
        drop(directory);

        info!(
            "Plan for {}: {} recipients selected, {} messages, {} skipped",
            incident.incident_id,
            selections.len(),
            entries.len(),
            skipped.len()
        );

        Ok(NotificationPlan {
            incident_id: incident.incident_id.clone(),
            generated_at: now,
            incident_coordinate: coordinate,
            coordinate_source,
            radius_meters: radius,
            target_groups: groups.into_iter().collect(),
            scope,
            content,
            selections,
            recipients: entries,
            skipped,
        })
    }

    fn assemble(
        &self,
        recipient: &Recipient,
        priority: Priority,
        content: &MessageContent,
        now: DateTime<Utc>,
        entries: &mut Vec<NotificationPlanEntry>,
        skipped: &mut Vec<SkippedNotification>,
    ) -> Result<()> {
        let skip = |channel_id: &str, reason: SkipReason| SkippedNotification {
            recipient_id: recipient.id.clone(),
            channel_id: channel_id.to_string(),
            reason,
        };

        for channel_id in self.channel_choice(&recipient.notification_preferences, priority) {
            let Some(channel) = self.channels.get(&channel_id) else {
                skipped.push(skip(&channel_id, SkipReason::UnknownChannel));
                continue;
            };
            if channel.kind.handle(recipient).is_none() {
                skipped.push(skip(&channel_id, SkipReason::MissingHandle));
                continue;
            }

            match self
                .rate_limits
                .try_acquire(&recipient.id, &channel.id, channel.rate_limit(), now)?
            {
                Acquire::Limited { retry_after } => {
                    debug!("Rate limited {}/{} for {retry_after:?}", recipient.id, channel.id);
                    let retry_after_secs =
                        retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                    skipped.push(skip(&channel_id, SkipReason::RateLimited { retry_after_secs }));
                }
                Acquire::Granted { previous } => entries.push(NotificationPlanEntry {
                    recipient_id: recipient.id.clone(),
                    recipient_name: recipient.name.clone(),
                    channel_id: channel.id.clone(),
                    message: channel.render(content),
                    priority,
                    timestamp: now,
                    previous_sent_ms: previous,
                }),
            }
        }
        Ok(())
    }
}

/// Last six characters of an incident ID.
fn short_id(id: &str) -> &str {
    id.char_indices()
        .rev()
        .nth(5)
        .map_or(id, |(i, _)| &id[i..])
}

impl fmt::Display for TargetingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "default_radius={}m, details={}, tz_offset={}min, {}",
            self.config.default_radius_meters,
            self.config.details_base_url,
            self.config.utc_offset_minutes,
            self.channels
        )
    }
}
