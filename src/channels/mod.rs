//! Delivery channels: static registry, per-recipient handle rules and
//! message templates.
mod channels_tests;
pub mod rate_limit;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::directory::Recipient;

pub use rate_limit::{Acquire, MemoryRateLimits, RateLimitStore, SqliteRateLimits};

// ───────────────────────────── Kinds ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Sms,
    Email,
    AppPush,
    Phone,
    Radio,
    DigitalSignage,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 6] = [
        Self::Sms,
        Self::Email,
        Self::AppPush,
        Self::Phone,
        Self::Radio,
        Self::DigitalSignage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
            Self::AppPush => "app_push",
            Self::Phone => "phone",
            Self::Radio => "radio",
            Self::DigitalSignage => "digital_signage",
        }
    }

    /// The contact handle this kind needs, if the recipient has one.
    /// Blank handles count as missing.
    pub fn handle(self, recipient: &Recipient) -> Option<&str> {
        let slot = match self {
            Self::Sms | Self::Phone => &recipient.phone_number,
            Self::Email => &recipient.email,
            Self::AppPush => &recipient.device_token,
            Self::Radio => &recipient.radio_id,
            Self::DigitalSignage => &recipient.signage_area_id,
        };
        slot.as_deref().filter(|h| !h.trim().is_empty())
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidArgument(format!("unknown channel kind {s:?}")))
    }
}

// ───────────────────────────── Content ───────────────────────────────────

/// Incident text every template can draw on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    pub incident_type: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub action_required: String,
    /// Upper-case severity label, e.g. `CRITICAL`.
    pub severity: String,
    pub details_url: String,
}

impl MessageContent {
    fn field(&self, key: &str) -> Option<&str> {
        let v = match key {
            "incident_type" => &self.incident_type,
            "summary" => &self.summary,
            "description" => &self.description,
            "location" => &self.location,
            "action_required" => &self.action_required,
            "severity" => &self.severity,
            "details_url" => &self.details_url,
            _ => return None,
        };
        Some(v.as_str())
    }

    /// Sentence used when a template cannot be rendered.
    pub fn fallback_message(&self) -> String {
        format!(
            "ALERT: {} at {}. {}",
            self.incident_type, self.location, self.action_required
        )
    }
}

/// Substitute `{name}` placeholders; `{{` and `}}` are literal braces.
///
/// Returns `None` on an unknown placeholder or an unbalanced brace.
pub fn render_template(template: &str, content: &MessageContent) -> Option<String> {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(i) = rest.find(['{', '}']) {
        out.push_str(&rest[..i]);
        let tail = &rest[i..];
        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
        } else if tail.starts_with('{') {
            let end = tail.find('}')?;
            out.push_str(content.field(&tail[1..end])?);
            rest = &tail[end + 1..];
        } else {
            return None;
        }
    }
    out.push_str(rest);
    Some(out)
}

// ───────────────────────────── Channels ──────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub kind: ChannelKind,
    /// 1 = most urgent / intrusive.
    pub priority_tier: u8,
    pub rate_limit_secs: u64,
    pub template: String,
}

impl Channel {
    pub fn new(
        kind: ChannelKind,
        name: impl Into<String>,
        priority_tier: u8,
        rate_limit_secs: u64,
        template: impl Into<String>,
    ) -> Self {
        Self {
            id: kind.as_str().to_string(),
            name: name.into(),
            kind,
            priority_tier,
            rate_limit_secs,
            template: template.into(),
        }
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs(self.rate_limit_secs)
    }

    /// Rendered template, or the generic sentence on a template miss.
    pub fn render(&self, content: &MessageContent) -> String {
        render_template(&self.template, content).unwrap_or_else(|| content.fallback_message())
    }
}

const DEFAULT_CHANNELS: &[(ChannelKind, &str, u8, u64, &str)] = &[
    (
        ChannelKind::Sms,
        "SMS Text Message",
        1,
        300,
        "ALERT: {incident_type} at {location}. {action_required}. More info: {details_url}",
    ),
    (
        ChannelKind::AppPush,
        "Mobile App Push Notification",
        2,
        60,
        "🚨 {severity} ALERT: {summary}. {action_required}",
    ),
    (
        ChannelKind::Email,
        "Email",
        3,
        600,
        "CAMPUS ALERT: {incident_type}\n\nLocation: {location}\n\nDetails: {description}\n\n\
         Recommended action: {action_required}\n\nUpdates will be provided as available.",
    ),
    (
        ChannelKind::Phone,
        "Automated Phone Call",
        1,
        1800,
        "This is an automated emergency notification from UC San Diego. {summary}. {action_required}.",
    ),
    (
        ChannelKind::Radio,
        "Emergency Radio",
        1,
        120,
        "Attention all units. {incident_type} reported at {location}. {action_required}.",
    ),
    (
        ChannelKind::DigitalSignage,
        "Digital Signage",
        2,
        300,
        "{severity} ALERT: {summary}. {action_required}",
    ),
];

/// Static channel configuration, loaded once.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ChannelRegistry {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    pub fn with_defaults() -> Self {
        let channels = DEFAULT_CHANNELS
            .iter()
            .map(|&(kind, name, tier, secs, template)| Channel::new(kind, name, tier, secs, template))
            .collect();
        Self { channels }
    }

    pub fn get(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Most urgent first; equal tiers keep registry order.
    pub fn by_urgency(&self) -> Vec<&Channel> {
        let mut sorted: Vec<&Channel> = self.channels.iter().collect();
        sorted.sort_by_key(|c| c.priority_tier);
        sorted
    }
}

impl fmt::Display for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self
            .channels
            .iter()
            .map(|c| format!("{}(t{}, {}s)", c.id, c.priority_tier, c.rate_limit_secs))
            .collect();
        write!(f, "channels=[{}]", ids.join(", "))
    }
}
