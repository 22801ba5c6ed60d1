//! Incident record (EIDO) consumed from the external classifier.
//!
//! Only the fields the engine needs are modelled; unknown fields are
//! ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geo::Coordinate;
use crate::{Error, Result};

// ───────────────────────────── Priority ──────────────────────────────────

/// Incident urgency, 1 (highest) ..= 5 (lowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    pub const LOWEST: Priority = Priority(5);

    pub fn new(value: u8) -> Result<Self> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidArgument(format!(
                "priority must be in 1..=5, got {value}"
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn severity(self) -> Severity {
        Severity::from_priority(self)
    }
}

impl TryFrom<u8> for Priority {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

// ───────────────────────────── Severity ──────────────────────────────────

/// Text severity level.  Bijective with [`Priority`] through
/// [`PRIORITY_SEVERITY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Information,
    Low,
    Medium,
    High,
    Critical,
}

/// The one mapping between the two representations.  Index = priority - 1.
pub const PRIORITY_SEVERITY: [Severity; 5] = [
    Severity::Critical,
    Severity::High,
    Severity::Medium,
    Severity::Low,
    Severity::Information,
];

impl Severity {
    pub fn from_priority(p: Priority) -> Self {
        PRIORITY_SEVERITY[usize::from(p.get() - 1)]
    }

    pub fn to_priority(self) -> Priority {
        let idx = PRIORITY_SEVERITY
            .iter()
            .position(|s| *s == self)
            .unwrap_or(2);
        Priority(idx as u8 + 1)
    }

    /// Rank on the total order used for threshold comparisons
    /// (`low < medium < high < critical`).  `Information` is off that
    /// scale and ranks as `Medium`.
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Information | Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Information => "INFORMATION",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

// ───────────────────────────── Incident ──────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    #[serde(rename = "incidentID", default)]
    pub incident_id: String,
    pub incident_type: String,
    #[serde(default)]
    pub incident_sub_type: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub location: IncidentLocation,
    #[serde(default)]
    pub details: IncidentDetails,
}

impl Incident {
    /// Minimal incident used by callers that build records by hand.
    pub fn new(incident_type: impl Into<String>, priority: Priority) -> Self {
        Self {
            incident_id: String::new(),
            incident_type: incident_type.into(),
            incident_sub_type: None,
            priority,
            status: "active".into(),
            location: IncidentLocation::default(),
            details: IncidentDetails::default(),
        }
    }

    /// Reported coordinate, if both components are present and finite.
    pub fn coordinates(&self) -> Option<Coordinate> {
        let raw = self.location.coordinates.as_ref()?;
        let c = Coordinate::new(raw.latitude?, raw.longitude?);
        c.is_finite().then_some(c)
    }

    pub fn full_address(&self) -> &str {
        &self.location.address.full_address
    }

    pub fn severity(&self) -> Severity {
        self.priority.severity()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentLocation {
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub coordinates: Option<RawCoordinates>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub full_address: String,
    #[serde(default)]
    pub additional_info: Option<String>,
}

/// Classifier coordinates; either component may be `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCoordinates {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentDetails {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub victims: Victims,
    #[serde(default)]
    pub suspects: Suspects,
    #[serde(default)]
    pub key_facts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Victims {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suspects {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub weapons_involved: bool,
}

// ──────────────────────── Classifier hints ───────────────────────────────

/// The classifier's notification recommendation block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationHints {
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    #[serde(default)]
    pub recommended_notification_scope: Option<ScopeHint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeHint {
    #[serde(default)]
    pub geographic: Option<String>,
    #[serde(default)]
    pub radius_meters: Option<u32>,
    #[serde(default)]
    pub population: Vec<String>,
    #[serde(default)]
    pub notify_authorities: Option<bool>,
}

/// Incident plus the classifier's hints, as handed to the targeting
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub incident: Incident,
    #[serde(default)]
    pub notification: NotificationHints,
}

#[derive(Deserialize)]
struct Envelope {
    eido: IncidentReport,
}

impl IncidentReport {
    pub fn new(incident: Incident) -> Self {
        Self {
            incident,
            notification: NotificationHints::default(),
        }
    }

    /// Parse either a bare `{incident, notification}` document or one
    /// wrapped in an `{"eido": ...}` envelope.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.get("eido").is_some() {
            let env: Envelope = serde_json::from_value(value)?;
            return Ok(env.eido);
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    pub fn scope_hint(&self) -> Option<&ScopeHint> {
        self.notification.recommended_notification_scope.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_table_is_bijective() {
        for p in 1..=5u8 {
            let prio = Priority::new(p).unwrap();
            assert_eq!(prio.severity().to_priority(), prio);
        }
        assert_eq!(Priority::HIGHEST.severity(), Severity::Critical);
        assert_eq!(Priority::LOWEST.severity(), Severity::Information);
    }

    #[test]
    fn only_priority_one_is_critical() {
        let critical: Vec<u8> = (1..=5u8)
            .filter(|p| Priority::new(*p).unwrap().severity() == Severity::Critical)
            .collect();
        assert_eq!(critical, vec![1]);
    }

    #[test]
    fn priority_out_of_range_rejected() {
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(6).is_err());
        let bad = r#"{"incident": {"incidentType": "fire", "priority": 9}}"#;
        assert!(IncidentReport::from_json(bad).is_err());
    }

    #[test]
    fn parses_eido_envelope() {
        let raw = r#"{
            "eido": {
                "eidoVersion": "1.0",
                "incident": {
                    "incidentID": "INC-20240101-ABC123",
                    "incidentType": "fire",
                    "incidentSubType": "building",
                    "priority": 2,
                    "status": "active",
                    "location": {
                        "address": {"fullAddress": "Warren College, UC San Diego"},
                        "coordinates": {"latitude": null, "longitude": null}
                    },
                    "details": {
                        "description": "Kitchen fire",
                        "victims": {"count": 0},
                        "suspects": {"description": "", "weaponsInvolved": false},
                        "keyFacts": ["Evacuation in progress"]
                    }
                },
                "notification": {
                    "recommendedActions": ["Evacuate the building"],
                    "recommendedNotificationScope": {
                        "geographic": "affected_buildings",
                        "population": ["students"],
                        "radius_meters": 200,
                        "notify_authorities": true
                    }
                }
            }
        }"#;
        let report = IncidentReport::from_json(raw).unwrap();
        assert_eq!(report.incident.incident_type, "fire");
        assert_eq!(report.incident.priority.get(), 2);
        assert_eq!(report.incident.coordinates(), None);
        assert_eq!(report.incident.full_address(), "Warren College, UC San Diego");
        assert_eq!(report.incident.details.key_facts.len(), 1);
        let hint = report.scope_hint().unwrap();
        assert_eq!(hint.radius_meters, Some(200));
        assert_eq!(hint.population, vec!["students".to_string()]);
    }

    #[test]
    fn parses_bare_report_with_coordinates() {
        let raw = r#"{"incident": {
            "incidentType": "hazard", "priority": 3,
            "location": {"coordinates": {"latitude": 32.88, "longitude": -117.24}}
        }}"#;
        let report = IncidentReport::from_json(raw).unwrap();
        assert_eq!(
            report.incident.coordinates(),
            Some(Coordinate::new(32.88, -117.24))
        );
        assert!(report.notification.recommended_actions.is_empty());
    }
}
