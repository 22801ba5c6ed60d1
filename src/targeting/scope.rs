//! Radius, target-group and scope rules keyed by incident type and
//! priority.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::directory::EMERGENCY_RESPONDERS;
use crate::incident::{Incident, IncidentReport, Priority};

pub const DEFAULT_RADIUS_METERS: u32 = 100;
pub const FIRE_FLOOR_METERS: u32 = 300;
pub const ACTIVE_THREAT_FLOOR_METERS: u32 = 2000;
pub const CAMPUS_WIDE_METERS: u32 = 2000;

/// Incident-type fragments that mean an armed or active threat.
const ACTIVE_THREAT_KEYWORDS: &[&str] = &["active_threat", "shooter", "weapon", "armed", "gun"];

/// `(type fragments, groups added)`
const TYPE_GROUPS: &[(&[&str], &[&str])] = &[
    (&["fire"], &["facilities", "building_managers"]),
    (&["crime", "assault", "robbery"], &["police", "security"]),
    (
        &["hazard", "chemical", "gas_leak"],
        &["facilities", "environmental_safety"],
    ),
];

const PRIORITY_ONE_GROUPS: &[&str] = &["leadership", "campus_police"];

fn type_lower(incident: &Incident) -> String {
    incident.incident_type.to_lowercase()
}

fn is_fire(kind: &str) -> bool {
    kind.contains("fire")
}

fn is_active_threat(kind: &str) -> bool {
    ACTIVE_THREAT_KEYWORDS.iter().any(|k| kind.contains(k))
}

fn priority_floor(priority: Priority) -> u32 {
    match priority.get() {
        1 => 500,
        2 => 300,
        _ => 0,
    }
}

/// Recommended radius raised to every applicable floor.  Floors combine
/// by max.
pub fn notification_radius(incident: &Incident, recommended: u32) -> u32 {
    let kind = type_lower(incident);
    let mut radius = recommended;
    if is_fire(&kind) {
        radius = radius.max(FIRE_FLOOR_METERS);
    }
    if is_active_threat(&kind) {
        radius = radius.max(ACTIVE_THREAT_FLOOR_METERS);
    }
    radius.max(priority_floor(incident.priority))
}

/// Responders, plus the hinted population, plus type and priority groups.
pub fn target_groups(incident: &Incident, population: &[String]) -> BTreeSet<String> {
    let kind = type_lower(incident);
    let mut groups = BTreeSet::from([EMERGENCY_RESPONDERS.to_string()]);
    groups.extend(
        population
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .map(str::to_string),
    );

    for (fragments, added) in TYPE_GROUPS {
        if fragments.iter().any(|f| kind.contains(f)) {
            groups.extend(added.iter().map(|g| g.to_string()));
        }
    }
    if incident.priority == Priority::HIGHEST {
        groups.extend(PRIORITY_ONE_GROUPS.iter().map(|g| g.to_string()));
    }
    groups
}

// ───────────────────────────── Scope ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeographicTier {
    ImmediateVicinity,
    AffectedBuilding,
    AffectedArea,
    CampusSection,
    CampusWide,
}

impl GeographicTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImmediateVicinity => "immediate_vicinity",
            Self::AffectedBuilding => "affected_building",
            Self::AffectedArea => "affected_area",
            Self::CampusSection => "campus_section",
            Self::CampusWide => "campus_wide",
        }
    }

    /// Lenient parse of classifier wording (`affected_buildings`,
    /// `Campus-Wide`, ...).
    pub fn from_hint(raw: &str) -> Option<Self> {
        let norm = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match norm.as_str() {
            "immediate_vicinity" | "vicinity" => Some(Self::ImmediateVicinity),
            "affected_building" | "affected_buildings" | "building" => Some(Self::AffectedBuilding),
            "affected_area" | "affected_areas" | "area" => Some(Self::AffectedArea),
            "campus_section" | "campus_sections" | "section" => Some(Self::CampusSection),
            "campus_wide" | "campus" | "campuswide" => Some(Self::CampusWide),
            _ => None,
        }
    }
}

impl fmt::Display for GeographicTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who and how far to notify; built once per incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationScope {
    pub geographic: GeographicTier,
    pub radius_meters: u32,
    pub population: Vec<String>,
    pub notify_authorities: bool,
}

impl NotificationScope {
    pub fn derive(report: &IncidentReport, radius_meters: u32, groups: &BTreeSet<String>) -> Self {
        let incident = &report.incident;
        let hint = report.scope_hint();
        let kind = type_lower(incident);

        let hinted = hint
            .and_then(|h| h.geographic.as_deref())
            .and_then(GeographicTier::from_hint);
        let mut geographic = hinted.unwrap_or(match incident.priority.get() {
            1 => GeographicTier::CampusWide,
            2 => GeographicTier::CampusSection,
            _ if is_fire(&kind) => GeographicTier::AffectedBuilding,
            _ => GeographicTier::ImmediateVicinity,
        });
        if radius_meters >= CAMPUS_WIDE_METERS {
            geographic = GeographicTier::CampusWide;
        }

        let notify_authorities = hint.and_then(|h| h.notify_authorities).unwrap_or(
            incident.priority.get() <= 2 || incident.details.suspects.weapons_involved,
        );

        Self {
            geographic,
            radius_meters,
            population: groups.iter().cloned().collect(),
            notify_authorities,
        }
    }
}
