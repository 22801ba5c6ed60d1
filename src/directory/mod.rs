//! Recipient directory: people, their contact handles and preferences, and
//! the groups they belong to.
//!
//! `group.members` and `recipient.groups` are kept in sync by every
//! membership call.  A recipient may also carry tags that name no stored
//! group; targeting matches on tags, so those still count.
mod seed;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::geo::{Coordinate, distance_meters};
use crate::incident::Severity;
use crate::persist::{env_path, read_json, write_json};
use crate::{Error, Result};

pub type SharedDirectory = Arc<RwLock<RecipientDirectory>>;

/// Group every responder belongs to; drives the high-priority override.
pub const EMERGENCY_RESPONDERS: &str = "emergency_responders";

// ───────────────────────────── Preferences ───────────────────────────────

/// Minimum incident severity a recipient wants to hear about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityThreshold {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl SeverityThreshold {
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    /// `rank(threshold) <= rank(severity)`.
    pub fn admits(self, severity: Severity) -> bool {
        self.rank() <= severity.rank()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Channel IDs, most preferred first.
    pub channels: Vec<String>,
    pub severity_threshold: SeverityThreshold,
    pub quiet_hours_start: Option<u8>,
    pub quiet_hours_end: Option<u8>,
    pub opt_out_categories: Vec<String>,
    pub language: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            channels: vec!["email".into(), "app_push".into()],
            severity_threshold: SeverityThreshold::Medium,
            quiet_hours_start: None,
            quiet_hours_end: None,
            opt_out_categories: Vec::new(),
            language: "en".into(),
        }
    }
}

impl Preferences {
    /// Inclusive on both ends; `start > end` wraps past midnight.
    pub fn is_quiet_hour(&self, hour: u32) -> bool {
        let (Some(start), Some(end)) = (self.quiet_hours_start, self.quiet_hours_end) else {
            return false;
        };
        let (start, end) = (u32::from(start), u32::from(end));
        if start <= end {
            (start..=end).contains(&hour)
        } else {
            hour >= start || hour <= end
        }
    }

    fn validate(&self) -> Result<()> {
        for hour in [self.quiet_hours_start, self.quiet_hours_end].into_iter().flatten() {
            if hour > 23 {
                return Err(Error::InvalidArgument(format!(
                    "quiet hour must be in 0..=23, got {hour}"
                )));
            }
        }
        Ok(())
    }
}

// ───────────────────────────── Recipients ────────────────────────────────

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio_id: Option<String>,
    /// Digital signage zone this recipient (a display) is reached through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signage_area_id: Option<String>,
    /// Static home location.
    #[serde(default)]
    pub location: Coordinate,
    #[serde(default)]
    pub notification_preferences: Preferences,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Recipient {
    pub fn new(name: impl Into<String>, role: impl Into<String>, location: Coordinate) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            role: role.into(),
            groups: BTreeSet::new(),
            email: None,
            phone_number: None,
            device_token: None,
            radio_id: None,
            signage_area_id: None,
            location,
            notification_preferences: Preferences::default(),
            metadata: BTreeMap::new(),
            active: true,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notification_preferences.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_threshold(mut self, threshold: SeverityThreshold) -> Self {
        self.notification_preferences.severity_threshold = threshold;
        self
    }

    pub fn is_in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    pub fn is_emergency_responder(&self) -> bool {
        self.is_in_group(EMERGENCY_RESPONDERS)
    }

    pub fn distance_to(&self, point: Coordinate) -> f64 {
        distance_meters(self.location, point)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientGroup {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: BTreeSet<String>,
    /// Informational; [`RecipientDirectory::expand_members`] is the only
    /// place that follows these links.
    #[serde(default)]
    pub parent_groups: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl RecipientGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            members: BTreeSet::new(),
            parent_groups: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_groups.extend(parents.into_iter().map(Into::into));
        self
    }
}

// ───────────────────────────── Patches ───────────────────────────────────

/// Nested partial update of [`Preferences`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesPatch {
    pub channels: Option<Vec<String>>,
    pub severity_threshold: Option<SeverityThreshold>,
    pub quiet_hours_start: Option<u8>,
    pub quiet_hours_end: Option<u8>,
    pub opt_out_categories: Option<Vec<String>>,
    pub language: Option<String>,
}

impl PreferencesPatch {
    fn apply(self, prefs: &mut Preferences) {
        if let Some(v) = self.channels {
            prefs.channels = v;
        }
        if let Some(v) = self.severity_threshold {
            prefs.severity_threshold = v;
        }
        if self.quiet_hours_start.is_some() {
            prefs.quiet_hours_start = self.quiet_hours_start;
        }
        if self.quiet_hours_end.is_some() {
            prefs.quiet_hours_end = self.quiet_hours_end;
        }
        if let Some(v) = self.opt_out_categories {
            prefs.opt_out_categories = v;
        }
        if let Some(v) = self.language {
            prefs.language = v;
        }
    }
}

/// Partial update of a [`Recipient`].  An empty string clears a contact
/// handle.  Group membership changes go through the membership calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipientPatch {
    pub name: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub device_token: Option<String>,
    pub radio_id: Option<String>,
    pub signage_area_id: Option<String>,
    pub location: Option<Coordinate>,
    pub notification_preferences: Option<PreferencesPatch>,
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
    pub active: Option<bool>,
}

fn set_handle(slot: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        *slot = (!v.trim().is_empty()).then_some(v);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_groups: Option<BTreeSet<String>>,
}

fn generated_id(prefix: char) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}{}", &hex[..8])
}

// ───────────────────────────── Directory ─────────────────────────────────

#[derive(Debug, Deserialize)]
struct StoredDirectory {
    #[serde(default)]
    recipients: BTreeMap<String, Recipient>,
    #[serde(default)]
    groups: BTreeMap<String, RecipientGroup>,
}

#[derive(Debug, Default)]
pub struct RecipientDirectory {
    recipients: BTreeMap<String, Recipient>,
    groups: BTreeMap<String, RecipientGroup>,
    path: Option<PathBuf>,
}

impl RecipientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Demo directory: campus responders, leadership, facilities, students
    /// and faculty.
    pub fn with_sample_data() -> Self {
        let mut dir = Self::new();
        let (groups, recipients) = seed::sample();
        for group in groups {
            dir.groups.insert(group.id.clone(), group);
        }
        for recipient in recipients {
            for tag in &recipient.groups {
                if let Some(group) = dir.groups.get_mut(tag) {
                    group.members.insert(recipient.id.clone());
                }
            }
            dir.recipients.insert(recipient.id.clone(), recipient);
        }
        dir
    }

    /// Load from `path`, seeding the sample directory when the file is
    /// missing or unreadable.
    pub fn open(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::with_sample_data();
        };

        let (mut dir, seeded) = match path.exists().then(|| read_json::<StoredDirectory>(&path)) {
            Some(Ok(mut stored)) => {
                // Map keys are authoritative; embedded IDs may be missing.
                for (key, recipient) in &mut stored.recipients {
                    recipient.id.clone_from(key);
                }
                for (key, group) in &mut stored.groups {
                    group.id.clone_from(key);
                }
                info!(
                    "Loaded {} recipients, {} groups from {}",
                    stored.recipients.len(),
                    stored.groups.len(),
                    path.display()
                );
                let dir = Self {
                    recipients: stored.recipients,
                    groups: stored.groups,
                    path: None,
                };
                (dir, false)
            }
            Some(Err(e)) => {
                warn!("Recipient data unreadable ({e}), using sample directory");
                (Self::with_sample_data(), true)
            }
            None => (Self::with_sample_data(), true),
        };

        dir.path = Some(path);
        if seeded {
            dir.persist();
        }
        dir
    }

    /// | Variable          | Default                  |
    /// |-------------------|--------------------------|
    /// | `RECIPIENTS_PATH` | unset: in-memory sample  |
    pub fn from_env() -> Self {
        Self::open(env_path("RECIPIENTS_PATH"))
    }

    pub fn into_shared(self) -> SharedDirectory {
        Arc::new(RwLock::new(self))
    }

    // ── Reads ──

    pub fn get_recipient(&self, id: &str) -> Option<&Recipient> {
        self.recipients.get(id)
    }

    pub fn get_group(&self, id: &str) -> Option<&RecipientGroup> {
        self.groups.get(id)
    }

    pub fn all_recipients(&self) -> impl Iterator<Item = &Recipient> {
        self.recipients.values()
    }

    pub fn active_recipients(&self) -> impl Iterator<Item = &Recipient> {
        self.recipients.values().filter(|r| r.active)
    }

    pub fn all_groups(&self) -> impl Iterator<Item = &RecipientGroup> {
        self.groups.values()
    }

    // ── Recipients ──

    /// Store a new recipient.  An empty ID becomes `r` + 8 hex chars.
    /// The recipient joins every stored group it lists.
    pub fn create_recipient(&mut self, mut recipient: Recipient) -> Result<String> {
        if recipient.name.trim().is_empty() {
            return Err(Error::InvalidArgument("recipient name is required".into()));
        }
        if !recipient.location.is_finite() {
            return Err(Error::InvalidArgument("recipient location must be finite".into()));
        }
        recipient.notification_preferences.validate()?;
        if recipient.id.trim().is_empty() {
            recipient.id = generated_id('r');
        }
        if self.recipients.contains_key(&recipient.id) {
            return Err(Error::InvalidArgument(format!(
                "recipient {} already exists",
                recipient.id
            )));
        }

        let id = recipient.id.clone();
        for tag in &recipient.groups {
            if let Some(group) = self.groups.get_mut(tag) {
                group.members.insert(id.clone());
            }
        }
        self.recipients.insert(id.clone(), recipient);
        debug!("Created recipient {id}");
        self.persist();
        Ok(id)
    }

    /// Field-wise merge, including nested preferences.
    pub fn update_recipient(&mut self, id: &str, patch: RecipientPatch) -> Result<Recipient> {
        let recipient = self
            .recipients
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("recipient {id}")))?;

        let mut updated = recipient.clone();
        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(Error::InvalidArgument("recipient name cannot be empty".into()));
            }
            updated.name = name;
        }
        if let Some(role) = patch.role {
            updated.role = role;
        }
        set_handle(&mut updated.email, patch.email);
        set_handle(&mut updated.phone_number, patch.phone_number);
        set_handle(&mut updated.device_token, patch.device_token);
        set_handle(&mut updated.radio_id, patch.radio_id);
        set_handle(&mut updated.signage_area_id, patch.signage_area_id);
        if let Some(location) = patch.location {
            if !location.is_finite() {
                return Err(Error::InvalidArgument("recipient location must be finite".into()));
            }
            updated.location = location;
        }
        if let Some(prefs) = patch.notification_preferences {
            prefs.apply(&mut updated.notification_preferences);
            updated.notification_preferences.validate()?;
        }
        if let Some(metadata) = patch.metadata {
            updated.metadata.extend(metadata);
        }
        if let Some(active) = patch.active {
            updated.active = active;
        }

        // Validation passed; commit.
        *recipient = updated.clone();
        debug!("Updated recipient {id}");
        self.persist();
        Ok(updated)
    }

    /// Remove a recipient and drop it from every group's member set.
    pub fn delete_recipient(&mut self, id: &str) -> Result<Recipient> {
        let removed = self
            .recipients
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("recipient {id}")))?;
        for group in self.groups.values_mut() {
            group.members.remove(id);
        }
        debug!("Deleted recipient {id}");
        self.persist();
        Ok(removed)
    }

    // ── Groups ──

    /// Store a new group.  An empty ID becomes `g` + 8 hex chars.  Listed
    /// members that exist are tagged with the group; unknown IDs are
    /// dropped.
    pub fn create_group(&mut self, mut group: RecipientGroup) -> Result<String> {
        if group.name.trim().is_empty() {
            return Err(Error::InvalidArgument("group name is required".into()));
        }
        if group.id.trim().is_empty() {
            group.id = generated_id('g');
        }
        if self.groups.contains_key(&group.id) {
            return Err(Error::InvalidArgument(format!("group {} already exists", group.id)));
        }

        let id = group.id.clone();
        group.members.retain(|rid| match self.recipients.get_mut(rid) {
            Some(r) => {
                r.groups.insert(id.clone());
                true
            }
            None => false,
        });
        self.groups.insert(id.clone(), group);
        debug!("Created group {id}");
        self.persist();
        Ok(id)
    }

    pub fn update_group(&mut self, id: &str, patch: GroupPatch) -> Result<RecipientGroup> {
        let group = self
            .groups
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("group {id}")))?;
        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(Error::InvalidArgument("group name cannot be empty".into()));
            }
            group.name = name;
        }
        if let Some(description) = patch.description {
            group.description = description;
        }
        if let Some(mut parents) = patch.parent_groups {
            parents.remove(id);
            group.parent_groups = parents;
        }
        let updated = group.clone();
        self.persist();
        Ok(updated)
    }

    /// Remove a group and unlink it as a parent.  Members and their tags
    /// are left alone.
    pub fn delete_group(&mut self, id: &str) -> Result<RecipientGroup> {
        let removed = self
            .groups
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("group {id}")))?;
        for group in self.groups.values_mut() {
            group.parent_groups.remove(id);
        }
        debug!("Deleted group {id}");
        self.persist();
        Ok(removed)
    }

    pub fn add_recipient_to_group(&mut self, recipient_id: &str, group_id: &str) -> Result<()> {
        if !self.groups.contains_key(group_id) {
            return Err(Error::NotFound(format!("group {group_id}")));
        }
        let recipient = self
            .recipients
            .get_mut(recipient_id)
            .ok_or_else(|| Error::NotFound(format!("recipient {recipient_id}")))?;
        recipient.groups.insert(group_id.to_string());
        if let Some(group) = self.groups.get_mut(group_id) {
            group.members.insert(recipient_id.to_string());
        }
        self.persist();
        Ok(())
    }

    pub fn remove_recipient_from_group(&mut self, recipient_id: &str, group_id: &str) -> Result<()> {
        if !self.groups.contains_key(group_id) {
            return Err(Error::NotFound(format!("group {group_id}")));
        }
        let recipient = self
            .recipients
            .get_mut(recipient_id)
            .ok_or_else(|| Error::NotFound(format!("recipient {recipient_id}")))?;
        recipient.groups.remove(group_id);
        if let Some(group) = self.groups.get_mut(group_id) {
            group.members.remove(recipient_id);
        }
        self.persist();
        Ok(())
    }

    // ── Queries ──

    /// Recipients that are members of, or tagged with, `group_id`.
    pub fn find_by_group(&self, group_id: &str) -> Vec<&Recipient> {
        self.find_by_groups(&[group_id])
    }

    /// Recipients in any of `group_ids`, once each, ordered by ID.
    pub fn find_by_groups(&self, group_ids: &[&str]) -> Vec<&Recipient> {
        self.recipients
            .values()
            .filter(|r| {
                group_ids.iter().any(|gid| {
                    r.is_in_group(gid)
                        || self.groups.get(*gid).is_some_and(|g| g.members.contains(&r.id))
                })
            })
            .collect()
    }

    /// Recipients whose home location is within `radius_meters`, nearest
    /// first, with their distances.
    pub fn find_in_radius(&self, center: Coordinate, radius_meters: f64) -> Vec<(&Recipient, f64)> {
        let mut hits: Vec<_> = self
            .recipients
            .values()
            .map(|r| (r, r.distance_to(center)))
            .filter(|(_, d)| *d <= radius_meters)
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits
    }

    pub fn find_by_role(&self, role: &str) -> Vec<&Recipient> {
        self.recipients
            .values()
            .filter(|r| r.role.eq_ignore_ascii_case(role))
            .collect()
    }

    /// Members of `group_id` plus members of every group that lists it,
    /// directly or transitively, as a parent.
    pub fn expand_members(&self, group_id: &str) -> Result<BTreeSet<String>> {
        if !self.groups.contains_key(group_id) {
            return Err(Error::NotFound(format!("group {group_id}")));
        }

        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([group_id]);
        let mut members = BTreeSet::new();

        while let Some(gid) = queue.pop_front() {
            if !seen.insert(gid) {
                continue;
            }
            let Some(group) = self.groups.get(gid) else {
                continue;
            };
            members.extend(group.members.iter().cloned());
            for child in self.groups.values() {
                if child.parent_groups.contains(gid) {
                    queue.push_back(child.id.as_str());
                }
            }
        }
        Ok(members)
    }

    // ── Persistence ──

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let stored = StoredDirectoryRef {
            recipients: &self.recipients,
            groups: &self.groups,
        };
        match write_json(path, &stored) {
            Ok(()) => debug!("Saved {} recipients to {}", self.recipients.len(), path.display()),
            Err(e) => warn!("Failed to save recipient data: {e}"),
        }
    }
}

#[derive(Serialize)]
struct StoredDirectoryRef<'a> {
    recipients: &'a BTreeMap<String, Recipient>,
    groups: &'a BTreeMap<String, RecipientGroup>,
}

impl fmt::Display for RecipientDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.active_recipients().count();
        write!(
            f,
            "{} recipients ({} active), {} groups",
            self.recipients.len(),
            active,
            self.groups.len()
        )?;
        match &self.path {
            Some(p) => write!(f, ", storage={}", p.display()),
            None => write!(f, ", storage=memory"),
        }
    }
}
