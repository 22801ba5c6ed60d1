//! Location catalog: named campus places plus a flat known-location index.
//!
//! Places are a closed sum type ([`PlaceDetail`]) stored per kind and keyed
//! by ID.  The known-location index (`name -> coordinate + address`) is
//! derived from every place plus a set of curated entries and is updated in
//! the same call as any place mutation.
//!
//! Name matching is case-insensitive containment: an entry matches when its
//! lower-cased name is a substring of the lower-cased query.  When several
//! names match, the longest one wins; remaining ties go to iteration order
//! (buildings, landmarks, areas, each by ID, then the flat index by name).
//!
//! Persistence is write-through and best-effort.  A failed write is logged
//! and never undoes the in-memory change.
mod catalog_tests;
mod seed;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::geo::{Coordinate, distance_meters};
use crate::persist::{env_path, read_json, write_json};
use crate::{Error, Result};

/// Catalog shared between the resolver, the targeting pipeline and editors.
pub type SharedCatalog = Arc<RwLock<LocationCatalog>>;

// ───────────────────────────── Places ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Building,
    Landmark,
    Area,
}

impl PlaceKind {
    /// Iteration order used for every multi-kind scan.
    pub const ALL: [PlaceKind; 3] = [Self::Building, Self::Landmark, Self::Area];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Landmark => "landmark",
            Self::Area => "area",
        }
    }
}

impl fmt::Display for PlaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlaceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "building" => Ok(Self::Building),
            "landmark" => Ok(Self::Landmark),
            "area" => Ok(Self::Area),
            other => Err(Error::InvalidArgument(format!("unknown place kind: {other}"))),
        }
    }
}

/// Variant-specific payload of a [`NamedPlace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlaceDetail {
    Building {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        floors: Option<u32>,
    },
    Landmark,
    Area {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        /// Informational only; never widens or narrows a radius search.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        radius_meters: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPlace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub center: Coordinate,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub detail: PlaceDetail,
}

impl NamedPlace {
    fn bare(name: impl Into<String>, center: Coordinate, detail: PlaceDetail) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            address: String::new(),
            center,
            description: String::new(),
            detail,
        }
    }

    pub fn building(name: impl Into<String>, center: Coordinate) -> Self {
        Self::bare(
            name,
            center,
            PlaceDetail::Building {
                category: None,
                floors: None,
            },
        )
    }

    pub fn landmark(name: impl Into<String>, center: Coordinate) -> Self {
        Self::bare(name, center, PlaceDetail::Landmark)
    }

    pub fn area(name: impl Into<String>, center: Coordinate, radius_meters: Option<f64>) -> Self {
        Self::bare(
            name,
            center,
            PlaceDetail::Area {
                category: None,
                radius_meters,
            },
        )
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn kind(&self) -> PlaceKind {
        match self.detail {
            PlaceDetail::Building { .. } => PlaceKind::Building,
            PlaceDetail::Landmark => PlaceKind::Landmark,
            PlaceDetail::Area { .. } => PlaceKind::Area,
        }
    }

    pub fn radius_meters(&self) -> Option<f64> {
        match self.detail {
            PlaceDetail::Area { radius_meters, .. } => radius_meters,
            _ => None,
        }
    }

    fn known_entry(&self) -> KnownLocation {
        KnownLocation {
            coordinate: self.center,
            address: self.address.clone(),
            origin: EntryOrigin::Place {
                kind: self.kind(),
                id: self.id.clone(),
            },
        }
    }
}

/// Place ID derived from a name: lower-cased, spaces and hyphens become `_`.
pub fn derive_id(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Partial update for [`LocationCatalog::update`].  `None` leaves a field
/// as is.  Kind-specific fields are ignored on other kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacePatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub center: Option<Coordinate>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub floors: Option<u32>,
    pub radius_meters: Option<f64>,
}

// ───────────────────────── Known-location index ──────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOrigin {
    Curated,
    Place { kind: PlaceKind, id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnownLocation {
    pub coordinate: Coordinate,
    pub address: String,
    pub origin: EntryOrigin,
}

/// A catalog hit from either a place collection or the flat index.
#[derive(Debug, Clone, Copy)]
pub enum CatalogMatch<'a> {
    Place(&'a NamedPlace),
    Known {
        name: &'a str,
        entry: &'a KnownLocation,
    },
}

impl CatalogMatch<'_> {
    pub fn name(&self) -> &str {
        match self {
            Self::Place(p) => &p.name,
            Self::Known { name, .. } => name,
        }
    }

    pub fn center(&self) -> Coordinate {
        match self {
            Self::Place(p) => p.center,
            Self::Known { entry, .. } => entry.coordinate,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            Self::Place(p) => &p.address,
            Self::Known { entry, .. } => &entry.address,
        }
    }
}

/// Place plus its distance from a search center.
#[derive(Debug, Clone, Copy)]
pub struct PlaceDistance<'a> {
    pub place: &'a NamedPlace,
    pub distance_meters: f64,
}

/// Pick the longest name contained in `lower_text`.  Earlier candidates win
/// ties.  Empty names never match.
pub(crate) fn longest_contained<'a, T>(
    lower_text: &str,
    candidates: impl IntoIterator<Item = (&'a str, T)>,
) -> Option<T> {
    let mut best: Option<(usize, T)> = None;
    for (name, item) in candidates {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() || !lower_text.contains(&needle) {
            continue;
        }
        if best.as_ref().is_none_or(|(len, _)| needle.len() > *len) {
            best = Some((needle.len(), item));
        }
    }
    best.map(|(_, item)| item)
}

// ───────────────────────────── On disk ───────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPlace {
    name: String,
    #[serde(default)]
    address: String,
    coordinates: Coordinate,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    floors: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius: Option<f64>,
    #[serde(default)]
    description: String,
}

impl StoredPlace {
    fn from_place(place: &NamedPlace) -> Self {
        let (category, floors, radius) = match &place.detail {
            PlaceDetail::Building { category, floors } => (category.clone(), *floors, None),
            PlaceDetail::Landmark => (None, None, None),
            PlaceDetail::Area {
                category,
                radius_meters,
            } => (category.clone(), None, *radius_meters),
        };
        Self {
            name: place.name.clone(),
            address: place.address.clone(),
            coordinates: place.center,
            category,
            floors,
            radius,
            description: place.description.clone(),
        }
    }

    fn into_place(self, kind: PlaceKind, id: String) -> NamedPlace {
        let detail = match kind {
            PlaceKind::Building => PlaceDetail::Building {
                category: self.category,
                floors: self.floors,
            },
            PlaceKind::Landmark => PlaceDetail::Landmark,
            PlaceKind::Area => PlaceDetail::Area {
                category: self.category,
                radius_meters: self.radius,
            },
        };
        NamedPlace {
            id,
            name: self.name,
            address: self.address,
            center: self.coordinates,
            description: self.description,
            detail,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCatalog {
    #[serde(default)]
    buildings: BTreeMap<String, StoredPlace>,
    #[serde(default)]
    landmarks: BTreeMap<String, StoredPlace>,
    #[serde(default)]
    areas: BTreeMap<String, StoredPlace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredKnown {
    lat: f64,
    lng: f64,
    #[serde(default)]
    address: String,
}

// ───────────────────────────── Catalog ───────────────────────────────────

#[derive(Debug, Default)]
pub struct LocationCatalog {
    buildings: BTreeMap<String, NamedPlace>,
    landmarks: BTreeMap<String, NamedPlace>,
    areas: BTreeMap<String, NamedPlace>,
    curated: BTreeMap<String, KnownLocation>,
    known: BTreeMap<String, KnownLocation>,
    places_path: Option<PathBuf>,
    known_path: Option<PathBuf>,
}

impl LocationCatalog {
    /// Empty, in-memory catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory catalog holding the built-in campus places and curated
    /// names.
    pub fn with_seed() -> Self {
        let mut catalog = Self::new();
        catalog.load_seed_places();
        catalog.load_seed_curated();
        catalog.rebuild_known();
        catalog
    }

    /// Campus seed plus the extended San Diego places.
    pub fn with_san_diego_seed() -> Self {
        let mut catalog = Self::with_seed();
        for place in seed::san_diego_places() {
            catalog.collection_mut(place.kind()).insert(place.id.clone(), place);
        }
        catalog.rebuild_known();
        catalog
    }

    /// Load from the given files, falling back to the seed for any file that
    /// is missing or unreadable.  Seeded data is written back immediately.
    pub fn open(places_path: Option<PathBuf>, known_path: Option<PathBuf>) -> Self {
        let mut catalog = Self::new();
        // Any configured file that had to be seeded is written back below.
        let mut seeded = false;

        match places_path.as_deref().filter(|p| p.exists()) {
            Some(path) => match read_json::<StoredCatalog>(path) {
                Ok(stored) => {
                    catalog.load_stored(stored);
                    info!(
                        "Loaded {} buildings, {} landmarks, {} areas from {}",
                        catalog.buildings.len(),
                        catalog.landmarks.len(),
                        catalog.areas.len(),
                        path.display()
                    );
                }
                Err(e) => {
                    warn!("Location data unreadable ({e}), using built-in places");
                    catalog.load_seed_places();
                    seeded = true;
                }
            },
            None => {
                catalog.load_seed_places();
                seeded |= places_path.is_some();
            }
        }

        match known_path.as_deref().filter(|p| p.exists()) {
            Some(path) => match read_json::<BTreeMap<String, StoredKnown>>(path) {
                Ok(stored) => {
                    for (name, entry) in stored {
                        let known = KnownLocation {
                            coordinate: Coordinate::new(entry.lat, entry.lng),
                            address: entry.address,
                            origin: EntryOrigin::Curated,
                        };
                        catalog.curated.insert(name, known);
                    }
                    info!(
                        "Loaded {} curated known locations from {}",
                        catalog.curated.len(),
                        path.display()
                    );
                }
                Err(e) => {
                    warn!("Known locations unreadable ({e}), using built-in names");
                    catalog.load_seed_curated();
                    seeded = true;
                }
            },
            None => {
                catalog.load_seed_curated();
                seeded |= known_path.is_some();
            }
        }

        catalog.places_path = places_path;
        catalog.known_path = known_path;
        catalog.rebuild_known();

        if seeded {
            catalog.persist();
        }
        catalog
    }

    /// Open using `LOCATIONS_PATH` / `KNOWN_LOCATIONS_PATH`.
    ///
    /// | Variable               | Default            |
    /// |------------------------|--------------------|
    /// | `LOCATIONS_PATH`       | unset: in-memory   |
    /// | `KNOWN_LOCATIONS_PATH` | unset: in-memory   |
    pub fn from_env() -> Self {
        Self::open(env_path("LOCATIONS_PATH"), env_path("KNOWN_LOCATIONS_PATH"))
    }

    pub fn into_shared(self) -> SharedCatalog {
        Arc::new(RwLock::new(self))
    }

    fn load_seed_places(&mut self) {
        for place in seed::campus_places() {
            self.collection_mut(place.kind()).insert(place.id.clone(), place);
        }
    }

    fn load_seed_curated(&mut self) {
        for (name, coordinate, address) in seed::curated() {
            self.curated.insert(
                name.to_string(),
                KnownLocation {
                    coordinate,
                    address: address.to_string(),
                    origin: EntryOrigin::Curated,
                },
            );
        }
    }

    fn load_stored(&mut self, stored: StoredCatalog) {
        let groups = [
            (PlaceKind::Building, stored.buildings),
            (PlaceKind::Landmark, stored.landmarks),
            (PlaceKind::Area, stored.areas),
        ];
        for (kind, entries) in groups {
            for (id, entry) in entries {
                let place = entry.into_place(kind, id.clone());
                self.collection_mut(kind).insert(id, place);
            }
        }
    }

    // ── Collections ──

    fn collection(&self, kind: PlaceKind) -> &BTreeMap<String, NamedPlace> {
        match kind {
            PlaceKind::Building => &self.buildings,
            PlaceKind::Landmark => &self.landmarks,
            PlaceKind::Area => &self.areas,
        }
    }

    fn collection_mut(&mut self, kind: PlaceKind) -> &mut BTreeMap<String, NamedPlace> {
        match kind {
            PlaceKind::Building => &mut self.buildings,
            PlaceKind::Landmark => &mut self.landmarks,
            PlaceKind::Area => &mut self.areas,
        }
    }

    /// Every place in tie-break order.
    pub fn all_places(&self) -> impl Iterator<Item = &NamedPlace> {
        PlaceKind::ALL
            .into_iter()
            .flat_map(|kind| self.collection(kind).values())
    }

    pub fn places_of(&self, kind: PlaceKind) -> impl Iterator<Item = &NamedPlace> {
        self.collection(kind).values()
    }

    pub fn get(&self, id: &str, kind: PlaceKind) -> Option<&NamedPlace> {
        self.collection(kind).get(id)
    }

    /// The flat `name -> entry` index, ordered by name.
    pub fn known_locations(&self) -> &BTreeMap<String, KnownLocation> {
        &self.known
    }

    pub fn place_count(&self) -> usize {
        self.buildings.len() + self.landmarks.len() + self.areas.len()
    }

    // ── Known index maintenance ──

    fn rebuild_known(&mut self) {
        let mut known = self.curated.clone();
        // Reverse so the earliest place in tie-break order wins a name clash.
        let places: Vec<_> = self.all_places().collect();
        for place in places.into_iter().rev() {
            known.insert(place.name.clone(), place.known_entry());
        }
        self.known = known;
    }

    /// Recompute the index entry for one name after a mutation.
    fn sync_known_name(&mut self, name: &str) {
        let entry = self
            .all_places()
            .find(|p| p.name == name)
            .map(NamedPlace::known_entry)
            .or_else(|| self.curated.get(name).cloned());
        match entry {
            Some(entry) => {
                self.known.insert(name.to_string(), entry);
            }
            None => {
                self.known.remove(name);
            }
        }
    }

    // ── Lookups ──

    /// Best name match across places and the flat index.
    pub fn lookup(&self, text: &str) -> Option<CatalogMatch<'_>> {
        let lower = text.to_lowercase();
        let places = self
            .all_places()
            .map(|p| (p.name.as_str(), CatalogMatch::Place(p)));
        let known = self
            .known
            .iter()
            .map(|(name, entry)| (name.as_str(), CatalogMatch::Known { name, entry }));
        longest_contained(&lower, places.chain(known))
    }

    /// Coordinate of the best name match, if any.
    pub fn lookup_by_name(&self, text: &str) -> Option<Coordinate> {
        self.lookup(text).map(|m| m.center())
    }

    /// Best matching place (buildings, landmarks, areas only).
    pub fn lookup_details(&self, text: &str) -> Option<&NamedPlace> {
        self.lookup_place(text, &PlaceKind::ALL)
    }

    /// Best matching place restricted to `kinds`.
    pub fn lookup_place(&self, text: &str, kinds: &[PlaceKind]) -> Option<&NamedPlace> {
        let lower = text.to_lowercase();
        let candidates = PlaceKind::ALL
            .into_iter()
            .filter(|k| kinds.contains(k))
            .flat_map(|k| self.collection(k).values())
            .map(|p| (p.name.as_str(), p));
        longest_contained(&lower, candidates)
    }

    /// Best match in the flat index only.
    pub fn lookup_known(&self, text: &str) -> Option<(&str, &KnownLocation)> {
        let lower = text.to_lowercase();
        longest_contained(
            &lower,
            self.known
                .iter()
                .map(|(name, entry)| (name.as_str(), (name.as_str(), entry))),
        )
    }

    /// Places whose center lies within `radius_meters` of `center`, nearest
    /// first.  An area's own radius does not affect the test.
    pub fn find_within_radius(
        &self,
        center: Coordinate,
        radius_meters: f64,
        kind: Option<PlaceKind>,
    ) -> Vec<PlaceDistance<'_>> {
        let mut hits: Vec<PlaceDistance<'_>> = self
            .all_places()
            .filter(|p| kind.is_none_or(|k| p.kind() == k))
            .map(|place| PlaceDistance {
                place,
                distance_meters: distance_meters(center, place.center),
            })
            .filter(|h| h.distance_meters <= radius_meters)
            .collect();
        hits.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
        hits
    }

    // ── Mutations ──

    /// Insert or replace a place.  An empty ID is derived from the name.
    /// Returns the stored ID.
    pub fn upsert(&mut self, mut place: NamedPlace) -> Result<String> {
        if place.name.trim().is_empty() {
            return Err(Error::InvalidArgument("place name is required".into()));
        }
        if !place.center.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "place center must be finite, got {}",
                place.center
            )));
        }
        if place.id.trim().is_empty() {
            place.id = derive_id(&place.name);
        }

        let id = place.id.clone();
        let new_name = place.name.clone();
        let kind = place.kind();
        let replaced = self.collection_mut(kind).insert(id.clone(), place);

        if let Some(old) = replaced.filter(|old| old.name != new_name) {
            self.sync_known_name(&old.name);
        }
        self.sync_known_name(&new_name);
        debug!("Upserted {kind} {id} ({new_name})");
        self.persist();
        Ok(id)
    }

    /// Partial update of an existing place.
    pub fn update(&mut self, id: &str, kind: PlaceKind, patch: PlacePatch) -> Result<()> {
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(Error::InvalidArgument("place name cannot be empty".into()));
        }
        if patch.center.is_some_and(|c| !c.is_finite()) {
            return Err(Error::InvalidArgument("place center must be finite".into()));
        }

        let place = self
            .collection_mut(kind)
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("{kind} {id}")))?;
        let old_name = place.name.clone();

        if let Some(name) = patch.name {
            place.name = name;
        }
        if let Some(address) = patch.address {
            place.address = address;
        }
        if let Some(center) = patch.center {
            place.center = center;
        }
        if let Some(description) = patch.description {
            place.description = description;
        }
        match &mut place.detail {
            PlaceDetail::Building { category, floors } => {
                if patch.category.is_some() {
                    *category = patch.category;
                }
                if patch.floors.is_some() {
                    *floors = patch.floors;
                }
            }
            PlaceDetail::Landmark => {}
            PlaceDetail::Area {
                category,
                radius_meters,
            } => {
                if patch.category.is_some() {
                    *category = patch.category;
                }
                if patch.radius_meters.is_some() {
                    *radius_meters = patch.radius_meters;
                }
            }
        }
        let new_name = place.name.clone();

        if old_name != new_name {
            self.sync_known_name(&old_name);
        }
        self.sync_known_name(&new_name);
        debug!("Updated {kind} {id}");
        self.persist();
        Ok(())
    }

    /// Remove a place and its derived index entry.
    pub fn delete(&mut self, id: &str, kind: PlaceKind) -> Result<NamedPlace> {
        let removed = self
            .collection_mut(kind)
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("{kind} {id}")))?;
        self.sync_known_name(&removed.name);
        debug!("Deleted {kind} {id}");
        self.persist();
        Ok(removed)
    }

    /// Add or replace a curated name in the flat index.  A place with the
    /// same name still takes precedence.
    pub fn add_known_location(
        &mut self,
        name: &str,
        coordinate: Coordinate,
        address: &str,
    ) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument("known location name is required".into()));
        }
        if !coordinate.is_finite() {
            return Err(Error::InvalidArgument("known location must be finite".into()));
        }
        self.curated.insert(
            name.to_string(),
            KnownLocation {
                coordinate,
                address: address.to_string(),
                origin: EntryOrigin::Curated,
            },
        );
        self.sync_known_name(name);
        self.persist();
        Ok(())
    }

    // ── Persistence ──

    fn persist(&self) {
        if let Err(e) = self.try_persist() {
            warn!("Failed to save location data: {e}");
        }
    }

    fn try_persist(&self) -> Result<()> {
        if let Some(path) = &self.places_path {
            let stored = StoredCatalog {
                buildings: stored_map(&self.buildings),
                landmarks: stored_map(&self.landmarks),
                areas: stored_map(&self.areas),
            };
            write_json(path, &stored)?;
            debug!("Saved {} places to {}", self.place_count(), path.display());
        }
        if let Some(path) = &self.known_path {
            let stored: BTreeMap<&str, StoredKnown> = self
                .curated
                .iter()
                .map(|(name, e)| {
                    let entry = StoredKnown {
                        lat: e.coordinate.latitude,
                        lng: e.coordinate.longitude,
                        address: e.address.clone(),
                    };
                    (name.as_str(), entry)
                })
                .collect();
            write_json(path, &stored)?;
        }
        Ok(())
    }
}

fn stored_map(places: &BTreeMap<String, NamedPlace>) -> BTreeMap<String, StoredPlace> {
    places
        .iter()
        .map(|(id, p)| (id.clone(), StoredPlace::from_place(p)))
        .collect()
}

impl fmt::Display for LocationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buildings, {} landmarks, {} areas, {} known names",
            self.buildings.len(),
            self.landmarks.len(),
            self.areas.len(),
            self.known.len(),
        )?;
        match &self.places_path {
            Some(p) => write!(f, ", storage={}", p.display()),
            None => write!(f, ", storage=memory"),
        }
    }
}
