//! Free-text location resolution.
//!
//! Ordered fallback chain; the first tier with a hit wins:
//!
//! 1. built-in well-known landmarks (`exact`, 100)
//! 2. catalog name containment (`database`, 100)
//! 3. keyword fragments (`fuzzy`, 80), then name-word scoring (`fuzzy`, 60)
//! 4. generic campus mention (`campus-mention`, 50)
//! 5. city-center default (`default`, 0), which never fails
//!
//! Matched coordinates are jittered on every call so that repeated alerts
//! at one place do not stack on the map.  Callers that need a stable
//! coordinate must keep the first [`GeocodeResult`].
pub mod keywords;
mod resolver_tests;

use std::fmt;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{KnownLocation, LocationCatalog, SharedCatalog, longest_contained};
use crate::geo::{Coordinate, jitter};
use crate::resolver::keywords::{
    CAMPUS_ADDRESS, CAMPUS_LAT, CAMPUS_LNG, CAMPUS_MENTION_PATTERN, DEFAULT_ADDRESS,
    DEFAULT_CENTER, FUZZY_KEYWORDS, MIN_SCORED_WORD_CHARS, WELL_KNOWN, campus_box_center,
};

// ───────────────────────────── Result ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeocodeSource {
    Exact,
    Database,
    Fuzzy,
    CampusMention,
    Default,
}

impl GeocodeSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Database => "database",
            Self::Fuzzy => "fuzzy",
            Self::CampusMention => "campus-mention",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for GeocodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    /// Jittered display coordinate.
    pub coordinate: Coordinate,
    pub address: String,
    /// 0..=100
    pub confidence: u8,
    pub source: GeocodeSource,
    /// Catalog or landmark name that produced the hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_name: Option<String>,
    /// Un-jittered center the coordinate was derived from.
    pub anchor: Coordinate,
}

// ───────────────────────────── Config ────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub place_jitter_meters: f64,
    pub default_jitter_meters: f64,
    pub default_center: Coordinate,
    pub default_address: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            place_jitter_meters: 30.0,
            default_jitter_meters: 1_000.0,
            default_center: DEFAULT_CENTER,
            default_address: DEFAULT_ADDRESS.into(),
        }
    }
}

impl ResolverConfig {
    /// | Variable                        | Default |
    /// |---------------------------------|---------|
    /// | `GEOCODE_JITTER_METERS`         | 30      |
    /// | `GEOCODE_DEFAULT_JITTER_METERS` | 1000    |
    pub fn from_env() -> Self {
        fn meters(key: &str, default: f64) -> f64 {
            std::env::var(key)
                .ok()
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(default)
        }

        let d = Self::default();
        Self {
            place_jitter_meters: meters("GEOCODE_JITTER_METERS", d.place_jitter_meters),
            default_jitter_meters: meters("GEOCODE_DEFAULT_JITTER_METERS", d.default_jitter_meters),
            ..d
        }
    }
}

// ───────────────────────────── Resolver ──────────────────────────────────

/// Shortest indexed name in which `fragment` starts a word ("geisel" ->
/// "Geisel Library").  Fragments under three characters never match.
fn fragment_prefix_match<'c>(
    catalog: &'c LocationCatalog,
    fragment: &str,
) -> Option<(&'c str, &'c KnownLocation)> {
    if fragment.chars().count() < MIN_SCORED_WORD_CHARS {
        return None;
    }
    let word_start = format!(" {fragment}");
    let mut best: Option<(&str, &KnownLocation)> = None;
    for (name, entry) in catalog.known_locations() {
        let name_lower = name.to_lowercase();
        if !(name_lower.starts_with(fragment) || name_lower.contains(&word_start)) {
            continue;
        }
        if best.is_none_or(|(b, _)| name.len() < b.len()) {
            best = Some((name.as_str(), entry));
        }
    }
    best
}

static CAMPUS_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CAMPUS_MENTION_PATTERN).expect("valid campus regex"));

/// A tier hit before jitter.
struct Anchor {
    center: Coordinate,
    address: String,
    name: Option<String>,
    confidence: u8,
    source: GeocodeSource,
}

pub struct LocationResolver {
    catalog: SharedCatalog,
    config: ResolverConfig,
}

impl LocationResolver {
    pub fn new(catalog: SharedCatalog) -> Self {
        Self::with_config(catalog, ResolverConfig::default())
    }

    pub fn with_config(catalog: SharedCatalog, config: ResolverConfig) -> Self {
        Self { catalog, config }
    }

    pub fn from_env(catalog: SharedCatalog) -> Self {
        Self::with_config(catalog, ResolverConfig::from_env())
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `text`.  `None` and empty text go straight to the default.
    pub fn resolve<'a>(&self, text: impl Into<Option<&'a str>>) -> GeocodeResult {
        self.resolve_with_rng(text.into(), &mut rand::thread_rng())
    }

    pub fn resolve_with_rng<R: Rng + ?Sized>(&self, text: Option<&str>, rng: &mut R) -> GeocodeResult {
        let text = text.map(str::trim).unwrap_or_default();

        if !text.is_empty() {
            let lower = text.to_lowercase();
            let hit = self
                .well_known(&lower)
                .or_else(|| self.database(text))
                .or_else(|| self.fuzzy(&lower));
            if let Some(anchor) = hit {
                debug!("Resolved {text:?} via {} ({:?})", anchor.source, anchor.name);
                return self.finish(anchor, self.config.place_jitter_meters, rng);
            }
            if CAMPUS_MENTION_RE.is_match(text) {
                debug!("Resolved {text:?} via campus mention");
                return Self::campus_point(rng);
            }
        }

        debug!("No match for {text:?}, using default");
        let anchor = Anchor {
            center: self.config.default_center,
            address: self.config.default_address.clone(),
            name: None,
            confidence: 0,
            source: GeocodeSource::Default,
        };
        self.finish(anchor, self.config.default_jitter_meters, rng)
    }

    /// Resolve each text independently, in order.
    pub fn resolve_batch<'a, I>(&self, texts: I) -> Vec<(String, GeocodeResult)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut rng = rand::thread_rng();
        let results: Vec<_> = texts
            .into_iter()
            .map(|t| (t.to_string(), self.resolve_with_rng(Some(t), &mut rng)))
            .collect();
        info!("Resolved batch of {}", results.len());
        results
    }

    fn finish<R: Rng + ?Sized>(&self, anchor: Anchor, jitter_meters: f64, rng: &mut R) -> GeocodeResult {
        GeocodeResult {
            coordinate: jitter(anchor.center, jitter_meters, rng),
            address: anchor.address,
            confidence: anchor.confidence,
            source: anchor.source,
            matched_name: anchor.name,
            anchor: anchor.center,
        }
    }

    // ── Tiers ──

    fn well_known(&self, lower: &str) -> Option<Anchor> {
        let candidates = WELL_KNOWN.iter().map(|row| (row.0, row));
        longest_contained(lower, candidates).map(|&(name, lat, lng, address)| Anchor {
            center: Coordinate::new(lat, lng),
            address: address.to_string(),
            name: Some(name.to_string()),
            confidence: 100,
            source: GeocodeSource::Exact,
        })
    }

    fn database(&self, text: &str) -> Option<Anchor> {
        let catalog = self.catalog.read();
        catalog.lookup(text).map(|m| Anchor {
            center: m.center(),
            address: m.address().to_string(),
            name: Some(m.name().to_string()),
            confidence: 100,
            source: GeocodeSource::Database,
        })
    }

    fn fuzzy(&self, lower: &str) -> Option<Anchor> {
        let catalog = self.catalog.read();

        for keyword in FUZZY_KEYWORDS {
            if !lower.contains(keyword) {
                continue;
            }
            for part in lower.split(keyword).map(str::trim).filter(|p| !p.is_empty()) {
                if let Some(m) = catalog.lookup(part) {
                    return Some(Anchor {
                        center: m.center(),
                        address: m.address().to_string(),
                        name: Some(m.name().to_string()),
                        confidence: 80,
                        source: GeocodeSource::Fuzzy,
                    });
                }
                if let Some((name, entry)) = fragment_prefix_match(&catalog, part) {
                    return Some(Anchor {
                        center: entry.coordinate,
                        address: entry.address.clone(),
                        name: Some(name.to_string()),
                        confidence: 80,
                        source: GeocodeSource::Fuzzy,
                    });
                }
            }
        }

        // Word scoring over the flat index.  Ties keep the first by name.
        let mut best: Option<(usize, &str)> = None;
        for name in catalog.known_locations().keys() {
            let name_lower = name.to_lowercase();
            let words: Vec<&str> = name_lower.split_whitespace().collect();
            let score = words.iter().filter(|w| lower.contains(**w)).count();
            let has_long_word = words
                .iter()
                .any(|w| w.chars().count() >= MIN_SCORED_WORD_CHARS && lower.contains(*w));
            if score > 0 && has_long_word && best.is_none_or(|(s, _)| score > s) {
                best = Some((score, name.as_str()));
            }
        }

        let (_, name) = best?;
        let entry = &catalog.known_locations()[name];
        Some(Anchor {
            center: entry.coordinate,
            address: entry.address.clone(),
            name: Some(name.to_string()),
            confidence: 60,
            source: GeocodeSource::Fuzzy,
        })
    }

    fn campus_point<R: Rng + ?Sized>(rng: &mut R) -> GeocodeResult {
        let lat = rng.gen_range(CAMPUS_LAT.0..=CAMPUS_LAT.1);
        let lng = rng.gen_range(CAMPUS_LNG.0..=CAMPUS_LNG.1);
        GeocodeResult {
            coordinate: Coordinate::new(lat, lng),
            address: CAMPUS_ADDRESS.into(),
            confidence: 50,
            source: GeocodeSource::CampusMention,
            matched_name: None,
            anchor: campus_box_center(),
        }
    }
}

impl fmt::Display for LocationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "jitter={}m default_jitter={}m default={} [{}]",
            self.config.place_jitter_meters,
            self.config.default_jitter_meters,
            self.config.default_center,
            self.catalog.read(),
        )
    }
}
