//! Fixed lookup tables for the resolver tiers.

use crate::geo::Coordinate;

/// Built-in landmark table checked before the catalog:
/// `(name, lat, lng, address)`.
pub const WELL_KNOWN: &[(&str, f64, f64, &str)] = &[
    (
        "Geisel Library",
        32.8810,
        -117.2370,
        "Geisel Library, UC San Diego, 9500 Gilman Dr, La Jolla, CA 92093",
    ),
    (
        "Price Center",
        32.8794,
        -117.2359,
        "Price Center, UC San Diego, 9500 Gilman Dr, La Jolla, CA 92093",
    ),
    (
        "Warren Mall",
        32.8822,
        -117.2345,
        "Warren Mall, UC San Diego, 9500 Gilman Dr, La Jolla, CA 92093",
    ),
    (
        "BCB Café",
        32.8820,
        -117.2350,
        "BCB Café, Warren Mall, UC San Diego, 9500 Gilman Dr, La Jolla, CA 92093",
    ),
    (
        "UCSD",
        32.8801,
        -117.2340,
        "University of California San Diego, 9500 Gilman Dr, La Jolla, CA 92093",
    ),
    (
        "UC San Diego",
        32.8801,
        -117.2340,
        "University of California San Diego, 9500 Gilman Dr, La Jolla, CA 92093",
    ),
    ("La Jolla", 32.8328, -117.2712, "La Jolla, San Diego, CA"),
    ("San Diego", 32.7157, -117.1611, "San Diego, CA"),
];

/// Locative prepositions and place-type nouns the fuzzy tier splits on.
/// Splitting is plain substring splitting, in this order.
pub const FUZZY_KEYWORDS: &[&str] = &[
    "near",
    "at",
    "in",
    "by",
    "close to",
    "next to",
    "across from",
    "hall",
    "building",
    "center",
    "library",
    "commons",
    "plaza",
    "quad",
    "park",
    "field",
    "lab",
    "campus",
    "college",
];

/// Shortest name word that may carry a word-score match.
pub const MIN_SCORED_WORD_CHARS: usize = 3;

/// Generic campus mentions (word-bounded, case-insensitive).
pub const CAMPUS_MENTION_PATTERN: &str = r"(?i)\b(?:ucsd|uc\s+san\s+diego|campus)\b";

/// Campus bounding box used by the campus-mention tier.
pub const CAMPUS_LAT: (f64, f64) = (32.8750, 32.8850);
pub const CAMPUS_LNG: (f64, f64) = (-117.2400, -117.2300);

pub const CAMPUS_ADDRESS: &str = "UC San Diego, 9500 Gilman Dr, La Jolla, CA 92093";

pub fn campus_box_center() -> Coordinate {
    Coordinate::new(
        (CAMPUS_LAT.0 + CAMPUS_LAT.1) / 2.0,
        (CAMPUS_LNG.0 + CAMPUS_LNG.1) / 2.0,
    )
}

/// Downtown San Diego: the anchor of the terminal default tier.
pub const DEFAULT_CENTER: Coordinate = Coordinate::new(32.7157, -117.1611);
pub const DEFAULT_ADDRESS: &str = "San Diego, CA";
