//! Built-in place tables used when no persisted catalog is available.
//!
//! Row layouts:
//! - building: `(id, name, address, lat, lng, category, floors, description)`
//! - landmark: `(id, name, address, lat, lng, description)`
//! - area:     `(id, name, address, lat, lng, category, radius_m, description)`
//! - curated:  `(name, lat, lng, address)`

use super::{NamedPlace, PlaceDetail};
use crate::geo::Coordinate;

type BuildingRow = (&'static str, &'static str, &'static str, f64, f64, &'static str, u32, &'static str);
type LandmarkRow = (&'static str, &'static str, &'static str, f64, f64, &'static str);
type AreaRow = (&'static str, &'static str, &'static str, f64, f64, &'static str, f64, &'static str);
type CuratedRow = (&'static str, f64, f64, &'static str);

const CAMPUS: &str = "9500 Gilman Dr, La Jolla, CA 92093";

// ───────────────────────────── Campus ────────────────────────────────────

const CAMPUS_BUILDINGS: &[BuildingRow] = &[
    ("geisel_library", "Geisel Library", CAMPUS, 32.8810, -117.2370, "academic", 8, "Main campus library"),
    ("price_center", "Price Center", CAMPUS, 32.8794, -117.2359, "student_center", 3, "Student center with food and services"),
    ("warren_lecture_hall", "Warren Lecture Hall", CAMPUS, 32.8815, -117.2342, "academic", 2, "Lecture halls in Warren College"),
    ("peterson_hall", "Peterson Hall", CAMPUS, 32.8798, -117.2372, "academic", 1, "Lecture halls and classrooms"),
    ("center_hall", "Center Hall", CAMPUS, 32.8782, -117.2375, "academic", 2, "Large lecture hall building"),
    ("york_hall", "York Hall", CAMPUS, 32.8745, -117.2401, "academic", 5, "Science laboratories and classrooms"),
    ("applied_physics_math", "Applied Physics & Mathematics", CAMPUS, 32.8794, -117.2411, "academic", 7, "Physics and mathematics department"),
    ("jacobs_hall", "Jacobs Hall", CAMPUS, 32.8829, -117.2333, "academic", 6, "Engineering building"),
    ("rimac", "RIMAC/Liontree Arena", "9730 Hopkins Dr, La Jolla, CA 92093", 32.8869, -117.2406, "athletics", 3, "Recreation and athletic center"),
    ("student_health", "Student Health Services", CAMPUS, 32.8751, -117.2359, "health", 3, "Student health center"),
];

const CAMPUS_LANDMARKS: &[LandmarkRow] = &[
    ("sun_god", "Sun God Statue", CAMPUS, 32.8786, -117.2400, "Iconic campus statue"),
    ("warren_bear", "Warren Bear", CAMPUS, 32.8822, -117.2339, "Warren College mascot statue"),
    ("fallen_star", "Fallen Star", CAMPUS, 32.8814, -117.2353, "Stuart Collection art installation"),
    ("silent_tree", "Silent Tree", CAMPUS, 32.8780, -117.2392, "Stuart Collection art installation"),
    ("warren_mall", "Warren Mall", CAMPUS, 32.8822, -117.2345, "Warren College central mall"),
    ("library_walk", "Library Walk", CAMPUS, 32.8794, -117.2370, "Main pedestrian walkway"),
];

const CAMPUS_AREAS: &[AreaRow] = &[
    ("revelle_college", "Revelle College", CAMPUS, 32.8745, -117.2410, "college", 200.0, "First college established at UCSD"),
    ("muir_college", "Muir College", CAMPUS, 32.8789, -117.2410, "college", 180.0, "Second college established at UCSD"),
    ("marshall_college", "Marshall College", CAMPUS, 32.8836, -117.2425, "college", 190.0, "Third college established at UCSD"),
    ("warren_college", "Warren College", CAMPUS, 32.8815, -117.2350, "college", 200.0, "Fourth college established at UCSD"),
    ("roosevelt_college", "Eleanor Roosevelt College", CAMPUS, 32.8851, -117.2420, "college", 170.0, "Fifth college established at UCSD"),
    ("sixth_college", "Sixth College", CAMPUS, 32.8806, -117.2325, "college", 160.0, "Sixth college established at UCSD"),
    ("seventh_college", "Seventh College", CAMPUS, 32.8890, -117.2405, "college", 150.0, "Seventh college established at UCSD"),
    ("eighth_college", "Eighth College", CAMPUS, 32.8851, -117.2408, "college", 150.0, "Eighth college established at UCSD"),
    ("north_campus", "North Campus", CAMPUS, 32.8852, -117.2406, "campus_section", 500.0, "Northern section of campus"),
    ("central_campus", "Central Campus", CAMPUS, 32.8801, -117.2340, "campus_section", 400.0, "Central section of campus"),
    ("south_campus", "South Campus", CAMPUS, 32.8750, -117.2340, "campus_section", 450.0, "Southern section of campus"),
    ("scripps_institution", "Scripps Institution of Oceanography", "8622 Kennel Way, La Jolla, CA 92037", 32.8662, -117.2546, "campus_section", 400.0, "Oceanography campus"),
];

/// Hand-maintained names that are not (or not only) catalog places.
const CURATED: &[CuratedRow] = &[
    ("BCB Café", 32.8822, -117.2345, "BCB Café, Warren Mall, UC San Diego, 9500 Gilman Dr, La Jolla, CA 92093"),
    ("Pepper Canyon", 32.8782, -117.2392, "Pepper Canyon, UC San Diego, 9500 Gilman Dr, La Jolla, CA 92093"),
    ("UC San Diego", 32.8801, -117.2340, "University of California San Diego, 9500 Gilman Dr, La Jolla, CA 92093"),
    ("La Jolla", 32.8449, -117.2740, "La Jolla, San Diego, CA 92037"),
    ("San Diego", 32.7157, -117.1611, "San Diego, CA"),
    ("RIMAC Arena", 32.8869, -117.2406, "RIMAC Arena, UC San Diego, 9730 Hopkins Dr, La Jolla, CA 92093"),
];

// ───────────────────────────── San Diego ─────────────────────────────────

const SAN_DIEGO_AREAS: &[AreaRow] = &[
    ("downtown_sd", "Downtown San Diego", "Downtown, San Diego, CA", 32.7157, -117.1611, "neighborhood", 2000.0, "Downtown San Diego area"),
    ("hillcrest", "Hillcrest", "Hillcrest, San Diego, CA", 32.7480, -117.1604, "neighborhood", 1000.0, "Hillcrest neighborhood"),
    ("north_park", "North Park", "North Park, San Diego, CA", 32.7475, -117.1292, "neighborhood", 1000.0, "North Park neighborhood"),
    ("pacific_beach", "Pacific Beach", "Pacific Beach, San Diego, CA", 32.7997, -117.2437, "neighborhood", 1500.0, "Pacific Beach neighborhood"),
    ("mission_beach", "Mission Beach", "Mission Beach, San Diego, CA", 32.7697, -117.2520, "neighborhood", 800.0, "Mission Beach neighborhood"),
    ("ocean_beach", "Ocean Beach", "Ocean Beach, San Diego, CA", 32.7494, -117.2495, "neighborhood", 1000.0, "Ocean Beach neighborhood"),
    ("la_jolla", "La Jolla", "La Jolla, San Diego, CA", 32.8328, -117.2712, "neighborhood", 3000.0, "La Jolla community"),
    ("university_city", "University City", "University City, San Diego, CA", 32.8591, -117.2075, "neighborhood", 2000.0, "University City community"),
    ("mira_mesa", "Mira Mesa", "Mira Mesa, San Diego, CA", 32.9134, -117.1487, "neighborhood", 3000.0, "Mira Mesa community"),
    ("mission_valley", "Mission Valley", "Mission Valley, San Diego, CA", 32.7675, -117.1511, "neighborhood", 2500.0, "Mission Valley area"),
];

const SAN_DIEGO_LANDMARKS: &[LandmarkRow] = &[
    ("balboa_park", "Balboa Park", "1549 El Prado, San Diego, CA 92101", 32.7341, -117.1446, "Large urban cultural park"),
    ("seaworld", "SeaWorld", "500 Sea World Dr, San Diego, CA 92109", 32.7644, -117.2273, "Theme park and marine zoological park"),
    ("san_diego_zoo", "San Diego Zoo", "2920 Zoo Dr, San Diego, CA 92101", 32.7353, -117.1490, "Urban zoo in Balboa Park"),
    ("petco_park", "Petco Park", "100 Park Blvd, San Diego, CA 92101", 32.7076, -117.1569, "Major league baseball stadium"),
    ("gaslamp_quarter", "Gaslamp Quarter", "Gaslamp Quarter, San Diego, CA", 32.7099, -117.1609, "Historic district in downtown San Diego"),
    ("coronado_bridge", "Coronado Bridge", "Coronado Bridge, San Diego, CA", 32.6902, -117.1545, "Bridge connecting San Diego to Coronado"),
    ("torrey_pines", "Torrey Pines State Natural Reserve", "12600 N Torrey Pines Rd, La Jolla, CA 92037", 32.9196, -117.2535, "State park and beach"),
    ("mission_bay", "Mission Bay Park", "2688 E Mission Bay Dr, San Diego, CA 92109", 32.7743, -117.2322, "Recreational water park"),
];

const SAN_DIEGO_BUILDINGS: &[BuildingRow] = &[
    ("sdsu", "San Diego State University", "5500 Campanile Dr, San Diego, CA 92182", 32.7757, -117.0739, "university", 8, "Public research university"),
    ("sd_convention_center", "San Diego Convention Center", "111 W Harbor Dr, San Diego, CA 92101", 32.7066, -117.1625, "convention_center", 3, "Major convention center downtown"),
    ("sd_airport", "San Diego International Airport", "3225 N Harbor Dr, San Diego, CA 92101", 32.7336, -117.1897, "airport", 2, "International airport"),
    ("sd_city_hall", "San Diego City Hall", "202 C St, San Diego, CA 92101", 32.7175, -117.1625, "government", 13, "San Diego city government building"),
    ("uss_midway", "USS Midway Museum", "910 N Harbor Dr, San Diego, CA 92101", 32.7137, -117.1751, "museum", 4, "Aircraft carrier museum"),
    ("sd_central_library", "San Diego Central Library", "330 Park Blvd, San Diego, CA 92101", 32.7098, -117.1534, "library", 9, "Main public library"),
    ("ucsd_medical_center_hillcrest", "UCSD Medical Center Hillcrest", "200 W Arbor Dr, San Diego, CA 92103", 32.7542, -117.1670, "hospital", 11, "Major medical center in Hillcrest"),
    ("scripps_mercy_hospital", "Scripps Mercy Hospital", "4077 5th Ave, San Diego, CA 92103", 32.7510, -117.1602, "hospital", 8, "Major hospital in Hillcrest"),
    ("sharp_memorial_hospital", "Sharp Memorial Hospital", "7901 Frost St, San Diego, CA 92123", 32.7972, -117.1559, "hospital", 10, "Major hospital in Kearny Mesa"),
];

// ───────────────────────────── Builders ──────────────────────────────────

fn buildings(rows: &[BuildingRow]) -> impl Iterator<Item = NamedPlace> + '_ {
    rows.iter().map(|&(id, name, address, lat, lng, category, floors, description)| NamedPlace {
        id: id.into(),
        name: name.into(),
        address: address.into(),
        center: Coordinate::new(lat, lng),
        description: description.into(),
        detail: PlaceDetail::Building {
            category: Some(category.into()),
            floors: Some(floors),
        },
    })
}

fn landmarks(rows: &[LandmarkRow]) -> impl Iterator<Item = NamedPlace> + '_ {
    rows.iter().map(|&(id, name, address, lat, lng, description)| NamedPlace {
        id: id.into(),
        name: name.into(),
        address: address.into(),
        center: Coordinate::new(lat, lng),
        description: description.into(),
        detail: PlaceDetail::Landmark,
    })
}

fn areas(rows: &[AreaRow]) -> impl Iterator<Item = NamedPlace> + '_ {
    rows.iter().map(|&(id, name, address, lat, lng, category, radius, description)| NamedPlace {
        id: id.into(),
        name: name.into(),
        address: address.into(),
        center: Coordinate::new(lat, lng),
        description: description.into(),
        detail: PlaceDetail::Area {
            category: Some(category.into()),
            radius_meters: Some(radius),
        },
    })
}

pub(super) fn campus_places() -> Vec<NamedPlace> {
    buildings(CAMPUS_BUILDINGS)
        .chain(landmarks(CAMPUS_LANDMARKS))
        .chain(areas(CAMPUS_AREAS))
        .collect()
}

pub(super) fn san_diego_places() -> Vec<NamedPlace> {
    buildings(SAN_DIEGO_BUILDINGS)
        .chain(landmarks(SAN_DIEGO_LANDMARKS))
        .chain(areas(SAN_DIEGO_AREAS))
        .collect()
}

pub(super) fn curated() -> impl Iterator<Item = (&'static str, Coordinate, &'static str)> {
    CURATED
        .iter()
        .map(|&(name, lat, lng, address)| (name, Coordinate::new(lat, lng), address))
}
