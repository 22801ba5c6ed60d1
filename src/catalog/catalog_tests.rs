// ─────────────────────────────── Tests ───────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::Error;
    use crate::catalog::*;
    use crate::catalog::longest_contained;
    use crate::geo::{Coordinate, distance_meters};

    const GEISEL: Coordinate = Coordinate::new(32.8810, -117.2370);

    // ── Seed ──

    #[test]
    fn seed_has_campus_places() {
        let catalog = LocationCatalog::with_seed();
        assert_eq!(catalog.places_of(PlaceKind::Building).count(), 10);
        assert_eq!(catalog.places_of(PlaceKind::Landmark).count(), 6);
        assert_eq!(catalog.places_of(PlaceKind::Area).count(), 12);
        // Every place name is in the flat index.
        for place in catalog.all_places() {
            assert!(catalog.known_locations().contains_key(&place.name), "{}", place.name);
        }
        assert!(catalog.known_locations().contains_key("Pepper Canyon"));
    }

    #[test]
    fn san_diego_seed_extends_campus() {
        let catalog = LocationCatalog::with_san_diego_seed();
        let petco = catalog.lookup_details("Crowd outside Petco Park").unwrap();
        assert_eq!(petco.kind(), PlaceKind::Landmark);
        assert!(catalog.lookup_details("Geisel Library").is_some());
    }

    // ── Lookups ──

    #[test]
    fn lookup_is_case_insensitive_containment() {
        let catalog = LocationCatalog::with_seed();
        assert_eq!(
            catalog.lookup_by_name("smoke reported NEAR geisel library entrance"),
            Some(GEISEL)
        );
        assert_eq!(catalog.lookup_by_name("somewhere else entirely"), None);
        assert_eq!(catalog.lookup_by_name(""), None);
    }

    #[test]
    fn longest_contained_name_wins() {
        let catalog = LocationCatalog::with_seed();
        // "San Diego" and "UC San Diego" both match; the longer one wins.
        let hit = catalog.lookup("UC San Diego main quad").unwrap();
        assert_eq!(hit.name(), "UC San Diego");
        assert_eq!(hit.center(), Coordinate::new(32.8801, -117.2340));
    }

    #[test]
    fn longest_contained_prefers_earlier_on_ties() {
        let items = [("abc", 1), ("xyz", 2), ("ab", 3)];
        assert_eq!(longest_contained("abc xyz", items), Some(1));
        assert_eq!(longest_contained("ab only", items), Some(3));
        assert_eq!(longest_contained("nothing", items), None);
        assert_eq!(longest_contained("anything", [("", 9)]), None);
    }

    #[test]
    fn details_carry_area_radius() {
        let catalog = LocationCatalog::with_seed();
        let revelle = catalog.lookup_details("Fight at Revelle College").unwrap();
        assert_eq!(revelle.id, "revelle_college");
        assert_eq!(revelle.kind(), PlaceKind::Area);
        assert_eq!(revelle.radius_meters(), Some(200.0));
    }

    #[test]
    fn curated_names_only_in_flat_index() {
        let catalog = LocationCatalog::with_seed();
        assert!(catalog.lookup_details("Pepper Canyon").is_none());
        let (name, entry) = catalog.lookup_known("Pepper Canyon lot").unwrap();
        assert_eq!(name, "Pepper Canyon");
        assert_eq!(entry.origin, EntryOrigin::Curated);
        assert!(catalog.lookup_by_name("Pepper Canyon lot").is_some());
    }

    #[test]
    fn lookup_place_filters_kinds() {
        let catalog = LocationCatalog::with_seed();
        let only_areas = [PlaceKind::Area];
        assert!(catalog.lookup_place("Sun God Statue", &only_areas).is_none());
        assert!(catalog.lookup_place("Sun God Statue", &PlaceKind::ALL).is_some());
    }

    // ── Radius search ──

    #[test]
    fn radius_search_sorted_by_distance() {
        let catalog = LocationCatalog::with_seed();
        let hits = catalog.find_within_radius(GEISEL, 300.0, None);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].place.id, "geisel_library");
        assert_eq!(hits[0].distance_meters, 0.0);
        for pair in hits.windows(2) {
            assert!(pair[0].distance_meters <= pair[1].distance_meters);
        }
        for hit in &hits {
            assert!(hit.distance_meters <= 300.0);
        }
    }

    #[test]
    fn radius_search_ignores_area_radius() {
        let catalog = LocationCatalog::with_seed();
        // 150 m north of Revelle's center: inside its 200 m radius, but the
        // search only tests centers.
        let probe = Coordinate::new(32.8745 + 150.0 / 111_111.0, -117.2410);
        let hits = catalog.find_within_radius(probe, 50.0, Some(PlaceKind::Area));
        assert!(hits.iter().all(|h| h.place.id != "revelle_college"));
    }

    #[test]
    fn radius_search_type_filter() {
        let catalog = LocationCatalog::with_seed();
        let hits = catalog.find_within_radius(GEISEL, 1_000.0, Some(PlaceKind::Landmark));
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.place.kind() == PlaceKind::Landmark));
    }

    // ── Mutations ──

    #[test]
    fn upsert_derives_id_and_indexes_name() {
        let mut catalog = LocationCatalog::with_seed();
        let center = Coordinate::new(32.8770, -117.2390);
        let id = catalog
            .upsert(NamedPlace::building("Mandeville Center-East", center))
            .unwrap();
        assert_eq!(id, "mandeville_center_east");
        assert_eq!(catalog.lookup_by_name("at mandeville center-east"), Some(center));
        assert!(catalog.get(&id, PlaceKind::Building).is_some());
    }

    #[test]
    fn upsert_rejects_bad_input() {
        let mut catalog = LocationCatalog::new();
        let err = catalog
            .upsert(NamedPlace::landmark("  ", GEISEL))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = catalog
            .upsert(NamedPlace::landmark("Nowhere", Coordinate::new(f64::NAN, 0.0)))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(catalog.place_count(), 0);
    }

    #[test]
    fn rename_moves_index_entry() {
        let mut catalog = LocationCatalog::with_seed();
        let patch = PlacePatch {
            name: Some("Geisel Tower".into()),
            ..Default::default()
        };
        catalog
            .update("geisel_library", PlaceKind::Building, patch)
            .unwrap();

        assert!(!catalog.known_locations().contains_key("Geisel Library"));
        let entry = &catalog.known_locations()["Geisel Tower"];
        assert_eq!(entry.coordinate, GEISEL);
        assert_eq!(catalog.lookup_by_name("Geisel Library"), None);
    }

    #[test]
    fn update_moves_coordinate_and_radius() {
        let mut catalog = LocationCatalog::with_seed();
        let moved = Coordinate::new(32.8700, -117.2400);
        let patch = PlacePatch {
            center: Some(moved),
            radius_meters: Some(250.0),
            ..Default::default()
        };
        catalog.update("muir_college", PlaceKind::Area, patch).unwrap();
        let muir = catalog.get("muir_college", PlaceKind::Area).unwrap();
        assert_eq!(muir.radius_meters(), Some(250.0));
        assert_eq!(catalog.known_locations()["Muir College"].coordinate, moved);
    }

    #[test]
    fn update_and_delete_unknown_are_not_found() {
        let mut catalog = LocationCatalog::with_seed();
        let err = catalog
            .update("nope", PlaceKind::Building, PlacePatch::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        // Right ID, wrong kind.
        let err = catalog.delete("geisel_library", PlaceKind::Area).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn delete_removes_index_entry() {
        let mut catalog = LocationCatalog::with_seed();
        let removed = catalog.delete("fallen_star", PlaceKind::Landmark).unwrap();
        assert_eq!(removed.name, "Fallen Star");
        assert!(!catalog.known_locations().contains_key("Fallen Star"));
        assert_eq!(catalog.lookup_by_name("near the Fallen Star"), None);
    }

    #[test]
    fn delete_falls_back_to_curated_entry() {
        let mut catalog = LocationCatalog::with_seed();
        let curated_at = Coordinate::new(32.8787, -117.2401);
        catalog
            .add_known_location("Sun God Statue", curated_at, "Sun God lawn")
            .unwrap();
        // The place still wins while it exists.
        assert_eq!(catalog.known_locations()["Sun God Statue"].coordinate.latitude, 32.8786);

        catalog.delete("sun_god", PlaceKind::Landmark).unwrap();
        let entry = &catalog.known_locations()["Sun God Statue"];
        assert_eq!(entry.coordinate, curated_at);
        assert_eq!(entry.origin, EntryOrigin::Curated);
    }

    // ── Persistence ──

    #[test]
    fn open_seeds_and_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let places = dir.path().join("data/locations.json");
        let known = dir.path().join("data/known_locations.json");

        let mut catalog = LocationCatalog::open(Some(places.clone()), Some(known.clone()));
        assert_eq!(catalog.place_count(), 28);
        assert!(places.exists());
        assert!(known.exists());

        let center = Coordinate::new(32.8760, -117.2380);
        catalog
            .upsert(
                NamedPlace::area("Pepper Canyon West", center, Some(120.0))
                    .with_address("Pepper Canyon, UC San Diego"),
            )
            .unwrap();

        let reopened = LocationCatalog::open(Some(places), Some(known));
        let area = reopened
            .get("pepper_canyon_west", PlaceKind::Area)
            .unwrap();
        assert_eq!(area.center, center);
        assert_eq!(area.radius_meters(), Some(120.0));
        assert_eq!(area.address, "Pepper Canyon, UC San Diego");
        assert!(reopened.known_locations().contains_key("BCB Café"));
    }

    #[test]
    fn stored_format_uses_collection_keys() {
        let dir = tempfile::tempdir().unwrap();
        let places = dir.path().join("locations.json");
        let _ = LocationCatalog::open(Some(places.clone()), None);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&places).unwrap()).unwrap();
        let geisel = &raw["buildings"]["geisel_library"];
        assert_eq!(geisel["name"], "Geisel Library");
        assert_eq!(geisel["coordinates"]["latitude"], 32.8810);
        assert_eq!(geisel["floors"], 8);
        assert_eq!(raw["areas"]["revelle_college"]["radius"], 200.0);
    }

    #[test]
    fn unreadable_file_falls_back_to_seed() {
        let dir = tempfile::tempdir().unwrap();
        let places = dir.path().join("locations.json");
        std::fs::write(&places, "{ not json").unwrap();

        let catalog = LocationCatalog::open(Some(places), None);
        assert_eq!(catalog.place_count(), 28);
        assert!(catalog.lookup_by_name("Price Center").is_some());
    }

    #[test]
    fn seed_centers_match_index() {
        let catalog = LocationCatalog::with_seed();
        for place in catalog.all_places() {
            let entry = &catalog.known_locations()[&place.name];
            assert_eq!(distance_meters(entry.coordinate, place.center), 0.0);
        }
    }
}
