// ─────────────────────────────── Tests ───────────────────────────────────

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::catalog::{LocationCatalog, NamedPlace};
    use crate::geo::{Coordinate, distance_meters};
    use crate::resolver::keywords::*;
    use crate::resolver::*;

    fn seeded() -> LocationResolver {
        LocationResolver::new(LocationCatalog::with_seed().into_shared())
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    /// Each axis is bounded by the jitter radius, so the offset is bounded
    /// by the diagonal.
    fn within_jitter(r: &GeocodeResult, meters: f64) -> bool {
        distance_meters(r.anchor, r.coordinate) <= meters * 2f64.sqrt() + 0.5
    }

    // ── Default tier ──

    #[test]
    fn empty_and_none_fall_to_default() {
        let resolver = seeded();
        for r in [resolver.resolve(""), resolver.resolve(None), resolver.resolve("   ")] {
            assert_eq!(r.source, GeocodeSource::Default);
            assert_eq!(r.confidence, 0);
            assert_eq!(r.anchor, DEFAULT_CENTER);
            assert!(within_jitter(&r, 1_000.0));
        }
    }

    #[test]
    fn nonexistent_location_is_default() {
        let resolver = seeded();
        let r = resolver.resolve_with_rng(Some("Nonexistent Location Name"), &mut rng());
        assert_eq!(r.source, GeocodeSource::Default);
        assert_eq!(r.confidence, 0);
        assert_eq!(r.address, "San Diego, CA");
        assert!(within_jitter(&r, 1_000.0));
    }

    // ── Exact / database ──

    #[test]
    fn well_known_landmark_is_exact() {
        let resolver = seeded();
        let r = resolver.resolve_with_rng(Some("Price Center at UCSD"), &mut rng());
        assert_eq!(r.source, GeocodeSource::Exact);
        assert_eq!(r.confidence, 100);
        // Longest well-known name wins over "UCSD".
        assert_eq!(r.matched_name.as_deref(), Some("Price Center"));
        assert_eq!(r.anchor, Coordinate::new(32.8794, -117.2359));
        assert!(within_jitter(&r, 30.0));
    }

    #[test]
    fn catalog_place_is_database() {
        let resolver = seeded();
        let r = resolver.resolve_with_rng(Some("Alarm at york hall, 2nd floor"), &mut rng());
        assert_eq!(r.source, GeocodeSource::Database);
        assert_eq!(r.confidence, 100);
        assert_eq!(r.matched_name.as_deref(), Some("York Hall"));
        assert_eq!(r.anchor, Coordinate::new(32.8745, -117.2401));
    }

    #[test]
    fn every_place_name_resolves_to_its_center() {
        let catalog = LocationCatalog::with_seed();
        let places: Vec<NamedPlace> = catalog.all_places().cloned().collect();
        let resolver = LocationResolver::new(catalog.into_shared());
        let mut rng = rng();

        for place in places {
            let text = format!("incident reported near {}", place.name);
            let r = resolver.resolve_with_rng(Some(&text), &mut rng);
            assert_ne!(r.source, GeocodeSource::Default, "{text}");
            assert_eq!(r.anchor, place.center, "{text}");
            assert!(within_jitter(&r, 30.0), "{text}");
        }
    }

    #[test]
    fn jitter_is_regenerated_per_call() {
        let resolver = seeded();
        let a = resolver.resolve("Geisel Library");
        let b = resolver.resolve("Geisel Library");
        assert_eq!(a.anchor, b.anchor);
        assert_ne!(a.coordinate, b.coordinate);
    }

    #[test]
    fn zero_jitter_config_is_stable() {
        let config = ResolverConfig {
            place_jitter_meters: 0.0,
            ..Default::default()
        };
        let resolver = LocationResolver::with_config(LocationCatalog::with_seed().into_shared(), config);
        let r = resolver.resolve("Jacobs Hall");
        assert_eq!(r.coordinate, r.anchor);
    }

    // ── Fuzzy ──

    #[test]
    fn keyword_fragment_is_fuzzy_80() {
        let resolver = seeded();
        // No full name is contained; the fragment after "at" starts one.
        let r = resolver.resolve_with_rng(Some("Fire at Geisel"), &mut rng());
        assert_eq!(r.source, GeocodeSource::Fuzzy);
        assert_eq!(r.confidence, 80);
        assert_eq!(r.matched_name.as_deref(), Some("Geisel Library"));
        assert_eq!(r.anchor, Coordinate::new(32.8810, -117.2370));
        assert!(within_jitter(&r, 30.0));
    }

    #[test]
    fn word_score_is_fuzzy_60() {
        let resolver = seeded();
        // "Revelle" alone is not a full catalog name, and "revelle dorms"
        // does not start any name.
        let r = resolver.resolve_with_rng(Some("smoke near revelle dorms"), &mut rng());
        assert_eq!(r.source, GeocodeSource::Fuzzy);
        assert_eq!(r.confidence, 60);
        assert_eq!(r.matched_name.as_deref(), Some("Revelle College"));
        assert_eq!(r.anchor, Coordinate::new(32.8745, -117.2410));
    }

    #[test]
    fn word_score_needs_a_long_word() {
        let mut catalog = LocationCatalog::new();
        catalog
            .add_known_location("Lot P 7", Coordinate::new(32.88, -117.23), "Lot P7")
            .unwrap();
        let resolver = LocationResolver::new(catalog.into_shared());
        // "p" and "7" appear but are shorter than three characters.
        let r = resolver.resolve_with_rng(Some("a p 7 q"), &mut rng());
        assert_eq!(r.source, GeocodeSource::Default);
    }

    // ── Campus mention ──

    #[test]
    fn campus_mention_lands_in_box() {
        let resolver = LocationResolver::new(LocationCatalog::new().into_shared());
        let mut rng = rng();
        for _ in 0..50 {
            let r = resolver.resolve_with_rng(Some("somewhere on campus"), &mut rng);
            assert_eq!(r.source, GeocodeSource::CampusMention);
            assert_eq!(r.confidence, 50);
            assert!((CAMPUS_LAT.0..=CAMPUS_LAT.1).contains(&r.coordinate.latitude));
            assert!((CAMPUS_LNG.0..=CAMPUS_LNG.1).contains(&r.coordinate.longitude));
        }
    }

    #[test]
    fn campus_mention_needs_word_boundary() {
        let resolver = LocationResolver::new(LocationCatalog::new().into_shared());
        let r = resolver.resolve_with_rng(Some("the campuses downtown"), &mut rng());
        assert_eq!(r.source, GeocodeSource::Default);
    }

    // ── Batch ──

    #[test]
    fn batch_keeps_order() {
        let resolver = seeded();
        let results = resolver.resolve_batch(["Geisel Library", "", "Revelle College"]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].1.source, GeocodeSource::Exact);
        assert_eq!(results[1].1.source, GeocodeSource::Default);
        assert_eq!(results[2].1.source, GeocodeSource::Database);
        assert_eq!(results[2].0, "Revelle College");
    }

    #[test]
    fn source_serializes_kebab_case() {
        let json = serde_json::to_string(&GeocodeSource::CampusMention).unwrap();
        assert_eq!(json, "\"campus-mention\"");
    }
}
