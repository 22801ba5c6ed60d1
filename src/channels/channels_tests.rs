// ─────────────────────────────── Tests ───────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use crate::channels::*;
    use crate::directory::Recipient;
    use crate::geo::Coordinate;

    fn content() -> MessageContent {
        MessageContent {
            incident_type: "fire".into(),
            summary: "fire: building".into(),
            description: "Smoke on the 3rd floor".into(),
            location: "Warren College".into(),
            action_required: "Evacuate the building".into(),
            severity: "HIGH".into(),
            details_url: "https://alerts.ucsd.edu/details/ABC123".into(),
        }
    }

    // ── Registry ──

    #[test]
    fn default_registry_tiers() {
        let reg = ChannelRegistry::with_defaults();
        assert_eq!(reg.len(), 6);
        let sms = reg.get("sms").unwrap();
        assert_eq!(sms.kind, ChannelKind::Sms);
        assert_eq!(sms.priority_tier, 1);
        assert_eq!(sms.rate_limit(), Duration::from_secs(300));
        assert_eq!(reg.get("phone").unwrap().rate_limit_secs, 1800);
        assert!(reg.get("carrier_pigeon").is_none());
    }

    #[test]
    fn by_urgency_is_stable() {
        let reg = ChannelRegistry::with_defaults();
        let ids: Vec<&str> = reg.by_urgency().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["sms", "phone", "radio", "app_push", "digital_signage", "email"]
        );
    }

    #[test]
    fn handle_rules_per_kind() {
        let mut r = Recipient::new("Sam", "staff", Coordinate::new(32.88, -117.23));
        r.phone_number = Some("+15550000000".into());
        r.email = Some("   ".into());
        assert_eq!(ChannelKind::Sms.handle(&r), Some("+15550000000"));
        assert_eq!(ChannelKind::Phone.handle(&r), Some("+15550000000"));
        assert_eq!(ChannelKind::Email.handle(&r), None);
        assert_eq!(ChannelKind::Radio.handle(&r), None);

        r.signage_area_id = Some("price_center_east".into());
        assert_eq!(ChannelKind::DigitalSignage.handle(&r), Some("price_center_east"));
    }

    #[test]
    fn kind_parses_from_id() {
        assert_eq!("app_push".parse::<ChannelKind>().unwrap(), ChannelKind::AppPush);
        assert_eq!(" SMS ".parse::<ChannelKind>().unwrap(), ChannelKind::Sms);
        assert!("fax".parse::<ChannelKind>().is_err());
    }

    // ── Templates ──

    #[test]
    fn sms_template_renders() {
        let reg = ChannelRegistry::with_defaults();
        let msg = reg.get("sms").unwrap().render(&content());
        assert_eq!(
            msg,
            "ALERT: fire at Warren College. Evacuate the building. \
             More info: https://alerts.ucsd.edu/details/ABC123"
        );
    }

    #[test]
    fn email_template_keeps_line_breaks() {
        let reg = ChannelRegistry::with_defaults();
        let msg = reg.get("email").unwrap().render(&content());
        assert!(msg.starts_with("CAMPUS ALERT: fire\n\nLocation: Warren College\n\n"));
        assert!(msg.contains("Recommended action: Evacuate the building"));
    }

    #[test]
    fn unknown_placeholder_falls_back() {
        let channel = Channel::new(ChannelKind::Sms, "Custom", 1, 0, "Hi {recipient_name}: {summary}");
        assert_eq!(
            channel.render(&content()),
            "ALERT: fire at Warren College. Evacuate the building"
        );
    }

    #[test]
    fn escaped_braces_are_literal() {
        let out = render_template("{{{severity}}} {summary}", &content()).unwrap();
        assert_eq!(out, "{HIGH} fire: building");
        assert!(render_template("oops }", &content()).is_none());
        assert!(render_template("open {summary", &content()).is_none());
    }

    // ── Rate limits ──

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn check_window(store: &dyn RateLimitStore) {
        let window = Duration::from_secs(300);
        assert_eq!(
            store.try_acquire("r1", "sms", window, at(0)).unwrap(),
            Acquire::Granted { previous: None }
        );
        match store.try_acquire("r1", "sms", window, at(120)).unwrap() {
            Acquire::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(180)),
            other => panic!("expected limit, got {other:?}"),
        }
        // Other pairs are independent.
        assert!(matches!(
            store.try_acquire("r1", "email", window, at(120)).unwrap(),
            Acquire::Granted { .. }
        ));
        assert_eq!(
            store.try_acquire("r1", "sms", window, at(300)).unwrap(),
            Acquire::Granted {
                previous: Some(at(0).timestamp_millis())
            }
        );
    }

    fn check_release(store: &dyn RateLimitStore) {
        let window = Duration::from_secs(60);
        store.try_acquire("r2", "radio", window, at(0)).unwrap();
        let Acquire::Granted { previous } = store.try_acquire("r2", "radio", window, at(100)).unwrap()
        else {
            panic!("expected grant");
        };
        store.release("r2", "radio", at(100), previous).unwrap();
        assert_eq!(store.last_sent("r2", "radio").unwrap(), Some(at(0).timestamp_millis()));

        // A stale release does not clobber a newer send.
        store.try_acquire("r2", "radio", window, at(200)).unwrap();
        store.release("r2", "radio", at(100), None).unwrap();
        assert_eq!(store.last_sent("r2", "radio").unwrap(), Some(at(200).timestamp_millis()));

        let Acquire::Granted { previous } = store.try_acquire("r3", "sms", window, at(0)).unwrap()
        else {
            panic!("expected grant");
        };
        store.release("r3", "sms", at(0), previous).unwrap();
        assert_eq!(store.last_sent("r3", "sms").unwrap(), None);
    }

    #[test]
    fn memory_store_window() {
        check_window(&MemoryRateLimits::new());
    }

    #[test]
    fn memory_store_release() {
        check_release(&MemoryRateLimits::new());
    }

    #[test]
    fn sqlite_store_window_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRateLimits::open(dir.path().join("limits.sqlite")).unwrap();
        check_window(&store);
        check_release(&store);
    }

    #[test]
    fn sqlite_store_shared_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.sqlite");
        let a = SqliteRateLimits::open(&path).unwrap();
        let b = SqliteRateLimits::open(&path).unwrap();
        let window = Duration::from_secs(600);

        assert!(matches!(
            a.try_acquire("r1", "email", window, at(0)).unwrap(),
            Acquire::Granted { .. }
        ));
        assert!(matches!(
            b.try_acquire("r1", "email", window, at(10)).unwrap(),
            Acquire::Limited { .. }
        ));
    }

    #[test]
    fn concurrent_acquire_grants_once() {
        let store = Arc::new(MemoryRateLimits::new());
        let now = at(0);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .try_acquire("r1", "sms", Duration::from_secs(300), now)
                        .unwrap()
                })
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|a| matches!(a, Acquire::Granted { .. }))
            .count();
        assert_eq!(granted, 1);
    }
}
