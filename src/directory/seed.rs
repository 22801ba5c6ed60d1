//! Sample directory used when no recipient file is configured.

use super::{EMERGENCY_RESPONDERS, Recipient, RecipientGroup, SeverityThreshold};
use crate::geo::Coordinate;

/// `(id, name, description, parents)`
const GROUPS: &[(&str, &str, &str, &[&str])] = &[
    (EMERGENCY_RESPONDERS, "Emergency Responders", "Campus emergency response personnel", &[]),
    ("campus_police", "Campus Police", "Sworn campus police officers", &[EMERGENCY_RESPONDERS]),
    ("leadership", "Campus Leadership", "University leadership team", &[]),
    ("students", "Students", "All enrolled students", &[]),
    ("faculty", "Faculty", "All faculty members", &[]),
    ("staff", "Staff", "All staff members", &[]),
    ("facilities", "Facilities", "Facilities and maintenance personnel", &["staff"]),
];

struct Contact {
    email: &'static str,
    phone: &'static str,
    device: &'static str,
    radio: Option<&'static str>,
}

#[allow(clippy::too_many_arguments)]
fn person(
    id: &str,
    name: &str,
    role: &str,
    groups: &[&str],
    contact: Contact,
    at: (f64, f64),
    channels: &[&str],
    threshold: SeverityThreshold,
) -> Recipient {
    let mut r = Recipient::new(name, role, Coordinate::new(at.0, at.1))
        .with_id(id)
        .with_groups(groups.iter().copied())
        .with_channels(channels.iter().copied())
        .with_threshold(threshold);
    r.email = Some(contact.email.into());
    r.phone_number = Some(contact.phone.into());
    r.device_token = Some(contact.device.into());
    r.radio_id = contact.radio.map(Into::into);
    r
}

pub(super) fn sample() -> (Vec<RecipientGroup>, Vec<Recipient>) {
    let groups = GROUPS
        .iter()
        .map(|&(id, name, description, parents)| {
            RecipientGroup::new(id, name)
                .with_description(description)
                .with_parents(parents.iter().copied())
        })
        .collect();

    let mut jordan = person(
        "r006",
        "Jordan Lee",
        "student",
        &["students"],
        Contact {
            email: "jordan.lee@ucsd.edu",
            phone: "+15551234572",
            device: "device_token_006",
            radio: None,
        },
        (32.8810, -117.2380),
        &["app_push", "sms"],
        SeverityThreshold::Medium,
    );
    jordan.notification_preferences.quiet_hours_start = Some(23);
    jordan.notification_preferences.quiet_hours_end = Some(7);

    let recipients = vec![
        person(
            "r001",
            "Chief Roberts",
            "campus_police_chief",
            &[EMERGENCY_RESPONDERS, "campus_police", "leadership"],
            Contact {
                email: "chief.roberts@ucsd.edu",
                phone: "+15551234567",
                device: "device_token_001",
                radio: Some("radio_001"),
            },
            (32.8801, -117.2340),
            &["sms", "phone", "radio", "email", "app_push"],
            SeverityThreshold::Low,
        ),
        person(
            "r002",
            "Officer Garcia",
            "campus_police",
            &[EMERGENCY_RESPONDERS, "campus_police"],
            Contact {
                email: "officer.garcia@ucsd.edu",
                phone: "+15551234568",
                device: "device_token_002",
                radio: Some("radio_002"),
            },
            (32.8795, -117.2360),
            &["radio", "app_push", "sms"],
            SeverityThreshold::Low,
        ),
        person(
            "r003",
            "Dr. Chen",
            "dean",
            &["leadership", "faculty"],
            Contact {
                email: "dean.chen@ucsd.edu",
                phone: "+15551234569",
                device: "device_token_003",
                radio: None,
            },
            (32.8785, -117.2330),
            &["email", "app_push", "sms"],
            SeverityThreshold::Medium,
        ),
        person(
            "r004",
            "Maintenance Team",
            "facilities",
            &["staff", "facilities"],
            Contact {
                email: "maintenance@ucsd.edu",
                phone: "+15551234570",
                device: "device_token_004",
                radio: Some("radio_003"),
            },
            (32.8788, -117.2410),
            &["radio", "sms"],
            SeverityThreshold::Low,
        ),
        person(
            "r005",
            "Alex Smith",
            "student",
            &["students"],
            Contact {
                email: "alex.smith@ucsd.edu",
                phone: "+15551234571",
                device: "device_token_005",
                radio: None,
            },
            (32.8782, -117.2392),
            &["app_push", "email"],
            SeverityThreshold::Medium,
        ),
        jordan,
        person(
            "r007",
            "Prof. Taylor",
            "faculty",
            &["faculty"],
            Contact {
                email: "prof.taylor@ucsd.edu",
                phone: "+15551234573",
                device: "device_token_007",
                radio: None,
            },
            (32.8800, -117.2355),
            &["email", "app_push", "sms"],
            SeverityThreshold::Medium,
        ),
    ];

    (groups, recipients)
}
