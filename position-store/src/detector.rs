use thiserror::Error;

use crate::record::TrackedObjectRecord;

/// Raised when two records cannot be compared because they do not describe
/// the same known object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("record represents an unknown aircraft (empty identity)")]
    Unknown,
    #[error("records represent different aircraft: {left} != {right}")]
    Mismatch { left: String, right: String },
}

/// Decide whether `b` is a material change over `a`.
///
/// Only position, both altitudes and track take part. Telemetry such as signal
/// strength or message counts changes on every snapshot and is ignored.
pub fn has_moved(a: &TrackedObjectRecord, b: &TrackedObjectRecord) -> Result<bool, IdentityError> {
    if a.identity.is_empty() || b.identity.is_empty() {
        return Err(IdentityError::Unknown);
    }
    if a.identity != b.identity {
        return Err(IdentityError::Mismatch {
            left: a.identity.clone(),
            right: b.identity.clone(),
        });
    }

    Ok(a.position.lat != b.position.lat
        || a.position.lon != b.position.lon
        || a.altitude.geometric != b.altitude.geometric
        || a.altitude.barometric != b.altitude.barometric
        || a.track != b.track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(
        identity: &str,
        lat: f64,
        lon: f64,
        alt_geom: i64,
        track: f64,
    ) -> TrackedObjectRecord {
        let mut r = TrackedObjectRecord::new(identity, lat, lon);
        r.altitude.geometric = alt_geom;
        r.track = track;
        r
    }

    #[test]
    fn identical_records_have_not_moved() {
        let a = record("a1", 1.1, 2.2, 3, 4.1);
        assert_eq!(has_moved(&a, &a.clone()), Ok(false));
    }

    #[test]
    fn each_compared_field_flags_movement() {
        let base = record("a1", 1.0, 2.0, 3, 4.0);

        let cases: Vec<(&str, TrackedObjectRecord)> = vec![
            ("lat", record("a1", 2.0, 2.0, 3, 4.0)),
            ("lon", record("a1", 1.0, 3.0, 3, 4.0)),
            ("alt_geom", record("a1", 1.0, 2.0, 4, 4.0)),
            ("track", record("a1", 1.0, 2.0, 3, 5.0)),
            ("alt_baro", {
                let mut r = base.clone();
                r.altitude.barometric = 1200;
                r
            }),
        ];

        for (name, moved) in cases {
            assert_eq!(has_moved(&base, &moved), Ok(true), "field {name}");
        }
    }

    #[test]
    fn telemetry_changes_are_ignored() {
        let a = record("a1", 1.0, 2.0, 3, 4.0);
        let mut b = a.clone();
        b.seen = 17.0;
        b.timestamp = Some(99);
        b.hex = Some("a1b2c3".to_string());
        b.station = "elsewhere".to_string();
        b.telemetry.insert("rssi".to_string(), json!(-3.2));
        b.telemetry.insert("messages".to_string(), json!(1024));

        assert_eq!(has_moved(&a, &b), Ok(false));
    }

    #[test]
    fn different_aircraft_are_rejected() {
        let a = record("a1", 1.0, 2.0, 3, 4.0);
        let b = record("a2", 1.0, 2.0, 3, 4.0);
        assert_eq!(
            has_moved(&a, &b),
            Err(IdentityError::Mismatch {
                left: "a1".to_string(),
                right: "a2".to_string()
            })
        );
    }

    #[test]
    fn unknown_aircraft_are_rejected() {
        let a = record("", 1.0, 2.0, 3, 4.0);
        let b = record("a1", 1.0, 2.0, 3, 4.0);
        assert_eq!(has_moved(&a, &a.clone()), Err(IdentityError::Unknown));
        assert_eq!(has_moved(&a, &b), Err(IdentityError::Unknown));
        assert_eq!(has_moved(&b, &a), Err(IdentityError::Unknown));
    }
}
