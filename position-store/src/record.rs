use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

/// Value stamped into `type` on every record the relay emits.
pub const AIRCRAFT_KIND: &str = "AIRCRAFT";

/// Wire names owned by the record itself. Passthrough telemetry never overrides them.
const RESERVED_FIELDS: &[&str] = &[
    "flight",
    "hex",
    "lat",
    "lon",
    "alt_baro",
    "alt_geom",
    "altitude",
    "track",
    "seen",
    "timestamp",
    "type",
    "groundStationName",
];

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// Barometric and geometric altitude in feet, reported independently by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Altitude {
    pub barometric: i64,
    pub geometric: i64,
}

/// Last known state of one tracked aircraft.
///
/// `seen` is the age reported by the receiver for the snapshot the record came
/// from. It is never recomputed locally.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackedObjectRecord {
    /// Flight callsign, the store key.
    pub identity: String,
    /// 24-bit ICAO address as six hex digits.
    pub hex: Option<String>,
    pub position: Position,
    pub altitude: Altitude,
    /// True track over ground in degrees.
    pub track: f64,
    /// Seconds since the receiver last heard from the aircraft.
    pub seen: f64,
    /// Microseconds since the Unix epoch.
    pub timestamp: Option<i64>,
    /// Receiving station label, stamped by the relay.
    pub station: String,
    pub kind: String,
    /// Upstream fields carried verbatim (rssi, messages, squawk, ...).
    pub telemetry: Map<String, Value>,
}

impl TrackedObjectRecord {
    /// Create a bare record with only identity and position set.
    pub fn new(identity: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            identity: identity.into(),
            position: Position { lat, lon },
            ..Default::default()
        }
    }

    /// A record enters the store only with a callsign and a non-zero position.
    pub fn is_admissible(&self) -> bool {
        !self.identity.trim().is_empty() && self.position.lat != 0.0 && self.position.lon != 0.0
    }

    /// Clean up a freshly decoded record before it is merged.
    ///
    /// A timestamp supplied by the source is kept; only a missing one is stamped
    /// with `now`.
    pub fn normalize(&mut self, station: &str, now: DateTime<Utc>) {
        let trimmed = self.identity.trim();
        if trimmed.len() != self.identity.len() {
            self.identity = trimmed.to_string();
        }
        self.station = station.to_string();
        self.kind = AIRCRAFT_KIND.to_string();
        if self.timestamp.map_or(true, |ts| ts == 0) {
            self.timestamp = Some(now.timestamp_micros());
        }
    }

    /// The reported seen age as a duration.
    pub fn seen_age(&self) -> Duration {
        age_from_secs(self.seen)
    }

    /// Encode the record as an outbound JSON message.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

pub(crate) fn age_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

impl Serialize for TrackedObjectRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("flight", &self.identity)?;
        if let Some(hex) = self.hex.as_deref().filter(|hex| !hex.is_empty()) {
            map.serialize_entry("hex", hex)?;
        }
        map.serialize_entry("lat", &self.position.lat)?;
        map.serialize_entry("lon", &self.position.lon)?;
        if self.altitude.barometric != 0 {
            map.serialize_entry("alt_baro", &self.altitude.barometric)?;
        }
        if self.altitude.geometric != 0 {
            map.serialize_entry("alt_geom", &self.altitude.geometric)?;
        }
        if self.track != 0.0 {
            map.serialize_entry("track", &self.track)?;
        }
        if self.seen != 0.0 {
            map.serialize_entry("seen", &self.seen)?;
        }
        if let Some(ts) = self.timestamp.filter(|ts| *ts != 0) {
            map.serialize_entry("timestamp", &ts)?;
        }
        if !self.kind.is_empty() {
            map.serialize_entry("type", &self.kind)?;
        }
        if !self.station.is_empty() {
            map.serialize_entry("groundStationName", &self.station)?;
        }
        for (key, value) in &self.telemetry {
            if RESERVED_FIELDS.contains(&key.as_str()) || is_empty_value(value) {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl fmt::Display for TrackedObjectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aircraft(flight: \"{}\"", self.identity)?;
        if let Some(hex) = &self.hex {
            write!(f, ", hex: {}", hex)?;
        }
        write!(
            f,
            ", pos: {:.5},{:.5}, alt: {}/{}, trk: {:.1}, seen: {:.1})",
            self.position.lat,
            self.position.lon,
            self.altitude.barometric,
            self.altitude.geometric,
            self.track,
            self.seen
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn admissible_requires_identity_and_position() {
        assert!(TrackedObjectRecord::new("UAL1", 1.0, 2.0).is_admissible());
        assert!(!TrackedObjectRecord::new("", 1.0, 2.0).is_admissible());
        assert!(!TrackedObjectRecord::new("   ", 1.0, 2.0).is_admissible());
        assert!(!TrackedObjectRecord::new("UAL1", 0.0, 2.0).is_admissible());
        assert!(!TrackedObjectRecord::new("UAL1", 1.0, 0.0).is_admissible());
    }

    #[test]
    fn normalize_trims_and_stamps() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut record = TrackedObjectRecord::new("  BAW12  ", 51.5, -0.1);
        record.normalize("heathrow-1", now);

        assert_eq!(record.identity, "BAW12");
        assert_eq!(record.station, "heathrow-1");
        assert_eq!(record.kind, AIRCRAFT_KIND);
        assert_eq!(record.timestamp, Some(1_700_000_000_000_000));
    }

    #[test]
    fn normalize_keeps_source_timestamp() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut record = TrackedObjectRecord::new("BAW12", 51.5, -0.1);
        record.timestamp = Some(42);
        record.normalize("heathrow-1", now);
        assert_eq!(record.timestamp, Some(42));
    }

    #[test]
    fn seen_age_clamps_invalid_values() {
        let mut record = TrackedObjectRecord::new("A", 1.0, 2.0);
        record.seen = 1.5;
        assert_eq!(record.seen_age(), Duration::from_millis(1500));
        record.seen = -3.0;
        assert_eq!(record.seen_age(), Duration::ZERO);
        record.seen = f64::NAN;
        assert_eq!(record.seen_age(), Duration::ZERO);
    }

    #[test]
    fn json_omits_zero_fields_and_keeps_upstream_names() {
        let mut record = TrackedObjectRecord::new("DAL9", 33.6, -84.4);
        record.altitude.geometric = 3500;
        record.station = "atl".to_string();
        record.kind = AIRCRAFT_KIND.to_string();
        record.telemetry.insert("rssi".to_string(), json!(-21.4));
        record.telemetry.insert("squawk".to_string(), json!(""));
        record.telemetry.insert("messages".to_string(), json!(0));

        let value: Value = serde_json::from_slice(&record.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "flight": "DAL9",
                "lat": 33.6,
                "lon": -84.4,
                "alt_geom": 3500,
                "type": "AIRCRAFT",
                "groundStationName": "atl",
                "rssi": -21.4
            })
        );
    }

    #[test]
    fn display_summarizes_position() {
        let mut record = TrackedObjectRecord::new("DAL9", 33.64, -84.42);
        record.hex = Some("a0b1c2".to_string());
        record.altitude.barometric = 2500;
        record.track = 270.0;
        assert_eq!(
            record.to_string(),
            "Aircraft(flight: \"DAL9\", hex: a0b1c2, pos: 33.64000,-84.42000, alt: 2500/0, trk: 270.0, seen: 0.0)"
        );
    }

    #[test]
    fn telemetry_cannot_shadow_record_fields() {
        let mut record = TrackedObjectRecord::new("DAL9", 33.6, -84.4);
        record.kind = AIRCRAFT_KIND.to_string();
        record
            .telemetry
            .insert("type".to_string(), json!("adsb_icao"));

        let value: Value = serde_json::from_slice(&record.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "AIRCRAFT");
    }
}
