use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::record::{Altitude, Position, TrackedObjectRecord};
use crate::store::Sightings;

/// One `aircraft.json` document as written by the receiver.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    /// Seconds since the Unix epoch at which the file was generated.
    #[serde(default)]
    pub now: f64,
    /// Total Mode S messages processed since the receiver started.
    #[serde(default)]
    pub messages: u64,
    #[serde(default)]
    pub aircraft: Vec<SourceAircraft>,
}

impl Snapshot {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        if !self.now.is_finite() || self.now <= 0.0 {
            return None;
        }
        let micros = (self.now * 1_000_000.0).round() as i64;
        DateTime::from_timestamp_micros(micros)
    }

    /// Every identity the snapshot mentions, admissible or not, with its
    /// reported seen age.
    pub fn sightings(&self) -> Sightings {
        self.aircraft
            .iter()
            .filter_map(|ac| {
                let identity = ac.flight.as_deref()?.trim();
                Some((identity.to_string(), ac.seen.unwrap_or(0.0)))
            })
            .collect()
    }

    pub fn into_records(self) -> Vec<TrackedObjectRecord> {
        self.aircraft
            .into_iter()
            .map(SourceAircraft::into_record)
            .collect()
    }
}

/// The upstream record layouts seen from receivers over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSchema {
    /// Original dump1090: a single `altitude`, integer `track`, `speed`.
    Legacy,
    /// dump1090-fa: `alt_baro` / `alt_geom`, float `track`, `gs`, `tas`, ...
    FlightAware,
}

/// Altitude as reported upstream: feet, or a label such as `"ground"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AltitudeValue {
    Feet(i64),
    Fractional(f64),
    Label(String),
}

impl AltitudeValue {
    pub fn feet(&self) -> i64 {
        match self {
            AltitudeValue::Feet(ft) => *ft,
            AltitudeValue::Fractional(ft) => ft.round() as i64,
            AltitudeValue::Label(_) => 0,
        }
    }
}

/// A single aircraft entry in either upstream layout.
///
/// Fields that take part in change detection or keying are named; everything
/// else lands in `telemetry` untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceAircraft {
    pub flight: Option<String>,
    pub hex: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt_baro: Option<AltitudeValue>,
    pub alt_geom: Option<AltitudeValue>,
    pub altitude: Option<AltitudeValue>,
    pub track: Option<f64>,
    pub seen: Option<f64>,
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub telemetry: Map<String, Value>,
}

impl SourceAircraft {
    pub fn schema(&self) -> SourceSchema {
        if self.altitude.is_some() && self.alt_baro.is_none() && self.alt_geom.is_none() {
            SourceSchema::Legacy
        } else {
            SourceSchema::FlightAware
        }
    }

    /// Map either layout onto the internal record.
    ///
    /// A legacy `altitude` is barometric; `"ground"` becomes 0 ft.
    pub fn into_record(self) -> TrackedObjectRecord {
        let feet = |value: Option<AltitudeValue>| value.map_or(0, |v| v.feet());
        let altitude = match self.schema() {
            SourceSchema::Legacy => Altitude {
                barometric: feet(self.altitude),
                geometric: 0,
            },
            SourceSchema::FlightAware => Altitude {
                barometric: feet(self.alt_baro),
                geometric: feet(self.alt_geom),
            },
        };

        TrackedObjectRecord {
            identity: self.flight.unwrap_or_default(),
            hex: self.hex,
            position: Position {
                lat: self.lat.unwrap_or(0.0),
                lon: self.lon.unwrap_or(0.0),
            },
            altitude,
            track: self.track.unwrap_or(0.0),
            seen: self.seen.unwrap_or(0.0),
            timestamp: self.timestamp,
            station: String::new(),
            kind: String::new(),
            telemetry: self.telemetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    const FLIGHTAWARE: &str = r#"{
        "now": 1700000000.5,
        "messages": 123456,
        "aircraft": [
            {"hex":"a1b2c3","flight":"UAL123  ","alt_baro":36000,"alt_geom":36525,"gs":451.2,
             "track":271.3,"lat":37.61,"lon":-122.38,"squawk":"1200","rssi":-18.2,"seen":0.4,
             "messages":812,"type":"adsb_icao"},
            {"hex":"c0ffee","flight":"N12345","alt_baro":"ground","lat":37.62,"lon":-122.37,"seen":3.1},
            {"hex":"abcdef","rssi":-30.1,"seen":12.0}
        ]
    }"#;

    const LEGACY: &str = r#"{
        "now": 1500000000.0,
        "messages": 99,
        "aircraft": [
            {"hex":"4ca1d3","flight":"EIN7V","lat":53.4,"lon":-6.2,"altitude":12000,"track":90,
             "speed":300,"vert_rate":-64,"rssi":-25.0,"seen":1.0}
        ]
    }"#;

    #[test]
    fn decodes_flightaware_snapshot() {
        let snapshot = Snapshot::from_slice(FLIGHTAWARE.as_bytes()).unwrap();
        assert_eq!(snapshot.messages, 123456);
        assert_eq!(snapshot.aircraft.len(), 3);
        assert_eq!(snapshot.aircraft[0].schema(), SourceSchema::FlightAware);
        let ground = snapshot.aircraft[1].alt_baro.as_ref().unwrap();
        assert_eq!(ground, &AltitudeValue::Label("ground".to_string()));
        assert_eq!(ground.feet(), 0);

        let records = snapshot.into_records();
        let ual = &records[0];
        assert_eq!(ual.identity, "UAL123  ");
        assert_eq!(ual.altitude.barometric, 36000);
        assert_eq!(ual.altitude.geometric, 36525);
        assert_eq!(ual.track, 271.3);
        assert_eq!(ual.telemetry.get("squawk"), Some(&json!("1200")));
        assert_eq!(ual.telemetry.get("gs"), Some(&json!(451.2)));
        assert!(ual.telemetry.get("lat").is_none());

        assert_eq!(records[1].altitude.barometric, 0);
        assert!(!records[2].is_admissible());
    }

    #[test]
    fn decodes_legacy_snapshot() {
        let snapshot = Snapshot::from_slice(LEGACY.as_bytes()).unwrap();
        assert_eq!(snapshot.aircraft[0].schema(), SourceSchema::Legacy);

        let record = snapshot.into_records().remove(0);
        assert_eq!(record.altitude.barometric, 12000);
        assert_eq!(record.altitude.geometric, 0);
        assert_eq!(record.track, 90.0);
        assert_eq!(record.telemetry.get("speed"), Some(&json!(300)));
    }

    #[test]
    fn sightings_cover_inadmissible_records() {
        let snapshot = Snapshot::from_slice(FLIGHTAWARE.as_bytes()).unwrap();
        let sightings = snapshot.sightings();
        assert_eq!(sightings.len(), 2);
        assert!(sightings.contains("UAL123"));
        assert_eq!(
            sightings.reported_age("N12345"),
            Some(Duration::from_secs_f64(3.1))
        );
    }

    #[test]
    fn captured_at_uses_now() {
        let snapshot = Snapshot::from_slice(FLIGHTAWARE.as_bytes()).unwrap();
        let at = snapshot.captured_at().unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert_eq!(Snapshot::default().captured_at(), None);
    }

    #[test]
    fn rejects_malformed_body() {
        assert!(Snapshot::from_slice(b"{\"aircraft\": [").is_err());
        assert!(Snapshot::from_slice(b"{\"aircraft\": 7}").is_err());
    }
}
