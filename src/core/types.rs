use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// CAP severity as published by the warning feeds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    #[default]
    Minor,
    Moderate,
    Severe,
    Extreme,
}

impl Severity {
    /// Ordinal used for ranking; higher is more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Minor => 1,
            Severity::Moderate => 2,
            Severity::Severe => 3,
            Severity::Extreme => 4,
        }
    }

    /// Case-insensitive parse; anything unrecognized is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "minor" => Some(Severity::Minor),
            "moderate" => Some(Severity::Moderate),
            "severe" => Some(Severity::Severe),
            "extreme" => Some(Severity::Extreme),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "Minor",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
            Severity::Extreme => "Extreme",
        }
    }

    pub const ALL: [Severity; 4] = [
        Severity::Extreme,
        Severity::Severe,
        Severity::Moderate,
        Severity::Minor,
    ];
}

/// CAP `msgType`. Unrecognized values keep their raw text for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageType {
    Alert,
    Update,
    Cancel,
    Test,
    Unknown(String),
}

impl MessageType {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "Alert" => MessageType::Alert,
            "Update" => MessageType::Update,
            "Cancel" => MessageType::Cancel,
            "Test" => MessageType::Test,
            other => MessageType::Unknown(other.to_string()),
        }
    }
}

/// Send time of an alert as far as the feed let us know it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SentTime {
    At(DateTime<Utc>),
    Missing,
    Invalid(String),
}

impl SentTime {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None => SentTime::Missing,
            Some(raw) => match parse_timestamp(raw.trim()) {
                Some(dt) => SentTime::At(dt),
                None => SentTime::Invalid(raw.to_string()),
            },
        }
    }

    /// Seconds since the epoch; unknown times count as zero.
    pub fn sort_key(&self) -> i64 {
        match self {
            SentTime::At(dt) => dt.timestamp(),
            SentTime::Missing | SentTime::Invalid(_) => 0,
        }
    }
}

const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Accepts RFC 3339 and RFC 2822, offset-less date-times (read as local
/// time), bare dates (midnight UTC) and epoch milliseconds.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().ok().and_then(DateTime::<Utc>::from_timestamp_millis);
    }
    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Parses `"lat,lon"`, rejecting out-of-range values.
    pub fn parse(value: &str) -> Option<Self> {
        let (lat, lon) = value.split_once(',')?;
        let lat: f64 = lat.trim().parse().ok()?;
        let lon: f64 = lon.trim().parse().ok()?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Self { lat, lon })
    }
}

/// Axis-aligned bounding box of the visible map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl Bounds {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lon >= self.south_west.lon
            && point.lon <= self.north_east.lon
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub center: GeoPoint,
    pub bounds: Option<Bounds>,
}

/// Canonical alert record the pipeline ranks and renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedAlert {
    pub id: String,
    pub sent: SentTime,
    pub message_type: MessageType,
    pub severity: Severity,
    pub headline: String,
    pub description: String,
    pub area_description: String,
    pub event_label: Option<String>,
    pub location: Option<GeoPoint>,
    pub distance_km: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parse_is_case_insensitive() {
        assert_eq!(Severity::parse("EXTREME"), Some(Severity::Extreme));
        assert_eq!(Severity::parse(" severe "), Some(Severity::Severe));
        assert_eq!(Severity::parse("Unknown"), None);
    }

    #[test]
    fn sent_time_classifies_inputs() {
        assert!(matches!(
            SentTime::parse(Some("2024-05-01T10:00:00+02:00")),
            SentTime::At(_)
        ));
        assert_eq!(SentTime::parse(None), SentTime::Missing);
        assert_eq!(
            SentTime::parse(Some("gestern")).sort_key(),
            0,
            "invalid timestamps sort as epoch zero"
        );
    }

    #[test]
    fn sent_time_accepts_lenient_forms() {
        let local = SentTime::parse(Some("2024-05-01T10:00:00"));
        let expected = Local
            .with_ymd_and_hms(2024, 5, 1, 10, 0, 0)
            .earliest()
            .unwrap()
            .timestamp();
        assert_eq!(local.sort_key(), expected);
        assert_eq!(SentTime::parse(Some("2024-05-01 10:00:00")).sort_key(), expected);

        assert_eq!(SentTime::parse(Some("2024-05-01")).sort_key(), 1_714_521_600);
        assert_eq!(
            SentTime::parse(Some("1714557600000")).sort_key(),
            1_714_557_600
        );
        assert_eq!(
            SentTime::parse(Some("Wed, 01 May 2024 10:00:00 +0000")).sort_key(),
            1_714_557_600
        );
        assert!(matches!(
            SentTime::parse(Some("01.05.2024")),
            SentTime::Invalid(_)
        ));
    }

    #[test]
    fn geo_point_parse_rejects_garbage() {
        assert_eq!(GeoPoint::parse("50.0,8.0"), Some(GeoPoint::new(50.0, 8.0)));
        assert_eq!(GeoPoint::parse(" 49.99 , 8.27 "), Some(GeoPoint::new(49.99, 8.27)));
        assert_eq!(GeoPoint::parse("95.0,8.0"), None);
        assert_eq!(GeoPoint::parse("mainz"), None);
    }
}
