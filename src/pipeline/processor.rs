use std::cmp::Ordering;

use serde_json::Value;

use crate::core::geo::haversine_km;
use crate::core::types::{GeoPoint, MessageType, NormalizedAlert, SentTime, Severity};
use crate::pipeline::normalizer::RawAlert;

pub const DEFAULT_HEADLINE: &str = "Warnung";
pub const DEFAULT_DESCRIPTION: &str = "Keine Details verfügbar";
pub const DEFAULT_AREA: &str = "Deutschland";
const COORD_TAG: &str = "EMMA_COORD";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessOptions {
    pub radius_km: f64,
    pub max_alerts: usize,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            radius_km: 100.0,
            max_alerts: 20,
        }
    }
}

/// Normalizes, filters by radius, ranks and truncates one cycle's records.
pub fn process_alerts(
    raw: &[RawAlert],
    center: Option<&GeoPoint>,
    opts: &ProcessOptions,
) -> Vec<NormalizedAlert> {
    let mut alerts: Vec<NormalizedAlert> = raw
        .iter()
        .map(|record| {
            let mut alert = normalize_record(record);
            if let (Some(center), Some(location)) = (center, alert.location.as_ref()) {
                alert.distance_km = Some(haversine_km(center, location));
            }
            alert
        })
        .filter(|alert| within_radius(alert, opts.radius_km))
        .collect();

    sort_alerts(&mut alerts);
    alerts.truncate(opts.max_alerts);
    alerts
}

/// Records without a distance always pass; the bound itself is inclusive.
pub fn within_radius(alert: &NormalizedAlert, radius_km: f64) -> bool {
    match alert.distance_km {
        Some(d) => d <= radius_km,
        None => true,
    }
}

/// Severity first, then nearest, then newest.
pub fn sort_alerts(alerts: &mut [NormalizedAlert]) {
    alerts.sort_by(compare_alerts);
}

pub fn compare_alerts(a: &NormalizedAlert, b: &NormalizedAlert) -> Ordering {
    b.severity
        .rank()
        .cmp(&a.severity.rank())
        .then_with(|| compare_distance(a.distance_km, b.distance_km))
        .then_with(|| b.sent.sort_key().cmp(&a.sent.sort_key()))
}

// Located alerts come before unlocated ones of the same severity. Comparing
// only when both sides are located is not transitive, so it cannot drive a sort.
fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Applies the per-field fallback chains to one raw record.
pub fn normalize_record(record: &RawAlert) -> NormalizedAlert {
    let info = first_object(record, "info").unwrap_or(record);
    let area = first_object(info, "area");

    let id = text(record, "id")
        .or_else(|| text(record, "identifier"))
        .unwrap_or_default();

    let severity = text(info, "severity")
        .or_else(|| text(record, "severity"))
        .and_then(|s| Severity::parse(&s))
        .unwrap_or_default();

    let message_type = text(record, "msgType")
        .or_else(|| text(info, "msgType"))
        .map(|s| MessageType::parse(&s))
        .unwrap_or(MessageType::Alert);

    let sent_raw = text(record, "sent").or_else(|| text(info, "sent"));
    let sent = SentTime::parse(sent_raw.as_deref());

    let headline = text(info, "headline")
        .or_else(|| text(record, "headline"))
        .or_else(|| text(info, "event"))
        .unwrap_or_else(|| DEFAULT_HEADLINE.to_string());

    let description = text(info, "description")
        .or_else(|| text(record, "description"))
        .or_else(|| text(info, "instruction"))
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

    let area_description = area
        .and_then(|a| text(a, "areaDesc"))
        .or_else(|| text(info, "areaDesc"))
        .or_else(|| text(record, "regionName"))
        .unwrap_or_else(|| DEFAULT_AREA.to_string());

    NormalizedAlert {
        id,
        sent,
        message_type,
        severity,
        headline,
        description,
        area_description,
        event_label: text(info, "event"),
        location: area.and_then(area_location),
        distance_km: None,
    }
}

fn first_object<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value.get(key)? {
        Value::Array(items) => items.first().filter(|v| v.is_object()),
        obj @ Value::Object(_) => Some(obj),
        _ => None,
    }
}

// Non-empty string, with numbers accepted as their text.
fn text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn area_location(area: &Value) -> Option<GeoPoint> {
    let geocodes: Vec<&Value> = match area.get("geocode")? {
        Value::Array(items) => items.iter().collect(),
        obj @ Value::Object(_) => vec![obj],
        _ => return None,
    };
    geocodes
        .into_iter()
        .filter(|g| g.get("valueName").and_then(Value::as_str) == Some(COORD_TAG))
        .find_map(|g| g.get("value").and_then(Value::as_str).and_then(GeoPoint::parse))
}
