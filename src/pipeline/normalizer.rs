use serde_json::Value;

/// One alert as delivered by a feed, before any interpretation.
pub type RawAlert = Value;

/// Shape a feed body was recognized as.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    Array(Vec<RawAlert>),
    Warnings(Vec<RawAlert>),
    Results(Vec<RawAlert>),
    Features(Vec<RawAlert>),
    Unknown,
}

impl DecodedBody {
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedBody::Array(_) => "array",
            DecodedBody::Warnings(_) => "warnings",
            DecodedBody::Results(_) => "results",
            DecodedBody::Features(_) => "features",
            DecodedBody::Unknown => "unknown",
        }
    }

    pub fn into_records(self) -> Vec<RawAlert> {
        match self {
            DecodedBody::Array(items)
            | DecodedBody::Warnings(items)
            | DecodedBody::Results(items) => items,
            DecodedBody::Features(features) => features.into_iter().map(feature_record).collect(),
            DecodedBody::Unknown => Vec::new(),
        }
    }
}

/// Classifies a parsed body; first matching shape wins.
pub fn decode_body(body: Value) -> DecodedBody {
    match body {
        Value::Array(items) => DecodedBody::Array(items),
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = take_array(&mut map, "warnings") {
                return DecodedBody::Warnings(items);
            }
            if let Some(Value::Array(items)) = take_array(&mut map, "results") {
                return DecodedBody::Results(items);
            }
            if let Some(Value::Array(items)) = take_array(&mut map, "features") {
                return DecodedBody::Features(items);
            }
            DecodedBody::Unknown
        }
        _ => DecodedBody::Unknown,
    }
}

pub fn normalize_body(body: Value) -> Vec<RawAlert> {
    decode_body(body).into_records()
}

fn take_array(map: &mut serde_json::Map<String, Value>, key: &str) -> Option<Value> {
    if map.get(key).map(Value::is_array).unwrap_or(false) {
        map.remove(key)
    } else {
        None
    }
}

fn feature_record(feature: Value) -> RawAlert {
    match feature {
        Value::Object(mut map) => match map.remove("properties") {
            Some(props) if !props.is_null() => props,
            Some(_) | None => Value::Object(map),
        },
        other => other,
    }
}
