// ── Metric normalization ──
//
// Maps one raw metric record from either feed onto a canonical attribute.
// The polling feed and the push feed spell some metrics and fields
// differently; both spellings share one table.

use serde::Serialize;
use serde_json::Value;
use strum::Display;

use crate::model::{AirQuality, AttributeValue};

/// Which feed produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Feed {
    Poll,
    Push,
}

/// Shape of the attribute a metric maps to.
#[derive(Clone, Copy)]
enum Kind {
    Battery,
    Temperature,
    Humidity,
    Water,
    Door,
    AirQuality,
    Voc,
    Pm25,
}

/// Resolve a metric name (either feed's spelling) to its kind and the
/// candidate field names of its value object.
fn lookup(metric: &str) -> Option<(Kind, &'static [&'static str])> {
    let entry: (Kind, &'static [&'static str]) = match metric {
        "battery" | "batteryPercentage" => (Kind::Battery, &["percentage", "batteryPercentage"]),
        "temperature" => (Kind::Temperature, &["celsius"]),
        "humidity" => (Kind::Humidity, &["relativePercentage", "humidity"]),
        "water" | "waterDetection" => (Kind::Water, &["present", "wet"]),
        "door" => (Kind::Door, &["open"]),
        "indoorAirQuality" | "iaqIndex" => (Kind::AirQuality, &["score", "iaqIndex"]),
        "tvoc" => (Kind::Voc, &["concentration"]),
        "pm25" => (Kind::Pm25, &["concentration"]),
        _ => return None,
    };
    Some(entry)
}

/// Whether `metric` is one the normalizer understands.
pub fn is_known_metric(metric: &str) -> bool {
    lookup(metric).is_some()
}

/// Normalize one metric value object.
///
/// `value` is the object holding the sub-fields, e.g. `{"celsius": 21.5}`.
/// Returns `None` for unknown metrics, non-object values, and objects
/// missing the expected field or carrying it with the wrong type.
pub fn normalize(metric: &str, value: &Value) -> Option<AttributeValue> {
    let (kind, fields) = lookup(metric)?;
    let object = value.as_object()?;
    let field = fields.iter().find_map(|name| object.get(*name))?;

    let attribute = match kind {
        Kind::Battery => AttributeValue::BatteryLevel(as_number(field)?),
        Kind::Temperature => AttributeValue::Temperature(as_number(field)?),
        Kind::Humidity => AttributeValue::Humidity(as_number(field)?),
        Kind::Water => AttributeValue::Flooded(field.as_bool()?),
        Kind::Door => AttributeValue::BinaryState(field.as_bool()?),
        Kind::AirQuality => AttributeValue::AirQuality(AirQuality::from_index(as_number(field)?)),
        Kind::Voc => AttributeValue::VocDensity(as_number(field)?),
        Kind::Pm25 => AttributeValue::Pm25Density(as_number(field)?),
    };
    Some(attribute)
}

/// Numbers may arrive as JSON numbers or as numeric strings.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}
