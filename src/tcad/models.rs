//! Wire models for the TCAD full-text search endpoint and the canonical
//! record shape the rest of the pipeline consumes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Response envelope from `POST /searchfulltext`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub total_property: TotalProperty,
    #[serde(default)]
    pub results: Vec<RawPropertyRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalProperty {
    pub property_count: i64,
}

/// One raw row as the upstream returns it. Numeric identifiers sometimes
/// arrive as JSON numbers and sometimes as strings; money fields arrive as
/// numbers, formatted strings, or null.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPropertyRow {
    #[serde(deserialize_with = "deserialize_scalar_string")]
    pub pid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub prop_type: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub street_primary: Option<String>,
    #[serde(default)]
    pub assessed_value: Value,
    #[serde(default)]
    pub appraised_value: Value,
    #[serde(rename = "geoID", default)]
    pub geo_id: Option<String>,
    #[serde(default)]
    pub legal_description: Option<String>,
}

/// Canonical scraped record, keyed on the upstream property id.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PropertyRecord {
    pub property_id: String,
    pub owner_name: String,
    pub prop_type: Option<String>,
    pub city: Option<String>,
    pub street_primary: Option<String>,
    pub assessed_value: Option<f64>,
    pub appraised_value: f64,
    pub geo_id: Option<String>,
    pub legal_description: Option<String>,
}

impl From<RawPropertyRow> for PropertyRecord {
    fn from(row: RawPropertyRow) -> Self {
        Self {
            property_id: row.pid,
            owner_name: row.display_name.unwrap_or_default(),
            prop_type: row.prop_type,
            city: row.city,
            street_primary: row.street_primary,
            assessed_value: parse_money(&row.assessed_value),
            appraised_value: parse_money(&row.appraised_value).unwrap_or(0.0).max(0.0),
            geo_id: row.geo_id,
            legal_description: row.legal_description,
        }
    }
}

/// Parse a money value from a JSON scalar.
///
/// Accepts raw numbers and formatted strings like `"$123,456.78"`. Returns
/// `None` for null, NaN, or unparseable input; callers decide whether that
/// coerces to 0 (appraised) or stays null (assessed).
pub fn parse_money(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

/// Detect a truncated response body: the upstream occasionally cuts the
/// connection mid-payload, leaving JSON whose last non-whitespace character
/// is not a closing brace or bracket.
pub fn is_truncated(body: &str) -> bool {
    match body.trim_end().chars().next_back() {
        Some('}') | Some(']') => false,
        _ => true,
    }
}

/// Accept a JSON number or string and produce a `String`.
fn deserialize_scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for pid, got {other}"
        ))),
    }
}
