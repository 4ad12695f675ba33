//! Core value model for the OTB replicator: source-row scalars, encoded-cell
//! parsing, and normalized heatmap records. No I/O lives here.

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

pub const CRATE_NAME: &str = "otb-core";

/// A single cell value as produced by the source store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Null => None,
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().map(|v| v as i64)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Scalar::Null => JsonValue::Null,
            Scalar::Number(n) => JsonNumber::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Scalar::Text(s) => JsonValue::String(s.clone()),
        }
    }
}

/// One wide result row from the source store.
///
/// Column names are normalized to lowercase exactly once at construction, so
/// every lookup is case-insensitive regardless of how the source spells its
/// identifiers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceRow {
    columns: Vec<(String, Scalar)>,
}

impl SourceRow {
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Scalar)>,
        K: Into<String>,
    {
        Self {
            columns: pairs
                .into_iter()
                .map(|(k, v)| (k.into().to_ascii_lowercase(), v))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        let wanted = name.to_ascii_lowercase();
        self.columns
            .iter()
            .find(|(k, _)| *k == wanted)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Numeric coercion with the zero fallback the downstream tables expect.
    pub fn f64_or_zero(&self, name: &str) -> f64 {
        self.get(name).and_then(Scalar::as_f64).unwrap_or(0.0)
    }

    pub fn i64_or_zero(&self, name: &str) -> i64 {
        self.get(name).and_then(Scalar::as_i64).unwrap_or(0)
    }

    pub fn text_or_empty(&self, name: &str) -> String {
        match self.get(name) {
            Some(Scalar::Text(s)) => s.clone(),
            Some(Scalar::Number(n)) if n.fract() == 0.0 => format!("{}", *n as i64),
            Some(Scalar::Number(n)) => format!("{n}"),
            _ => String::new(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map = JsonMap::with_capacity(self.columns.len());
        for (name, value) in &self.columns {
            map.insert(name.clone(), value.to_json());
        }
        JsonValue::Object(map)
    }
}

/// Decoded form of a `"<count> / <rate>"` composite cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurePair {
    pub count: f64,
    pub rate: f64,
}

/// Decode a composite measure cell.
///
/// The source packs two numbers per pivoted column as `"12 / 34.50"` with
/// optional thousands separators. Anything that is not a string with two
/// parseable numeric halves decodes to `None`; a malformed cell means "no
/// data", never an error.
pub fn parse_measure_cell(value: &Scalar) -> Option<MeasurePair> {
    let text = value.as_text()?;
    let mut parts = text.trim().splitn(2, '/');
    let count = parse_grouped_number(parts.next()?)?;
    let rate = parse_grouped_number(parts.next()?)?;
    Some(MeasurePair { count, rate })
}

fn parse_grouped_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Long-format record emitted by the pivot reshaper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapRecord {
    pub month_key: String,
    pub market: String,
    pub room_type: String,
    pub rn: f64,
    pub price: f64,
}
