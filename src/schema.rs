//! Hotel-quote extraction schema types.
//!
//! The model's output is untrusted, so every field is read leniently: a value
//! with the wrong shape becomes `None` (or the type's default) instead of
//! failing the whole document. The canonical JSON artifact is persisted from
//! the raw parsed value, never re-serialized from these types.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Placeholder the model uses for missing text fields.
pub const NOT_SPECIFIED: &str = "Not Specified";

/// Prefix marking a total that cannot be reduced to one number.
pub const VARIABLE_PREFIX: &str = "variable:";

/// Root of the extracted quote.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedQuote {
    #[serde(default, deserialize_with = "lenient_text")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_quote: Option<TotalValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub accommodation_quote_total: Option<TotalValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub meeting_quote_total: Option<TotalValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub accommodation_pax: Option<u32>,
    /// Candidate full-quote scenarios; the first is the most probable.
    #[serde(default, deserialize_with = "lenient_vec")]
    pub total_quote_options: Vec<QuoteOption>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub accommodation_options: Vec<AccommodationOption>,
    #[allow(dead_code)]
    #[serde(default, deserialize_with = "lenient_vec")]
    pub meeting_options: Vec<MeetingOption>,
    #[allow(dead_code)]
    #[serde(default, deserialize_with = "lenient_vec")]
    pub food_beverage_options: Vec<FoodBeverageOption>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub general_notes: Vec<String>,
}

impl ExtractedQuote {
    /// Read the typed view of a parsed payload.
    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(quote) => quote,
            Err(e) => {
                debug!("Payload is not a quote object: {}", e);
                Self::default()
            }
        }
    }

    /// The primary option, if the model produced any.
    pub fn primary_option(&self) -> Option<&QuoteOption> {
        self.total_quote_options.first()
    }
}

/// One full-quote scenario.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteOption {
    #[serde(default, deserialize_with = "lenient")]
    pub total_quote: Option<TotalValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub features: Option<Features>,
}

/// Feature summaries of a quote option, one per category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Features {
    #[serde(default, deserialize_with = "feature")]
    pub accommodation: FeatureValue,
    #[serde(default, deserialize_with = "feature")]
    pub meeting: FeatureValue,
    #[serde(default, deserialize_with = "feature")]
    pub food_beverage: FeatureValue,
    #[serde(default, deserialize_with = "feature")]
    pub extras: FeatureValue,
}

impl Features {
    /// Categories in display order, with their section labels.
    pub fn categories(&self) -> [(&'static str, &FeatureValue); 4] {
        [
            ("Accommodation", &self.accommodation),
            ("Meeting", &self.meeting),
            ("Food & Beverage", &self.food_beverage),
            ("Extras", &self.extras),
        ]
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccommodationOption {
    #[serde(default, deserialize_with = "lenient_text")]
    pub room_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub price_per_night: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub guest_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub requested_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub vat_percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub vat_included: Option<bool>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub price_includes: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingOption {
    #[serde(default, deserialize_with = "lenient_text")]
    pub venue_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub purpose: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub price_per_person: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub flat_fee: Option<f64>,
    /// Rental period in hours.
    #[serde(default, deserialize_with = "lenient")]
    pub rental_period: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub pax: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub vat_percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub vat_included: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub service_charge_percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub price_includes: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FoodBeverageOption {
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub price_per_person: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub vat_percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub vat_included: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub service_charge_percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub includes: Option<String>,
}

/// A total that is either a number or a `"variable: <reason>"` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TotalValue {
    Amount(serde_json::Number),
    Text(String),
}

impl TotalValue {
    /// True for the values the source treats as "not given": zero and the empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            TotalValue::Amount(n) => n.as_f64() == Some(0.0),
            TotalValue::Text(s) => s.trim().is_empty(),
        }
    }

    /// The explanation carried by a variability marker.
    pub fn variability_reason(&self) -> Option<&str> {
        match self {
            TotalValue::Text(s) => s
                .trim_start()
                .strip_prefix(VARIABLE_PREFIX)
                .map(str::trim),
            TotalValue::Amount(_) => None,
        }
    }

    /// Stringified form used in the denormalized record and the summary.
    pub fn to_display_string(&self) -> String {
        match self {
            TotalValue::Amount(n) => n.to_string(),
            TotalValue::Text(s) => s.clone(),
        }
    }
}

/// A feature category value: one string, a list of strings, or nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FeatureValue {
    Scalar(String),
    Sequence(Vec<String>),
    #[default]
    Absent,
}

impl FeatureValue {
    /// Read a feature from raw JSON. Non-string list items are rendered as text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FeatureValue::Absent,
            Value::String(s) => FeatureValue::Scalar(s.clone()),
            Value::Array(items) => FeatureValue::Sequence(
                items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(json_to_text)
                    .collect(),
            ),
            other => FeatureValue::Scalar(json_to_text(other)),
        }
    }

    /// True when there is nothing to display or store.
    pub fn is_empty(&self) -> bool {
        match self {
            FeatureValue::Scalar(s) => s.is_empty(),
            FeatureValue::Sequence(items) => items.is_empty(),
            FeatureValue::Absent => true,
        }
    }

    /// Items in order; a scalar is a single item.
    pub fn items(&self) -> Vec<&str> {
        match self {
            FeatureValue::Scalar(s) if !s.is_empty() => vec![s.as_str()],
            FeatureValue::Sequence(items) => items.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

fn json_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Lenient deserializers
// ============================================================================

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Text field; blank strings count as missing.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Sequence field; items that don't fit become defaults so indices are kept.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item).unwrap_or_else(|e| {
                    debug!("Replacing malformed list item with default: {}", e);
                    T::default()
                })
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn feature<'de, D>(deserializer: D) -> Result<FeatureValue, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(FeatureValue::from_json(&value))
}
