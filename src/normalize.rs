//! Normalization of a parsed payload into the canonical document and its
//! flattened database projection.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::schema::{ExtractedQuote, FeatureValue, QuoteOption, TotalValue};

/// Separator between flattened feature items.
pub const FEATURE_SEPARATOR: &str = ", ";

/// A successfully parsed extraction.
///
/// `raw` is the canonical JSON exactly as the model produced it; `quote` is
/// the typed view every consumer reads from.
#[derive(Debug, Clone)]
pub struct QuoteDocument {
    pub raw: Value,
    pub quote: ExtractedQuote,
    pub diagnostics: Vec<String>,
}

impl QuoteDocument {
    pub fn primary_option(&self) -> Option<&QuoteOption> {
        self.quote.primary_option()
    }

    /// Canonical artifact bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.raw)
    }
}

/// Build the typed view and record soft-invariant diagnostics.
pub fn normalize(raw: Value) -> QuoteDocument {
    let quote = ExtractedQuote::from_value(&raw);
    let mut diagnostics = Vec::new();

    if quote.total_quote_options.is_empty() {
        diagnostics.push("no total_quote_options; summary and event record skipped".to_string());
    }

    for (field, total) in [
        ("total_quote", &quote.total_quote),
        ("accommodation_quote_total", &quote.accommodation_quote_total),
        ("meeting_quote_total", &quote.meeting_quote_total),
    ] {
        match total {
            None => diagnostics.push(format!(
                "{} is neither a number nor a variability marker",
                field
            )),
            Some(t) => {
                if let Some(reason) = t.variability_reason() {
                    info!("{} is variable: {}", field, reason);
                }
            }
        }
    }

    if let Some(message) = pax_mismatch(&quote) {
        diagnostics.push(message);
    }

    for message in &diagnostics {
        warn!("Extraction diagnostic: {}", message);
    }

    QuoteDocument {
        raw,
        quote,
        diagnostics,
    }
}

/// Compare the declared headcount with what the room options add up to.
fn pax_mismatch(quote: &ExtractedQuote) -> Option<String> {
    let declared = quote.accommodation_pax?;
    let counted = quote
        .accommodation_options
        .iter()
        .filter_map(|o| u64::from(o.guest_count?).checked_mul(u64::from(o.requested_count?)))
        .fold(0u64, u64::saturating_add);

    if counted == 0 || counted == u64::from(declared) {
        return None;
    }
    Some(format!(
        "accommodation_pax is {} but room options accommodate {}",
        declared, counted
    ))
}

/// Flatten a feature for the denormalized record; empty values become `None`.
pub fn flatten_feature(value: &FeatureValue) -> Option<String> {
    match value {
        FeatureValue::Scalar(s) if !s.is_empty() => Some(s.clone()),
        FeatureValue::Sequence(items) if !items.is_empty() => Some(items.join(FEATURE_SEPARATOR)),
        _ => None,
    }
}

/// Feature as a list: a scalar becomes one item, absence no items.
pub fn feature_list(value: &FeatureValue) -> Vec<String> {
    value.items().into_iter().map(str::to_string).collect()
}

/// Stringify a total; zero and blank count as absent.
pub fn stringify_total(total: Option<&TotalValue>) -> Option<String> {
    total
        .filter(|t| !t.is_blank())
        .map(TotalValue::to_display_string)
}

/// Denormalized projection of a quote stored in the relational table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_name: String,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    pub currency: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub total_quote: Option<String>,
    pub accommodation: Option<String>,
    pub meeting: Option<String>,
    pub food_beverage: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub extras: Vec<String>,
    #[serde(rename = "json_url", default, deserialize_with = "null_as_default")]
    pub json_location: String,
}

/// Rows written by older clients may carry explicit nulls.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl EventRecord {
    /// Project the primary option; `None` when the quote has no options.
    pub fn project(
        document: &QuoteDocument,
        owner_id: &str,
        event_name: &str,
        json_location: &str,
    ) -> Option<Self> {
        let option = document.primary_option()?;
        let quote = &document.quote;
        let features = option.features.clone().unwrap_or_default();

        Some(Self {
            event_name: event_name.to_string(),
            owner_id: owner_id.to_string(),
            currency: quote.currency.clone(),
            start_date: quote.start_date.clone(),
            end_date: quote.end_date.clone(),
            total_quote: stringify_total(option.total_quote.as_ref()),
            accommodation: flatten_feature(&features.accommodation),
            meeting: flatten_feature(&features.meeting),
            food_beverage: flatten_feature(&features.food_beverage),
            extras: feature_list(&features.extras),
            json_location: json_location.to_string(),
        })
    }
}
