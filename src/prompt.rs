//! System prompt for hotel-quote extraction.
//!
//! The delimiter tags are shared with the output parser; changing one side
//! without the other silently turns every response into an empty extraction.

use crate::schema::{NOT_SPECIFIED, VARIABLE_PREFIX};

/// Opening tag of the final JSON payload.
pub const JSON_OPEN_TAG: &str = "<JSON>";
/// Closing tag of the final JSON payload.
pub const JSON_CLOSE_TAG: &str = "</JSON>";
/// Tag name wrapping the model's reasoning.
pub const REASONING_TAG: &str = "extraction_process";

const ROLE: &str = "You are an AI assistant specialized in extracting structured information from hotel quote PDFs. Analyze the PDF provided in the user message and extract the offered services, pricing options and conditions.";

const CORE_GOAL: &str = r#"**Core Goal:** Extract the components and options offered. **Do NOT calculate a single overall total, meeting total or accommodation total** unless the document presents exactly one unambiguous scenario with every element totaled. Focus instead on the unit prices, quantities, inclusions and applicable taxes/fees of each distinct option in the quote."#;

const SCHEMA: &str = r#"{
  "currency": "EUR",
  "start_date": "YYYY-MM-DD",
  "end_date": "YYYY-MM-DD",
  "total_quote": "number",
  "accommodation_quote_total": "number",
  "meeting_quote_total": "number",
  "accommodation_pax": 90,
  "total_quote_options": [
    {
      "total_quote": 0,
      "features": {
        "accommodation": ["30 Superior double rooms for 3 nights", "30 Deluxe single rooms for 3 nights"],
        "meeting": ["Full-day meeting package for 90 people for 3 days", "One breakout room for 2 days"],
        "food_beverage": ["One Gala Dinner for 90 people"],
        "extras": []
      }
    }
  ],
  "accommodation_options": [
    {
      "room_name": "Superior",
      "price_per_night": 0,
      "guest_count": 2,
      "requested_count": 30,
      "vat_percentage": 20,
      "vat_included": false,
      "price_includes": "open buffet breakfast, 10% VAT, 2% accommodation tax"
    }
  ],
  "meeting_options": [
    {
      "venue_name": "Meeting Room 4",
      "purpose": "Main Meeting",
      "price_per_person": 85.00,
      "flat_fee": null,
      "rental_period": 24,
      "start_date": "2024-10-08",
      "end_date": "2024-10-10",
      "pax": 90,
      "vat_percentage": 20,
      "vat_included": false,
      "service_charge_percentage": null,
      "price_includes": "Hall usage (09:00-18:00), 2x coffee breaks, buffet lunch, Internet"
    }
  ],
  "food_beverage_options": [
    {
      "type": "Gala Dinner",
      "price_per_person": 75.00,
      "vat_percentage": 20,
      "vat_included": false,
      "service_charge_percentage": 10,
      "includes": "Welcome cocktail, 4 course set menu dinner"
    }
  ],
  "general_notes": [
    "Room prices are net and exclusive of commission.",
    "Any change in tax rates shall be automatically reflected.",
    "No booking has been made yet; final confirmation required."
  ]
}"#;

/// Build the system instruction sent with every document.
pub fn build_system_prompt() -> String {
    let reasoning_open = format!("<{}>", REASONING_TAG);
    let reasoning_close = format!("</{}>", REASONING_TAG);

    format!(
        r#"{role}

You MUST output the extracted information as a single, valid JSON object within {open}{close} tags. Do not include explanatory text before or after the JSON tags unless it is inside the {r_open} tags requested below.

{core}

Instructions:
1. Analyze: Read the entire document carefully.
2. Extract components: Identify accommodation, meetings, food & beverage, currency and general terms.
3. Handle options: Use arrays to represent multiple options (room types, meeting packages, F&B choices).
4. Pricing details: For each priced item state the price, the unit (per night, per person), the currency as an ISO code (EUR, USD, GBP) and any VAT, accommodation tax or service charge mentioned for that item.
5. Missing information: If a detail is not found in the document, use only "{ns}" as the placeholder.
6. Total quotes: If a single value cannot be assigned to total_quote, accommodation_quote_total or meeting_quote_total because of alternative options, never invent one. Replace the field with "{var} " followed by a short explanation. Then describe each combination of options in total_quote_options, with the most likely combination first.
7. General notes: Collect important terms, conditions, disclaimers and notes into the general_notes array.

Before the final JSON, explain your reasoning inside {r_open}{r_close} tags. Describe how you identified the options and assigned prices and taxes, especially where the document is ambiguous.

Adhere strictly to the following JSON structure:

{schema}

Rules for filling in the JSON:

1. total_quote, accommodation_quote_total and meeting_quote_total:
   - A single unambiguous number is given as that number.
   - A value that varies between options is given as "{var} " plus a brief explanation.

2. features in total_quote_options:
   - Use arrays for every category (accommodation, meeting, food_beverage, extras).
   - A category without entries is an empty array [].
   - Each entry is a specific summary of the feature.

3. Fields the document does not specify:
   - Text fields use "{ns}".
   - Numeric fields use null.
   - Array fields use [].

4. Numbers are written without quotes.

5. Booleans are written without quotes.

6. The guests accommodated in the first total_quote_options entry must add up to accommodation_pax. For example, with accommodation_pax = 90, 30 single rooms and 30 double rooms are acceptable.

Remember to wrap the final extraction in {open}{close} tags and the reasoning in {r_open}{r_close} tags."#,
        role = ROLE,
        core = CORE_GOAL,
        schema = SCHEMA,
        open = JSON_OPEN_TAG,
        close = JSON_CLOSE_TAG,
        r_open = reasoning_open,
        r_close = reasoning_close,
        ns = NOT_SPECIFIED,
        var = VARIABLE_PREFIX,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_both_regions() {
        let prompt = build_system_prompt();
        assert!(prompt.contains("<JSON></JSON>"));
        assert!(prompt.contains("<extraction_process></extraction_process>"));
    }

    #[test]
    fn test_prompt_carries_placeholder_rules() {
        let prompt = build_system_prompt();
        assert!(prompt.contains(r#""Not Specified""#));
        assert!(prompt.contains(r#""variable: ""#));
        assert!(prompt.contains("Numeric fields use null"));
        assert!(prompt.contains("Array fields use []"));
    }

    #[test]
    fn test_schema_example_is_valid_json() {
        let parsed: serde_json::Value = serde_json::from_str(SCHEMA).unwrap();
        assert!(parsed["total_quote_options"].is_array());
        assert!(parsed["general_notes"].is_array());
    }

    #[test]
    fn test_prompt_is_stable() {
        assert_eq!(build_system_prompt(), build_system_prompt());
    }
}
