//! Tabular summary of the primary quote option.
//!
//! Serialization quotes every cell and doubles embedded quotes, so the output
//! is always re-readable by a standard CSV reader.

use std::io;

use crate::normalize::stringify_total;
use crate::schema::{ExtractedQuote, NOT_SPECIFIED};

pub const TITLE: &str = "Event Quote Summary";
pub const NO_OPTIONS_MESSAGE: &str = "No quote options available";

/// Ordered rows of cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryTable {
    rows: Vec<Vec<String>>,
}

impl SummaryTable {
    #[cfg(test)]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    fn push<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    fn spacer(&mut self) {
        self.push([""]);
    }

    /// Render as CSV: every cell quoted, rows joined by `\n`, no trailing newline.
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        for row in &self.rows {
            writer.write_record(row)?;
        }

        let mut bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
        }
        String::from_utf8(bytes)
            .map_err(|e| csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Read a table back from its CSV form.
    #[cfg(test)]
    pub fn from_csv(text: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self { rows })
    }
}

/// Build the summary table from the primary option.
pub fn build_summary(quote: &ExtractedQuote) -> SummaryTable {
    let mut table = SummaryTable::default();

    let Some(option) = quote.primary_option() else {
        table.push([NO_OPTIONS_MESSAGE]);
        return table;
    };

    let or_not_specified =
        |v: Option<&String>| v.cloned().unwrap_or_else(|| NOT_SPECIFIED.to_string());

    table.push([TITLE]);
    table.push(["Currency".to_string(), or_not_specified(quote.currency.as_ref())]);
    table.push(["Start Date".to_string(), or_not_specified(quote.start_date.as_ref())]);
    table.push(["End Date".to_string(), or_not_specified(quote.end_date.as_ref())]);
    table.push([
        "Total Quote".to_string(),
        stringify_total(option.total_quote.as_ref()).unwrap_or_else(|| NOT_SPECIFIED.to_string()),
    ]);
    table.spacer();

    if let Some(features) = &option.features {
        table.push(["Quote Features"]);

        for (label, value) in features.categories() {
            if value.is_empty() {
                continue;
            }
            table.push([label]);
            for item in value.items() {
                table.push(["", item]);
            }
            table.spacer();
        }
    }

    if !quote.general_notes.is_empty() {
        table.push(["General Notes"]);
        for note in &quote.general_notes {
            table.push(["", note.as_str()]);
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_no_options_is_single_row() {
        let quote = ExtractedQuote::from_value(&json!({"currency": "EUR"}));
        let table = build_summary(&quote);
        assert_eq!(table.rows(), &[row(&[NO_OPTIONS_MESSAGE])]);
    }

    #[test]
    fn test_row_order() {
        let quote = ExtractedQuote::from_value(&json!({
            "currency": "EUR",
            "end_date": "2025-03-03",
            "total_quote_options": [{
                "total_quote": "variable: two meeting packages",
                "features": {
                    "accommodation": ["Room A", "Room B"],
                    "meeting": [],
                    "food_beverage": "Gala dinner"
                }
            }],
            "general_notes": ["Prices exclude VAT."]
        }));

        let expected = vec![
            row(&["Event Quote Summary"]),
            row(&["Currency", "EUR"]),
            row(&["Start Date", "Not Specified"]),
            row(&["End Date", "2025-03-03"]),
            row(&["Total Quote", "variable: two meeting packages"]),
            row(&[""]),
            row(&["Quote Features"]),
            row(&["Accommodation"]),
            row(&["", "Room A"]),
            row(&["", "Room B"]),
            row(&[""]),
            row(&["Food & Beverage"]),
            row(&["", "Gala dinner"]),
            row(&[""]),
            row(&["General Notes"]),
            row(&["", "Prices exclude VAT."]),
        ];
        assert_eq!(build_summary(&quote).rows(), expected.as_slice());
    }

    #[test]
    fn test_no_features_object_skips_section() {
        let quote = ExtractedQuote::from_value(&json!({
            "total_quote_options": [{"total_quote": 0}]
        }));
        let table = build_summary(&quote);
        assert_eq!(table.rows().len(), 6);
        assert_eq!(table.rows()[4], row(&["Total Quote", "Not Specified"]));
    }

    #[test]
    fn test_escaping() {
        let quote = ExtractedQuote::from_value(&json!({
            "total_quote_options": [{"features": {"extras": ["Room \"Bosphorus\", sea view"]}}]
        }));
        let csv = build_summary(&quote).to_csv().unwrap();
        assert!(csv.starts_with("\"Event Quote Summary\"\n\"Currency\",\"Not Specified\""));
        assert!(csv.contains("\"\",\"Room \"\"Bosphorus\"\", sea view\""));
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn test_csv_round_trip() {
        let quote = ExtractedQuote::from_value(&json!({
            "currency": "TRY",
            "start_date": "2024-10-08",
            "total_quote_options": [{
                "total_quote": 12500.75,
                "features": {
                    "accommodation": ["30 \"Superior\" rooms, 3 nights", "Line\nbreak"],
                    "meeting": "Hall, 09:00-18:00",
                    "extras": ["", "\"quoted\""]
                }
            }],
            "general_notes": ["%20 VAT, %10 service", "Parking: TL 350"]
        }));
        let table = build_summary(&quote);
        let reparsed = SummaryTable::from_csv(&table.to_csv().unwrap()).unwrap();
        assert_eq!(reparsed, table);
    }
}
