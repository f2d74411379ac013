//! Validated extraction request.

use serde::Deserialize;

use crate::error::PipelineError;

/// Longest event name accepted as a storage path segment.
pub const MAX_EVENT_NAME_LEN: usize = 128;

const FORBIDDEN_CHARS: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Request body as received from the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionBody {
    #[serde(default, alias = "pdfUrl")]
    pub document_url: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
}

/// A request that passed validation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteExtractionRequest {
    document_url: String,
    event_name: String,
    owner_id: String,
}

impl QuoteExtractionRequest {
    pub fn new(
        document_url: Option<&str>,
        event_name: Option<&str>,
        owner_id: &str,
    ) -> Result<Self, PipelineError> {
        let document_url = document_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PipelineError::validation("documentUrl is required"))?;
        let event_name = event_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| PipelineError::validation("eventName is required"))?;

        let owner_id = owner_id.trim();
        if owner_id.is_empty() {
            return Err(PipelineError::validation("owner id is required"));
        }
        check_path_segment(owner_id, "owner id")?;

        let url = reqwest::Url::parse(document_url)
            .map_err(|e| {
                PipelineError::validation(format!("documentUrl is not a valid URL: {}", e))
            })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PipelineError::validation(
                "documentUrl must use http or https",
            ));
        }

        Ok(Self {
            document_url: url.to_string(),
            event_name: sanitize_event_name(event_name)?,
            owner_id: owner_id.to_string(),
        })
    }

    pub fn from_body(body: &ExtractionBody, owner_id: &str) -> Result<Self, PipelineError> {
        Self::new(
            body.document_url.as_deref(),
            body.event_name.as_deref(),
            owner_id,
        )
    }

    pub fn document_url(&self) -> &str {
        &self.document_url
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Validate an event name for use as one storage path segment.
pub fn sanitize_event_name(name: &str) -> Result<String, PipelineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PipelineError::validation("eventName is required"));
    }
    if name.chars().count() > MAX_EVENT_NAME_LEN {
        return Err(PipelineError::validation(format!(
            "eventName exceeds {} characters",
            MAX_EVENT_NAME_LEN
        )));
    }
    check_path_segment(name, "eventName")?;
    Ok(name.to_string())
}

fn check_path_segment(segment: &str, field: &str) -> Result<(), PipelineError> {
    if segment == "." || segment == ".." {
        return Err(PipelineError::validation(format!(
            "{} must not be a relative path",
            field
        )));
    }
    if let Some(c) = segment
        .chars()
        .find(|c| c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(PipelineError::validation(format!(
            "{} contains forbidden character {:?}",
            field, c
        )));
    }
    Ok(())
}
