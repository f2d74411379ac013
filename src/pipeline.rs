//! Quote extraction pipeline.
//!
//! One request runs strictly in sequence: model call, payload parsing,
//! normalization, then persistence. Only validation and model-call failures
//! abort; every other problem yields an outcome with fewer artifacts.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::model::{fetch_document, DocumentSource, ExtractionModel, ModelError};
use crate::normalize::normalize;
use crate::parser::{parse_response, ParsedPayload};
use crate::persist::{PersistenceCoordinator, PersistenceReport};
use crate::prompt::build_system_prompt;
use crate::request::QuoteExtractionRequest;

/// How far an extraction got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Parsed with a primary option; all artifacts attempted
    Extracted,
    /// Parsed, but without quote options; only the JSON artifact attempted
    NoOptions,
    /// The model returned no text
    EmptyModelResponse,
    /// The delimited payload was missing or unparsable
    MalformedExtraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Result of a non-aborted extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutcome {
    pub status: ExtractionStatus,
    pub artifacts: PersistenceReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl ExtractionOutcome {
    fn degraded(status: ExtractionStatus, reason: &str, usage: Option<TokenUsage>) -> Self {
        Self {
            status,
            artifacts: PersistenceReport::nothing_written(reason),
            usage,
            diagnostics: vec![reason.to_string()],
        }
    }

    /// Human-readable summary for the caller.
    pub fn message(&self) -> String {
        match self.status {
            ExtractionStatus::Extracted if self.artifacts.failures() == 0 => {
                "Extraction successful".to_string()
            }
            ExtractionStatus::Extracted => format!(
                "Extraction completed; {} artifact(s) failed to save",
                self.artifacts.failures()
            ),
            ExtractionStatus::NoOptions if self.artifacts.json.is_written() => {
                "Extraction completed without quote options; only the JSON was saved".to_string()
            }
            ExtractionStatus::NoOptions => {
                "Extraction completed without quote options; the JSON failed to save".to_string()
            }
            ExtractionStatus::EmptyModelResponse => {
                "Extraction completed; the model returned no content".to_string()
            }
            ExtractionStatus::MalformedExtraction => {
                "Extraction completed; no structured data could be read".to_string()
            }
        }
    }
}

/// Extraction pipeline orchestrator.
pub struct QuotePipeline {
    model: Arc<dyn ExtractionModel>,
    persistence: PersistenceCoordinator,
    http: reqwest::Client,
    inline_documents: bool,
    system_prompt: String,
}

impl QuotePipeline {
    pub fn new(
        model: Arc<dyn ExtractionModel>,
        persistence: PersistenceCoordinator,
        http: reqwest::Client,
        inline_documents: bool,
    ) -> Self {
        Self {
            model,
            persistence,
            http,
            inline_documents,
            system_prompt: build_system_prompt(),
        }
    }

    /// Run one extraction.
    pub async fn run(
        &self,
        request: &QuoteExtractionRequest,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let span = info_span!(
            "extraction",
            request_id = %Uuid::new_v4(),
            owner = request.owner_id(),
            event = request.event_name(),
        );
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(
        &self,
        request: &QuoteExtractionRequest,
    ) -> Result<ExtractionOutcome, PipelineError> {
        info!(
            "Starting extraction with model provider {}",
            self.model.name()
        );

        let document = if self.inline_documents {
            fetch_document(&self.http, request.document_url())
                .await
                .map_err(PipelineError::ModelInvocation)?
        } else {
            DocumentSource::Url(request.document_url().to_string())
        };

        let response = match self.model.invoke(&self.system_prompt, &document).await {
            Ok(response) => response,
            Err(ModelError::EmptyResponse {
                input_tokens,
                output_tokens,
            }) => {
                warn!("No text content found in model response");
                return Ok(ExtractionOutcome::degraded(
                    ExtractionStatus::EmptyModelResponse,
                    "model returned no text content",
                    Some(TokenUsage {
                        input_tokens,
                        output_tokens,
                    }),
                ));
            }
            Err(e) => return Err(PipelineError::ModelInvocation(e)),
        };

        let usage = Some(TokenUsage {
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
        });
        debug!("Raw response length: {} chars", response.text.len());

        let raw = match parse_response(&response.text) {
            ParsedPayload::Extracted(raw) => raw,
            ParsedPayload::Empty(reason) => {
                warn!("Skipping artifact generation: {}", reason);
                return Ok(ExtractionOutcome::degraded(
                    ExtractionStatus::MalformedExtraction,
                    &reason.to_string(),
                    usage,
                ));
            }
        };

        let document = normalize(raw);
        let status = if document.primary_option().is_some() {
            ExtractionStatus::Extracted
        } else {
            ExtractionStatus::NoOptions
        };

        let artifacts = self
            .persistence
            .persist(request.owner_id(), request.event_name(), &document)
            .await;

        let written = [&artifacts.json, &artifacts.summary, &artifacts.record]
            .into_iter()
            .filter(|s| s.is_written())
            .count();
        info!(
            "Extraction finished: status={:?}, written={}, failed={}",
            status,
            written,
            artifacts.failures()
        );

        Ok(ExtractionOutcome {
            status,
            artifacts,
            usage,
            diagnostics: document.diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::RawModelResponse;
    use crate::persist::testing::{MemoryEventStore, MemoryObjectStore};
    use crate::persist::ArtifactStatus;
    use crate::storage::WriteMode;
    use crate::summary::SummaryTable;
    use serde_json::{json, Value};

    /// Model that replays one scripted result and records what it was sent.
    struct ScriptedModel {
        result: Mutex<Option<Result<RawModelResponse, ModelError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn text(text: &str) -> Self {
            Self::with(Ok(RawModelResponse {
                text: text.to_string(),
                input_tokens: 1200,
                output_tokens: 340,
            }))
        }

        fn with(result: Result<RawModelResponse, ModelError>) -> Self {
            Self {
                result: Mutex::new(Some(result)),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ExtractionModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn invoke(
            &self,
            _system: &str,
            document: &DocumentSource,
        ) -> Result<RawModelResponse, ModelError> {
            if let DocumentSource::Url(url) = document {
                self.calls.lock().unwrap().push(url.clone());
            }
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(ModelError::EmptyResponse {
                    input_tokens: 0,
                    output_tokens: 0,
                }))
        }
    }

    struct Harness {
        model: Arc<ScriptedModel>,
        objects: Arc<MemoryObjectStore>,
        events: Arc<MemoryEventStore>,
        pipeline: QuotePipeline,
    }

    fn harness(model: ScriptedModel) -> Harness {
        let model = Arc::new(model);
        let objects = Arc::new(MemoryObjectStore::default());
        let events = Arc::new(MemoryEventStore::default());
        let persistence =
            PersistenceCoordinator::new(objects.clone(), events.clone(), WriteMode::Upsert);
        let pipeline =
            QuotePipeline::new(model.clone(), persistence, reqwest::Client::new(), false);
        Harness {
            model,
            objects,
            events,
            pipeline,
        }
    }

    fn request(event: &str) -> QuoteExtractionRequest {
        QuoteExtractionRequest::new(
            Some("https://cdn.example.com/user-1/quote.pdf"),
            Some(event),
            "user-1",
        )
        .unwrap()
    }

    const SCENARIO_ONE: &str = r#"<JSON>{"currency":"EUR","total_quote_options":[{"total_quote":1000,"features":{"accommodation":["30 rooms"],"meeting":[],"food_beverage":[],"extras":[]}}]}</JSON>"#;

    #[tokio::test]
    async fn test_conference_scenario_writes_all_artifacts() {
        let h = harness(ScriptedModel::text(SCENARIO_ONE));
        let outcome = h.pipeline.run(&request("Conference25")).await.unwrap();

        assert_eq!(outcome.status, ExtractionStatus::Extracted);
        assert_eq!(outcome.message(), "Extraction successful");
        assert_eq!(
            outcome.usage,
            Some(TokenUsage {
                input_tokens: 1200,
                output_tokens: 340
            })
        );
        assert_eq!(
            *h.model.calls.lock().unwrap(),
            vec!["https://cdn.example.com/user-1/quote.pdf".to_string()]
        );

        let json = h.objects.get_text("user-1/Conference25/data.json").unwrap();
        let expected = SCENARIO_ONE
            .trim_start_matches("<JSON>")
            .trim_end_matches("</JSON>");
        assert_eq!(json, expected);

        let csv = h.objects.get_text("user-1/Conference25/summary.csv").unwrap();
        let rows = SummaryTable::from_csv(&csv).unwrap().rows().to_vec();
        assert_eq!(rows[0], vec!["Event Quote Summary"]);
        assert_eq!(rows[1], vec!["Currency", "EUR"]);
        assert_eq!(rows[4], vec!["Total Quote", "1000"]);
        let accommodation = rows.iter().position(|r| r == &vec!["Accommodation"]).unwrap();
        assert_eq!(rows[accommodation + 1], vec!["", "30 rooms"]);
        assert!(!rows.iter().any(|r| r == &vec!["Meeting"]));

        let stored = h.events.rows.lock().unwrap().clone();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].accommodation.as_deref(), Some("30 rooms"));
        assert_eq!(stored[0].meeting, None);
        assert_eq!(stored[0].json_location, "user-1/Conference25/data.json");
    }

    #[tokio::test]
    async fn test_missing_markers_writes_nothing() {
        let h = harness(ScriptedModel::text(
            "I could not find any pricing in this document.",
        ));
        let outcome = h.pipeline.run(&request("Conference25")).await.unwrap();

        assert_eq!(outcome.status, ExtractionStatus::MalformedExtraction);
        assert_eq!(h.objects.len(), 0);
        assert!(h.events.rows.lock().unwrap().is_empty());
        assert!(matches!(outcome.artifacts.json, ArtifactStatus::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_malformed_payload_writes_nothing() {
        let h = harness(ScriptedModel::text("<JSON>{\"currency\": </JSON>"));
        let outcome = h.pipeline.run(&request("Gala")).await.unwrap();
        assert_eq!(outcome.status, ExtractionStatus::MalformedExtraction);
        assert_eq!(h.objects.len(), 0);
    }

    #[tokio::test]
    async fn test_two_items_flatten_in_record() {
        let h = harness(ScriptedModel::text(
            r#"<JSON>{"total_quote_options":[{"features":{"accommodation":["Room A","Room B"]}}]}</JSON>"#,
        ));
        h.pipeline.run(&request("Gala")).await.unwrap();

        let stored = h.events.rows.lock().unwrap().clone();
        assert_eq!(stored[0].accommodation.as_deref(), Some("Room A, Room B"));

        let json: Value =
            serde_json::from_str(&h.objects.get_text("user-1/Gala/data.json").unwrap()).unwrap();
        assert_eq!(
            json["total_quote_options"][0]["features"]["accommodation"],
            json!(["Room A", "Room B"])
        );
    }

    #[tokio::test]
    async fn test_no_options_writes_json_only() {
        let h = harness(ScriptedModel::text(
            r#"<JSON>{"currency":"EUR","total_quote_options":[]}</JSON>"#,
        ));
        let outcome = h.pipeline.run(&request("Gala")).await.unwrap();

        assert_eq!(outcome.status, ExtractionStatus::NoOptions);
        assert!(outcome.artifacts.json.is_written());
        assert_eq!(h.objects.len(), 1);
        assert!(h.events.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_model_response_is_not_fatal() {
        let h = harness(ScriptedModel::with(Err(ModelError::EmptyResponse {
            input_tokens: 2100,
            output_tokens: 5,
        })));
        let outcome = h.pipeline.run(&request("Gala")).await.unwrap();
        assert_eq!(outcome.status, ExtractionStatus::EmptyModelResponse);
        assert_eq!(
            outcome.usage,
            Some(TokenUsage {
                input_tokens: 2100,
                output_tokens: 5
            })
        );
        assert_eq!(h.objects.len(), 0);
    }

    #[tokio::test]
    async fn test_no_options_message_reflects_failed_json() {
        let model = Arc::new(ScriptedModel::text(
            r#"<JSON>{"currency":"EUR","total_quote_options":[]}</JSON>"#,
        ));
        let objects = Arc::new(MemoryObjectStore::failing_on("user-1/Gala/data.json"));
        let events = Arc::new(MemoryEventStore::default());
        let persistence = PersistenceCoordinator::new(objects, events, WriteMode::Upsert);
        let pipeline = QuotePipeline::new(model, persistence, reqwest::Client::new(), false);

        let outcome = pipeline.run(&request("Gala")).await.unwrap();
        assert_eq!(outcome.status, ExtractionStatus::NoOptions);
        assert!(matches!(outcome.artifacts.json, ArtifactStatus::Failed { .. }));
        assert!(outcome.message().contains("the JSON failed to save"));
    }

    #[tokio::test]
    async fn test_model_failure_aborts() {
        let h = harness(ScriptedModel::with(Err(ModelError::Api {
            status: 529,
            body: "overloaded".to_string(),
        })));
        let result = h.pipeline.run(&request("Gala")).await;
        assert!(matches!(result, Err(PipelineError::ModelInvocation(_))));
        assert_eq!(h.objects.len(), 0);
    }

    #[tokio::test]
    async fn test_partial_write_failure_still_completes() {
        let model = Arc::new(ScriptedModel::text(SCENARIO_ONE));
        let objects = Arc::new(MemoryObjectStore::failing_on("user-1/Conference25/summary.csv"));
        let events = Arc::new(MemoryEventStore::default());
        let persistence =
            PersistenceCoordinator::new(objects.clone(), events.clone(), WriteMode::Upsert);
        let pipeline = QuotePipeline::new(model, persistence, reqwest::Client::new(), false);

        let outcome = pipeline.run(&request("Conference25")).await.unwrap();
        assert_eq!(outcome.status, ExtractionStatus::Extracted);
        assert!(outcome.artifacts.json.is_written());
        assert!(matches!(outcome.artifacts.summary, ArtifactStatus::Failed { .. }));
        assert!(outcome.artifacts.record.is_written());
        assert!(outcome.message().contains("1 artifact(s) failed"));
    }
}
