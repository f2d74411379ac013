//! Best-effort persistence of the three extraction artifacts.
//!
//! Writes run in order (JSON, summary, event row). A failed write is logged
//! and reported but never stops the writes after it, and nothing is rolled
//! back, so each artifact carries its own status.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::normalize::{EventRecord, QuoteDocument};
use crate::storage::{EventStore, ObjectStore, WriteMode};
use crate::summary::build_summary;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Object-store paths of one owner/event pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub json: String,
    pub summary: String,
    pub document: String,
}

impl ArtifactPaths {
    pub fn new(owner_id: &str, event_name: &str) -> Self {
        let prefix = format!("{}/{}", owner_id, event_name);
        Self {
            json: format!("{}/data.json", prefix),
            summary: format!("{}/summary.csv", prefix),
            document: format!("{}/quote.pdf", prefix),
        }
    }
}

/// Outcome of one write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactStatus {
    Written { location: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl ArtifactStatus {
    pub fn skipped(reason: impl Into<String>) -> Self {
        ArtifactStatus::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, ArtifactStatus::Written { .. })
    }
}

/// Per-artifact status of one extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistenceReport {
    pub json: ArtifactStatus,
    pub summary: ArtifactStatus,
    pub record: ArtifactStatus,
}

impl PersistenceReport {
    /// Report for an extraction that produced nothing to write.
    pub fn nothing_written(reason: &str) -> Self {
        Self {
            json: ArtifactStatus::skipped(reason),
            summary: ArtifactStatus::skipped(reason),
            record: ArtifactStatus::skipped(reason),
        }
    }

    pub fn failures(&self) -> usize {
        [&self.json, &self.summary, &self.record]
            .into_iter()
            .filter(|s| matches!(s, ArtifactStatus::Failed { .. }))
            .count()
    }
}

/// Sequences the JSON, summary and event-row writes.
#[derive(Clone)]
pub struct PersistenceCoordinator {
    objects: Arc<dyn ObjectStore>,
    events: Arc<dyn EventStore>,
    write_mode: WriteMode,
}

impl PersistenceCoordinator {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        events: Arc<dyn EventStore>,
        write_mode: WriteMode,
    ) -> Self {
        Self {
            objects,
            events,
            write_mode,
        }
    }

    /// Persist a parsed extraction.
    ///
    /// The JSON artifact is always attempted; the summary and event row only
    /// when the quote has a primary option.
    pub async fn persist(
        &self,
        owner_id: &str,
        event_name: &str,
        document: &QuoteDocument,
    ) -> PersistenceReport {
        let paths = ArtifactPaths::new(owner_id, event_name);

        let json = match document.to_json_bytes() {
            Ok(bytes) => self.put(&paths.json, bytes, JSON_CONTENT_TYPE).await,
            Err(e) => {
                error!("Failed to serialize JSON artifact: {}", e);
                ArtifactStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        let Some(record) = EventRecord::project(document, owner_id, event_name, &paths.json) else {
            info!("No total_quote_options found; skipping summary and event record");
            return PersistenceReport {
                json,
                summary: ArtifactStatus::skipped("no quote options"),
                record: ArtifactStatus::skipped("no quote options"),
            };
        };

        let summary = match build_summary(&document.quote).to_csv() {
            Ok(csv) => {
                self.put(&paths.summary, csv.into_bytes(), CSV_CONTENT_TYPE)
                    .await
            }
            Err(e) => {
                error!("Failed to render summary: {}", e);
                ArtifactStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        let record = self.write_record(&record).await;

        let report = PersistenceReport {
            json,
            summary,
            record,
        };
        if report.failures() > 0 {
            warn!(
                "{} of 3 artifacts failed for {}/{}",
                report.failures(),
                owner_id,
                event_name
            );
        }
        report
    }

    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> ArtifactStatus {
        match self.objects.put(path, bytes, content_type, true).await {
            Ok(()) => ArtifactStatus::Written {
                location: path.to_string(),
            },
            Err(e) => {
                error!("Upload of {} failed: {}", path, e);
                ArtifactStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn write_record(&self, record: &EventRecord) -> ArtifactStatus {
        let result = match self.write_mode {
            WriteMode::Upsert => self.events.upsert(record).await,
            WriteMode::Append => self.events.insert(record).await,
        };
        match result {
            Ok(_) => {
                info!(
                    "Event row written for {}/{}",
                    record.owner_id, record.event_name
                );
                ArtifactStatus::Written {
                    location: format!("event:{}/{}", record.owner_id, record.event_name),
                }
            }
            Err(e) => {
                error!("Error inserting event into database: {}", e);
                ArtifactStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{MemoryEventStore, MemoryObjectStore};
    use super::*;
    use crate::normalize::normalize;
    use serde_json::json;

    fn coordinator(
        objects: Arc<MemoryObjectStore>,
        events: Arc<MemoryEventStore>,
        mode: WriteMode,
    ) -> PersistenceCoordinator {
        PersistenceCoordinator::new(objects, events, mode)
    }

    fn document() -> QuoteDocument {
        normalize(json!({
            "currency": "EUR",
            "total_quote_options": [{
                "total_quote": 1000,
                "features": {
                    "accommodation": ["30 rooms"],
                    "meeting": [],
                    "food_beverage": [],
                    "extras": []
                }
            }]
        }))
    }

    #[test]
    fn test_artifact_paths() {
        let paths = ArtifactPaths::new("u1", "Conference25");
        assert_eq!(paths.json, "u1/Conference25/data.json");
        assert_eq!(paths.summary, "u1/Conference25/summary.csv");
        assert_eq!(paths.document, "u1/Conference25/quote.pdf");
    }

    #[tokio::test]
    async fn test_writes_all_three() {
        let objects = Arc::new(MemoryObjectStore::default());
        let events = Arc::new(MemoryEventStore::default());
        let report = coordinator(objects.clone(), events.clone(), WriteMode::Upsert)
            .persist("u1", "Conference25", &document())
            .await;

        assert!(report.json.is_written());
        assert!(report.summary.is_written());
        assert!(report.record.is_written());
        let (_, content_type) =
            objects.objects.lock().unwrap()["u1/Conference25/summary.csv"].clone();
        assert_eq!(content_type, "text/csv");
        assert_eq!(events.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_options_writes_json_only() {
        let objects = Arc::new(MemoryObjectStore::default());
        let events = Arc::new(MemoryEventStore::default());
        let doc = normalize(json!({"currency": "EUR", "total_quote_options": []}));
        let report = coordinator(objects.clone(), events.clone(), WriteMode::Upsert)
            .persist("u1", "Empty", &doc)
            .await;

        assert!(report.json.is_written());
        assert!(matches!(report.summary, ArtifactStatus::Skipped { .. }));
        assert!(matches!(report.record, ArtifactStatus::Skipped { .. }));
        assert_eq!(objects.len(), 1);
        assert!(events.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_json_does_not_stop_later_writes() {
        let objects = Arc::new(MemoryObjectStore::failing_on("u1/Conference25/data.json"));
        let events = Arc::new(MemoryEventStore::default());
        let report = coordinator(objects.clone(), events.clone(), WriteMode::Upsert)
            .persist("u1", "Conference25", &document())
            .await;

        assert!(matches!(report.json, ArtifactStatus::Failed { .. }));
        assert!(report.summary.is_written());
        assert!(report.record.is_written());
        assert_eq!(report.failures(), 1);
    }

    #[tokio::test]
    async fn test_failed_record_is_reported() {
        let objects = Arc::new(MemoryObjectStore::default());
        let events = Arc::new(MemoryEventStore {
            fail: true,
            ..Default::default()
        });
        let report = coordinator(objects.clone(), events, WriteMode::Append)
            .persist("u1", "Conference25", &document())
            .await;

        assert!(report.json.is_written());
        assert!(report.summary.is_written());
        assert!(matches!(report.record, ArtifactStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_write_modes() {
        let objects = Arc::new(MemoryObjectStore::default());

        let events = Arc::new(MemoryEventStore::default());
        let upsert = coordinator(objects.clone(), events.clone(), WriteMode::Upsert);
        upsert.persist("u1", "Gala", &document()).await;
        upsert.persist("u1", "Gala", &document()).await;
        assert_eq!(events.rows.lock().unwrap().len(), 1);

        let events = Arc::new(MemoryEventStore::default());
        let append = coordinator(objects.clone(), events.clone(), WriteMode::Append);
        append.persist("u1", "Gala", &document()).await;
        append.persist("u1", "Gala", &document()).await;
        assert_eq!(events.rows.lock().unwrap().len(), 2);

        // Object writes are upserts keyed by path.
        assert_eq!(objects.len(), 2);
    }
}
