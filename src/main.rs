//! Quote Extractor - hotel quote PDF extraction service.

mod config;
mod error;
mod model;
mod normalize;
mod parser;
mod persist;
mod pipeline;
mod prompt;
mod request;
mod schema;
mod storage;
mod summary;
mod supabase;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Settings;
use error::PipelineError;
use model::{
    anthropic::AnthropicClient, openrouter::OpenRouterClient, ExtractionModel, ModelProviderKind,
};
use normalize::EventRecord;
use persist::{ArtifactPaths, PersistenceCoordinator};
use pipeline::QuotePipeline;
use request::{ExtractionBody, QuoteExtractionRequest};
use storage::{Authenticator, EventStore, ObjectStore, StorageError};
use supabase::SupabaseClient;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<QuotePipeline>,
    auth: Arc<dyn Authenticator>,
    events: Arc<dyn EventStore>,
    objects: Arc<dyn ObjectStore>,
}

type ApiError = (StatusCode, Json<Value>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "quote_extractor=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let http = reqwest::Client::new();

    let model: Arc<dyn ExtractionModel> = match settings.provider {
        ModelProviderKind::Anthropic => Arc::new(AnthropicClient::new(
            http.clone(),
            settings.model_api_key.clone(),
            settings.model.clone(),
        )),
        ModelProviderKind::OpenRouter => Arc::new(OpenRouterClient::new(
            http.clone(),
            settings.model_api_key.clone(),
            settings.model.clone(),
        )),
    };
    info!(
        "Model client initialized: {} ({})",
        model.name(),
        settings.model.model
    );

    let supabase = Arc::new(SupabaseClient::new(
        http.clone(),
        settings.supabase_url.clone(),
        settings.supabase_service_role_key.clone(),
        settings.supabase_anon_key.clone(),
        settings.bucket.clone(),
        settings.event_table.clone(),
    ));
    info!("Supabase client initialized for bucket {}", settings.bucket);

    let persistence =
        PersistenceCoordinator::new(supabase.clone(), supabase.clone(), settings.db_write_mode);
    let pipeline = QuotePipeline::new(model, persistence, http, settings.inline_documents);

    let state = AppState {
        pipeline: Arc::new(pipeline),
        auth: supabase.clone(),
        events: supabase.clone(),
        objects: supabase,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/extract", post(extract_quote))
        .route("/events", get(list_events))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!("Server listening on http://{}", settings.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Extract a quote document and persist its artifacts.
async fn extract_quote(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ExtractionBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let owner_id = authenticate(&state, &headers).await?;
    let Json(body) = body.map_err(|e| failure(StatusCode::BAD_REQUEST, e.body_text()))?;

    let request = QuoteExtractionRequest::from_body(&body, &owner_id)
        .map_err(pipeline_failure)?;
    info!(
        "Received extraction request for event {:?} from {}",
        request.event_name(),
        request.owner_id()
    );

    let outcome = state.pipeline.run(&request).await.map_err(pipeline_failure)?;

    Ok(Json(json!({
        "success": true,
        "message": outcome.message(),
        "status": outcome.status,
        "artifacts": outcome.artifacts,
        "usage": outcome.usage,
        "diagnostics": outcome.diagnostics,
    })))
}

/// One stored event with public links to its artifacts.
#[derive(Serialize)]
struct EventListing {
    #[serde(flatten)]
    record: EventRecord,
    summary_public_url: String,
    json_public_url: String,
    document_public_url: String,
}

/// List the caller's extracted events.
async fn list_events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<EventListing>>, ApiError> {
    let owner_id = authenticate(&state, &headers).await?;
    let records = state.events.list(&owner_id).await.map_err(|e| {
        error!("Failed to list events: {}", e);
        failure(StatusCode::BAD_GATEWAY, e.to_string())
    })?;

    Ok(Json(event_listings(records, state.objects.as_ref())))
}

// ============================================================================
// Helper functions
// ============================================================================

fn event_listings(records: Vec<EventRecord>, objects: &dyn ObjectStore) -> Vec<EventListing> {
    records
        .into_iter()
        .map(|record| {
            let paths = ArtifactPaths::new(&record.owner_id, &record.event_name);
            EventListing {
                summary_public_url: objects.public_url(&paths.summary),
                json_public_url: objects.public_url(&paths.json),
                document_public_url: objects.public_url(&paths.document),
                record,
            }
        })
        .collect()
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "Missing bearer token"))?;
    state.auth.resolve_owner(token).await.map_err(|e| match e {
        StorageError::Unauthorized => failure(StatusCode::UNAUTHORIZED, "Unauthorized"),
        other => {
            error!("Token lookup failed: {}", other);
            failure(StatusCode::BAD_GATEWAY, other.to_string())
        }
    })
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn pipeline_failure(e: PipelineError) -> ApiError {
    match e {
        PipelineError::Validation(_) => {
            warn!("Rejected request: {}", e);
            failure(StatusCode::BAD_REQUEST, e.to_string())
        }
        PipelineError::ModelInvocation(_) => {
            error!("Extraction failed: {}", e);
            failure(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({ "success": false, "message": message.into() })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_listing_tolerates_null_columns() {
        let records: Vec<EventRecord> = serde_json::from_value(json!([{
            "event_name": "Gala",
            "user_id": "u1",
            "currency": "EUR",
            "extras": null,
            "json_url": null
        }]))
        .unwrap();
        let objects = persist::testing::MemoryObjectStore::default();

        let listings = event_listings(records, &objects);
        let body = serde_json::to_value(&listings).unwrap();
        assert_eq!(body[0]["event_name"], "Gala");
        assert_eq!(body[0]["extras"], json!([]));
        assert_eq!(body[0]["summary_public_url"], "memory://u1/Gala/summary.csv");
        assert_eq!(body[0]["document_public_url"], "memory://u1/Gala/quote.pdf");
    }

    #[test]
    fn test_failure_body() {
        let (status, Json(body)) =
            pipeline_failure(PipelineError::validation("eventName is required"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("eventName"));
    }
}
