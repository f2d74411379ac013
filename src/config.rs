//! Service settings loaded from the environment (and `.env` when present).

use anyhow::{bail, Context, Result};

use crate::model::{ModelParams, ModelProviderKind};
use crate::storage::WriteMode;

const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
const DEFAULT_MAX_TOKENS: u32 = 5000;
const DEFAULT_TEMPERATURE: f32 = 1.0;
const DEFAULT_BUCKET: &str = "quotes";
const DEFAULT_EVENT_TABLE: &str = "event";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub supabase_anon_key: String,
    pub bucket: String,
    pub event_table: String,
    pub db_write_mode: WriteMode,
    pub provider: ModelProviderKind,
    pub model_api_key: String,
    pub model: ModelParams,
    pub inline_documents: bool,
}

impl Settings {
    /// Load settings from process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).with_context(|| format!("{} must be set", key));

        let provider = match var("MODEL_PROVIDER") {
            Some(name) => ModelProviderKind::parse(&name)
                .with_context(|| format!("Unknown MODEL_PROVIDER: {}", name))?,
            None => ModelProviderKind::Anthropic,
        };
        let model_api_key = match provider {
            ModelProviderKind::Anthropic => required("ANTHROPIC_API_KEY")?,
            ModelProviderKind::OpenRouter => required("OPENROUTER_API_KEY")?,
        };

        let max_tokens = match var("MODEL_MAX_TOKENS") {
            Some(v) => v
                .parse::<u32>()
                .context("MODEL_MAX_TOKENS must be a positive integer")?,
            None => DEFAULT_MAX_TOKENS,
        };
        if max_tokens == 0 {
            bail!("MODEL_MAX_TOKENS must be greater than zero");
        }

        let temperature = match var("MODEL_TEMPERATURE") {
            Some(v) => v
                .parse::<f32>()
                .context("MODEL_TEMPERATURE must be a number")?,
            None => DEFAULT_TEMPERATURE,
        };
        if !(0.0..=1.0).contains(&temperature) {
            bail!("MODEL_TEMPERATURE must be between 0.0 and 1.0, got {}", temperature);
        }

        let db_write_mode = match var("DB_WRITE_MODE") {
            Some(v) => WriteMode::parse(&v)
                .with_context(|| format!("Unknown DB_WRITE_MODE: {}", v))?,
            None => WriteMode::Upsert,
        };

        let inline_documents = match var("INLINE_DOCUMENTS") {
            Some(v) => parse_bool(&v).context("INLINE_DOCUMENTS must be true or false")?,
            None => false,
        };

        let supabase_service_role_key = required("SUPABASE_SERVICE_ROLE_KEY")?;

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            supabase_url: required("SUPABASE_URL")?,
            supabase_anon_key: var("SUPABASE_ANON_KEY")
                .unwrap_or_else(|| supabase_service_role_key.clone()),
            supabase_service_role_key,
            bucket: var("BUCKET_NAME").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            event_table: var("EVENT_TABLE").unwrap_or_else(|| DEFAULT_EVENT_TABLE.to_string()),
            db_write_mode,
            provider,
            model_api_key,
            model: ModelParams {
                model: var("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                max_tokens,
                temperature,
            },
            inline_documents,
        })
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
