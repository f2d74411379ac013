//! Supabase client for storage uploads, the event table and token lookup.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::normalize::EventRecord;
use crate::storage::{Authenticator, EventStore, ObjectStore, StorageError};

/// Supabase client configuration.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
    anon_key: String,
    bucket: String,
    event_table: String,
}

impl SupabaseClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        service_role_key: impl Into<String>,
        anon_key: impl Into<String>,
        bucket: impl Into<String>,
        event_table: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
            anon_key: anon_key.into(),
            bucket: bucket.into(),
            event_table: event_table.into(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        )
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.event_table)
    }

    /// POST one row to the event table with the given `Prefer` header.
    async fn write_event(
        &self,
        record: &EventRecord,
        url: String,
        prefer: &str,
    ) -> Result<EventRecord, StorageError> {
        debug!("Writing event row: {} / {}", record.owner_id, record.event_name);

        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .header("Prefer", prefer)
            .json(record)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, body });
        }

        let rows: Vec<EventRecord> = resp.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::Decode("insert returned no rows".to_string()))
    }
}

#[async_trait::async_trait]
impl ObjectStore for SupabaseClient {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), StorageError> {
        let size = bytes.len();
        let resp = self
            .client
            .post(self.object_url(path))
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", content_type)
            .header("x-upsert", if overwrite { "true" } else { "false" })
            .body(bytes)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, body });
        }

        info!("Uploaded {} ({} bytes) to bucket {}", path, size, self.bucket);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        )
    }
}

#[async_trait::async_trait]
impl EventStore for SupabaseClient {
    async fn insert(&self, record: &EventRecord) -> Result<EventRecord, StorageError> {
        self.write_event(record, self.table_url(), "return=representation")
            .await
    }

    async fn upsert(&self, record: &EventRecord) -> Result<EventRecord, StorageError> {
        let url = format!("{}?on_conflict=user_id,event_name", self.table_url());
        self.write_event(
            record,
            url,
            "resolution=merge-duplicates,return=representation",
        )
        .await
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<EventRecord>, StorageError> {
        let owner_filter = format!("eq.{}", owner_id);
        let resp = self
            .client
            .get(self.table_url())
            .query(&[
                ("select", "*"),
                ("user_id", owner_filter.as_str()),
                ("order", "created_at.desc"),
            ])
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, body });
        }

        Ok(resp.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

#[async_trait::async_trait]
impl Authenticator for SupabaseClient {
    async fn resolve_owner(&self, token: &str) -> Result<String, StorageError> {
        let resp = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        match resp.status().as_u16() {
            200..=299 => {}
            401 | 403 => return Err(StorageError::Unauthorized),
            status => {
                let body = resp.text().await.unwrap_or_default();
                return Err(StorageError::Rejected { status, body });
            }
        }

        let user: AuthUser = resp.json().await?;
        Ok(user.id)
    }
}

/// Percent-encode each path segment, keeping the `/` separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
