//! Client for the hosted backend's table API.
//!
//! Every request carries the project key in `apikey` and a bearer token: the
//! signed-in user's access token when one is available (row-level policies
//! are evaluated against it), the project key otherwise. Single-row reads ask
//! for an object response so "no row" comes back as the distinguished
//! `PGRST116` error, which maps to `StorageError::NotFound`.

use std::sync::Arc;

use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::repository::{
    ChapterRepository, ProfileRepository, Storage, StorageError, VideoRepository,
    WatchStatusRepository,
};

mod query;
mod tables;

pub use query::Query;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const NO_ROWS_CODE: &str = "PGRST116";
const UNIQUE_VIOLATION_CODE: &str = "23505";
const INSUFFICIENT_PRIVILEGE_CODE: &str = "42501";

/// Where the backend lives and the public project key used for every call.
#[derive(Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub anon_key: String,
}

impl RemoteConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            anon_key: anon_key.into(),
        }
    }

    #[must_use]
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Supplies the bearer token for data requests.
///
/// Implemented by the session context in the services layer so the current
/// session is passed in explicitly rather than looked up globally.
pub trait AccessTokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

#[derive(Clone)]
pub struct RemoteRepository {
    client: Client,
    config: RemoteConfig,
    tokens: Arc<dyn AccessTokenSource>,
}

impl RemoteRepository {
    #[must_use]
    pub fn new(config: RemoteConfig, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self::with_client(Client::new(), config, tokens)
    }

    #[must_use]
    pub fn with_client(
        client: Client,
        config: RemoteConfig,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            client,
            config,
            tokens,
        }
    }

    fn request(&self, method: Method, table: &str, query: &Query) -> RequestBuilder {
        let bearer = self
            .tokens
            .access_token()
            .unwrap_or_else(|| self.config.anon_key.clone());
        debug!(%method, table, "backend request");
        self.client
            .request(method, self.config.table_url(table))
            .query(&query.pairs())
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StorageError> {
        let response = builder
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = classify(status, &body);
        debug!(status = status.as_u16(), error = %err, "backend request failed");
        Err(err)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StorageError> {
        response
            .json::<T>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub(crate) async fn select_many<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, StorageError> {
        let response = self.send(self.request(Method::GET, table, query)).await?;
        Self::decode(response).await
    }

    pub(crate) async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<T, StorageError> {
        let builder = self
            .request(Method::GET, table, query)
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT));
        let response = self.send(builder).await?;
        Self::decode(response).await
    }

    pub(crate) async fn insert_one<B, T>(&self, table: &str, body: &B) -> Result<T, StorageError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let builder = self
            .request(Method::POST, table, &Query::new())
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT))
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.send(builder).await?;
        Self::decode(response).await
    }

    pub(crate) async fn update_one<B, T>(
        &self,
        table: &str,
        query: &Query,
        patch: &B,
    ) -> Result<T, StorageError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let builder = self
            .request(Method::PATCH, table, query)
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT))
            .header("Prefer", "return=representation")
            .json(patch);
        let response = self.send(builder).await?;
        Self::decode(response).await
    }

    pub(crate) async fn upsert_one<B, T>(
        &self,
        table: &str,
        conflict_key: &str,
        body: &B,
    ) -> Result<T, StorageError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let query = Query::new().on_conflict(conflict_key);
        let builder = self
            .request(Method::POST, table, &query)
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(body);
        let response = self.send(builder).await?;
        Self::decode(response).await
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a failed response onto the storage error taxonomy.
pub(crate) fn classify(status: StatusCode, body: &str) -> StorageError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code;
    match code.as_deref() {
        Some(NO_ROWS_CODE) => return StorageError::NotFound,
        Some(UNIQUE_VIOLATION_CODE) => return StorageError::Conflict,
        Some(INSUFFICIENT_PRIVILEGE_CODE) => return StorageError::Unauthorized,
        _ => {}
    }
    match status {
        StatusCode::CONFLICT => StorageError::Conflict,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Unauthorized,
        _ => StorageError::Remote {
            status: status.as_u16(),
            code,
            message: parsed.message.unwrap_or_else(|| body.trim().to_owned()),
        },
    }
}

impl Storage {
    /// Build a `Storage` that talks to the hosted backend.
    #[must_use]
    pub fn remote(config: RemoteConfig, tokens: Arc<dyn AccessTokenSource>) -> Self {
        let repo = RemoteRepository::new(config, tokens);
        let chapters: Arc<dyn ChapterRepository> = Arc::new(repo.clone());
        let videos: Arc<dyn VideoRepository> = Arc::new(repo.clone());
        let profiles: Arc<dyn ProfileRepository> = Arc::new(repo.clone());
        let watch_status: Arc<dyn WatchStatusRepository> = Arc::new(repo);
        Self {
            chapters,
            videos,
            profiles,
            watch_status,
        }
    }
}
