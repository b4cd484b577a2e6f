//! The external document store, reached through exactly two mutations.
//! Persistence semantics (upserts, id assignment, consistency) belong to
//! the store; this service treats it as a black box behind [`Store`].

use async_trait::async_trait;
use nutrifit_core::plan::NewPlan;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store rejected {mutation}: {message}")]
    Rejected {
        mutation: &'static str,
        message: String,
    },
    #[error("store returned an unexpected payload for {0}")]
    BadResponse(&'static str),
    #[error("failed to encode arguments for {0}")]
    Encode(&'static str),
}

/// Identity fields synced into the store on signup. Field names follow the
/// store's `users` document schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncUser {
    pub email: String,
    /// Display name; empty when the account carries none
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "clerkId")]
    pub clerk_id: String,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Upsert a user record keyed by the external identity id.
    async fn sync_user(&self, user: SyncUser) -> Result<(), StoreError>;

    /// Create a plan document and return its store-assigned id.
    async fn create_plan(&self, plan: NewPlan) -> Result<String, StoreError>;
}

const SYNC_USER_MUTATION: &str = "users:syncUser";
const CREATE_PLAN_MUTATION: &str = "plans:createPlan";

/// Production [`Store`]: the document store's HTTP mutation endpoint.
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpStore {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn mutation(&self, path: &'static str, args: Value) -> Result<Value, StoreError> {
        let mut request = self
            .client
            .post(format!("{}/api/mutation", self.base_url))
            .json(&json!({ "path": path, "args": args, "format": "json" }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() || body["status"] != "success" {
            let message = body["errorMessage"]
                .as_str()
                .unwrap_or("no error detail")
                .to_string();
            tracing::error!(mutation = path, status = %status, "store mutation failed: {message}");
            return Err(StoreError::Rejected {
                mutation: path,
                message,
            });
        }

        Ok(body["value"].clone())
    }
}

#[async_trait]
impl Store for HttpStore {
    async fn sync_user(&self, user: SyncUser) -> Result<(), StoreError> {
        let args =
            serde_json::to_value(&user).map_err(|_| StoreError::Encode(SYNC_USER_MUTATION))?;
        self.mutation(SYNC_USER_MUTATION, args).await?;
        Ok(())
    }

    async fn create_plan(&self, plan: NewPlan) -> Result<String, StoreError> {
        let args =
            serde_json::to_value(&plan).map_err(|_| StoreError::Encode(CREATE_PLAN_MUTATION))?;
        let value = self.mutation(CREATE_PLAN_MUTATION, args).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or(StoreError::BadResponse(CREATE_PLAN_MUTATION))
    }
}
