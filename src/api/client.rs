use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::types::{
    ConfirmPlanRequest, CreatePlanRequest, ProgressReport, Report, StartRequest, UserConfirm,
};
use super::{ByteStream, EventStreamSource, SnapshotSource};
use crate::config::ClientConfig;
use crate::core::plan::Plan;
use crate::core::snapshot::BackendSnapshot;

/// HTTP client for the research backend.
#[derive(Clone)]
pub struct ResearchApi {
    config: ClientConfig,
    client: reqwest::Client,
    /// No total timeout: an event stream stays open for the whole run.
    stream_client: reqwest::Client,
}

impl ResearchApi {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        if config.base_url.trim().is_empty() {
            return Err(ApiError::Request("base url cannot be empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok(Self {
            config,
            client,
            stream_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    fn plan_url(&self, prefix: &str, plan_id: &str) -> String {
        self.url(&format!("{prefix}/{}", urlencoding::encode(plan_id)))
    }

    /// `POST /api/research/start`: non-streaming run until the first pause.
    pub async fn start(&self, topic: &str) -> Result<BackendSnapshot, ApiError> {
        let body = StartRequest {
            topic: topic.to_string(),
            locale: self.config.locale.clone(),
        };
        let response = self
            .client
            .post(self.url("/api/research/start"))
            .json(&body)
            .send()
            .await?;
        read_json(response, "start").await
    }

    pub async fn confirm_plan(
        &self,
        plan_id: &str,
        user_confirm: UserConfirm,
        message: Option<String>,
    ) -> Result<BackendSnapshot, ApiError> {
        let body = ConfirmPlanRequest {
            plan_id: plan_id.to_string(),
            user_confirm,
            message,
        };
        let response = self
            .client
            .post(self.url("/api/research/confirm-plan"))
            .json(&body)
            .send()
            .await?;
        read_json(response, "confirm-plan").await
    }

    pub async fn status(&self, plan_id: &str) -> Result<BackendSnapshot, ApiError> {
        let response = self
            .client
            .get(self.plan_url("/api/research/status", plan_id))
            .send()
            .await?;
        read_json(response, "status").await
    }

    pub async fn create_plan(&self, topic: &str) -> Result<Plan, ApiError> {
        let response = self
            .client
            .post(self.url("/api/research/create-plan"))
            .json(&CreatePlanRequest {
                topic: topic.to_string(),
            })
            .send()
            .await?;
        read_json(response, "create-plan").await
    }

    pub async fn update_plan(&self, plan: &Plan) -> Result<Plan, ApiError> {
        let response = self
            .client
            .post(self.plan_url("/api/research/update-plan", &plan.id))
            .json(plan)
            .send()
            .await?;
        read_json(response, "update-plan").await
    }

    /// `POST /api/research/start/{id}`: begin executing a confirmed plan.
    pub async fn start_plan(&self, plan_id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.plan_url("/api/research/start", plan_id))
            .send()
            .await?;
        ensure_success(response).await.map(|_| ())
    }

    pub async fn progress(&self, plan_id: &str) -> Result<ProgressReport, ApiError> {
        let response = self
            .client
            .get(self.plan_url("/api/research/progress", plan_id))
            .send()
            .await?;
        read_json(response, "progress").await
    }

    pub async fn stop(&self, plan_id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.plan_url("/api/research/stop", plan_id))
            .send()
            .await?;
        ensure_success(response).await.map(|_| ())
    }

    pub async fn report(&self, plan_id: &str) -> Result<Report, ApiError> {
        let response = self
            .client
            .get(self.plan_url("/api/research/report", plan_id))
            .send()
            .await?;
        read_json(response, "report").await
    }
}

#[async_trait]
impl EventStreamSource for ResearchApi {
    async fn open_event_stream(&self, request: &StartRequest) -> Result<ByteStream, ApiError> {
        let url = format!(
            "{}?mode={}",
            self.url("/api/research/start/stream"),
            urlencoding::encode(&self.config.stream_mode)
        );
        let response = self
            .stream_client
            .post(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        tracing::info!(topic = %request.topic, "research event stream opened");

        Ok(response.bytes_stream().map_err(ApiError::from).boxed())
    }
}

#[async_trait]
impl SnapshotSource for ResearchApi {
    async fn fetch_status(&self, plan_id: &str) -> Result<BackendSnapshot, ApiError> {
        self.status(plan_id).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ApiError::Http {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        ApiError::InvalidResponse(format!("failed to parse {endpoint} response: {e}"))
    })
}
