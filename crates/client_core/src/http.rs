//! reqwest-backed evaluation source and submission sink.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use shared::{
    domain::EvaluationId,
    error::{ApiError, ApiException},
    protocol::{Evaluation, EvaluationPayload, SubmissionAck, SubmissionRequest},
};
use tracing::{debug, warn};

use crate::{error::LoadFailure, EvaluationSource, SubmissionSink};

#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_client(http, base_url))
    }

    fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

pub struct HttpEvaluationSource {
    backend: HttpBackend,
}

impl HttpEvaluationSource {
    pub fn new(backend: HttpBackend) -> Self {
        Self { backend }
    }
}

/// The status decides the failure; a decodable body only enriches the message.
fn load_failure_for(status: StatusCode, body: &str) -> LoadFailure {
    match status {
        StatusCode::NOT_FOUND => LoadFailure::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LoadFailure::Unauthorized,
        _ => LoadFailure::Unreachable(ApiError::from_body(status.as_u16(), body).message),
    }
}

#[async_trait]
impl EvaluationSource for HttpEvaluationSource {
    async fn fetch_evaluation(
        &self,
        evaluation_id: EvaluationId,
    ) -> std::result::Result<Evaluation, LoadFailure> {
        let url = self
            .backend
            .url(&format!("evaluations/{}/take", evaluation_id.0));
        debug!("http: fetching evaluation url={url}");

        let response = self
            .backend
            .authorize(self.backend.http.get(&url))
            .send()
            .await
            .map_err(|err| LoadFailure::Unreachable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(load_failure_for(status, &body));
        }

        let payload: EvaluationPayload = response
            .json()
            .await
            .map_err(|err| LoadFailure::Malformed(err.to_string()))?;
        if payload.evaluation_id != evaluation_id {
            return Err(LoadFailure::Malformed(format!(
                "requested evaluation {} but received {}",
                evaluation_id.0, payload.evaluation_id.0
            )));
        }

        payload
            .into_evaluation()
            .map_err(|err| LoadFailure::Malformed(err.to_string()))
    }
}

pub struct HttpSubmissionSink {
    backend: HttpBackend,
}

impl HttpSubmissionSink {
    pub fn new(backend: HttpBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SubmissionSink for HttpSubmissionSink {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionAck> {
        let url = self
            .backend
            .url(&format!("evaluations/{}/submissions", request.evaluation_id.0));

        let response = self
            .backend
            .authorize(self.backend.http.post(&url).json(request))
            .send()
            .await
            .with_context(|| format!("failed to reach submission endpoint {url}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read submission response")?;
        if !status.is_success() {
            let api_error = ApiError::from_body(status.as_u16(), &body);
            return Err(ApiException::from(api_error).into());
        }

        if body.trim().is_empty() {
            return Ok(SubmissionAck::implicit());
        }
        // Any 2xx means the answers were stored; the body is informational.
        match serde_json::from_str::<SubmissionAck>(&body) {
            Ok(ack) => Ok(ack),
            Err(err) => {
                warn!("http: unreadable submission acknowledgement err={err}");
                Ok(SubmissionAck::implicit())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
