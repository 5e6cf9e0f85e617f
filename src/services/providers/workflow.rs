/// Recommendation microservice provider
///
/// Calls the workflow endpoint of the recommendation microservice:
/// `POST {base}/run-workflow/run-workflow-video-ids` with `{user_id, top_k}`,
/// answered by `{video_ids: [...], ...}`.
use crate::{
    error::{AppError, AppResult},
    models::WorkflowResponse,
    services::providers::RecommendationProvider,
};
use reqwest::Client as HttpClient;
use serde::Serialize;
use std::time::Duration;

const WORKFLOW_PATH: &str = "/run-workflow/run-workflow-video-ids";

#[derive(Debug, Serialize)]
struct WorkflowRequest<'a> {
    user_id: &'a str,
    top_k: usize,
}

#[derive(Clone)]
pub struct HttpRecommendationProvider {
    http_client: HttpClient,
    api_url: String,
}

impl HttpRecommendationProvider {
    /// Creates a provider whose calls fail once `timeout` elapses
    pub fn new(api_url: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.api_url, WORKFLOW_PATH)
    }

    /// Parses the workflow response body
    fn parse_response(&self, body: &str) -> AppResult<Vec<String>> {
        let parsed: WorkflowResponse = serde_json::from_str(body).map_err(|e| {
            AppError::ExternalApi(format!("Malformed recommendation response: {}", e))
        })?;

        Ok(parsed
            .video_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect())
    }
}

#[async_trait::async_trait]
impl RecommendationProvider for HttpRecommendationProvider {
    async fn recommend(&self, user_id: &str, top_k: usize) -> AppResult<Vec<String>> {
        let url = self.endpoint();
        tracing::debug!(url = %url, user_id = %user_id, top_k, "Calling recommendation service");

        let response = self
            .http_client
            .post(&url)
            .json(&WorkflowRequest { user_id, top_k })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Recommendation service returned status {}: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        let video_ids = self.parse_response(&body)?;

        tracing::info!(
            user_id = %user_id,
            returned = video_ids.len(),
            provider = self.name(),
            "Recommendations fetched"
        );

        Ok(video_ids)
    }

    fn name(&self) -> &'static str {
        "workflow"
    }
}
