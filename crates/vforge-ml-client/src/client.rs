//! ML service HTTP client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use vforge_models::{BlurTarget, Region};

use crate::error::{MlError, MlResult};
use crate::service::{LanguageService, VisionService};
use crate::types::{
    DetectRequest, DetectResponse, HealthResponse, ScriptRequest, ScriptResponse, SpeechRequest,
    TranscribeRequest, TranscribeResponse,
};

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
    /// Base backoff between retries
    pub retry_backoff: Duration,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(300), // 5 minutes for video analysis
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ML_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("ML_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_backoff: defaults.retry_backoff,
        }
    }
}

/// Client for the ML service.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    /// Check if ML service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> MlResult<Response> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("Sending ML request to {}", url);

        self.with_retry(|| async {
            let response = self
                .http
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(MlError::Network)?;
            check_status(response).await
        })
        .await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> MlResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_backoff * 2u32.pow(attempt);
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn check_status(response: Response) -> MlResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
        Err(MlError::ServiceUnavailable(format!("{}: {}", status, body)))
    } else {
        Err(MlError::request_failed(format!(
            "ML service returned {}: {}",
            status, body
        )))
    }
}

#[async_trait]
impl VisionService for MlClient {
    async fn detect_regions(&self, input: &Path, targets: &[BlurTarget]) -> MlResult<Vec<Region>> {
        let request = DetectRequest {
            input_path: input.to_string_lossy().into_owned(),
            targets: targets.to_vec(),
        };
        let response: DetectResponse = self.post_json("/detect", &request).await?;
        debug!(count = response.regions.len(), "Detected regions");
        Ok(response.regions)
    }
}

#[async_trait]
impl LanguageService for MlClient {
    async fn generate_script(&self, text: &str, content_hint: Option<&str>) -> MlResult<String> {
        let request = ScriptRequest {
            text: text.to_string(),
            content_hint: content_hint.map(str::to_string),
        };
        let response: ScriptResponse = self.post_json("/script", &request).await?;
        if response.script.trim().is_empty() {
            return Err(MlError::invalid_response("empty script"));
        }
        Ok(response.script)
    }

    async fn synthesize_speech(
        &self,
        script: &str,
        voice: Option<&str>,
        output: &Path,
    ) -> MlResult<()> {
        let request = SpeechRequest {
            text: script.to_string(),
            voice: voice.map(str::to_string),
        };
        let response = self.post("/speech", &request).await?;
        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(MlError::invalid_response("empty audio"));
        }
        tokio::fs::write(output, &audio).await?;
        Ok(())
    }

    async fn transcribe(&self, input: &Path) -> MlResult<String> {
        let request = TranscribeRequest {
            input_path: input.to_string_lossy().into_owned(),
        };
        let response: TranscribeResponse = self.post_json("/transcribe", &request).await?;
        Ok(response.srt)
    }
}
