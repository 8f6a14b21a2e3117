use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};

use crate::api::{BatchStatus, BatchUpload, PipelineApi, SubmitReceipt};
use crate::errors::ApiError;

/// HTTP client for a live pipeline backend
#[derive(Debug)]
pub struct HttpPipelineApi {
    /// HTTP client for API requests
    client: Client,
    /// Base URL of the backend, without the /api prefix
    base_url: String,
}

impl HttpPipelineApi {
    /// Create a new client against the given backend
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Render an upload as the multipart form the backend expects.
    /// URLs travel newline-joined, target languages comma-joined.
    fn build_form(upload: BatchUpload) -> Form {
        let mut form = Form::new()
            .text("urls", upload.url_lines.join("\n"))
            .text("source_lang", upload.source_language)
            .text("target_langs", upload.target_languages.join(","))
            .text("asr_model", upload.options.asr_model)
            .text("translation_model", upload.options.translation_model)
            .text("tts_model", upload.options.tts_model)
            .text("translation_strategy", upload.options.translation_strategy)
            .text("dubbing_strategy", upload.options.dubbing_strategy);

        if let Some(work) = upload.target_work {
            form = form.text("target_work", work);
        }

        for file in upload.files {
            let part = Part::stream(Body::from(file.content)).file_name(file.file_name);
            form = form.part("files", part);
        }

        form
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Pipeline responded with {}: {}", status, message);
            return Err(ApiError::Server {
                status_code: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl PipelineApi for HttpPipelineApi {
    async fn submit_batch(&self, upload: BatchUpload) -> Result<SubmitReceipt, ApiError> {
        let url = self.endpoint("/api/bulk-dub");
        debug!(
            "Submitting {} file(s) and {} URL(s) to {}",
            upload.files.len(),
            upload.url_lines.len(),
            url
        );

        let response = self
            .client
            .post(&url)
            .multipart(Self::build_form(upload))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Self::decode(response).await
    }

    async fn fetch_batch_status(&self, batch_id: &str) -> Result<BatchStatus, ApiError> {
        let url = self.endpoint(&format!("/api/bulk-status/{}", batch_id));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Self::decode(response).await
    }
}
