use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::ProcessingBackend;
use crate::errors::PipelineError;
use crate::models::{EntryPoint, OptimizeRequest, ResumeUpload};
use crate::pipeline::stages::StageId;

pub const DEFAULT_PARSE_PATH: &str = "/api/gemini-parse-resume";
pub const DEFAULT_ATS_PATH: &str = "/api/ats-checker";
pub const DEFAULT_OPTIMIZE_PATH: &str = "/api/optimize-resume";

/// Absolute URLs of the three stage services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub parse: String,
    pub ats_check: String,
    pub optimize: String,
}

impl Endpoints {
    /// Joins each path onto `base_url`, tolerating stray slashes on either side.
    pub fn from_base(base_url: &str, parse: &str, ats_check: &str, optimize: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let join = |path: &str| format!("{base}/{}", path.trim_start_matches('/'));
        Self {
            parse: join(parse),
            ats_check: join(ats_check),
            optimize: join(optimize),
        }
    }

    /// The default paths under `base_url`.
    pub fn with_defaults(base_url: &str) -> Self {
        Self::from_base(
            base_url,
            DEFAULT_PARSE_PATH,
            DEFAULT_ATS_PATH,
            DEFAULT_OPTIMIZE_PATH,
        )
    }

    fn url(&self, stage: StageId) -> &str {
        match stage {
            StageId::Parsing => &self.parse,
            StageId::AtsCheck => &self.ats_check,
            StageId::Optimization => &self.optimize,
        }
    }
}

/// Talks to the stage services over HTTP.
///
/// No retries here: a failed request is reported once and the user decides
/// whether to rerun the pipeline.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    endpoints: Endpoints,
}

impl HttpBackend {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn upload_form(stage: StageId, upload: &ResumeUpload) -> Result<Form, PipelineError> {
        let file = Part::bytes(upload.bytes.to_vec())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|source| PipelineError::Http { stage, source })?;
        Ok(Form::new().part("file", file))
    }

    /// Sends `request` and decodes the JSON body. Non-2xx responses become the
    /// stage's failure carrying the raw response text.
    async fn send(&self, stage: StageId, request: RequestBuilder) -> Result<Value, PipelineError> {
        let response = request
            .send()
            .await
            .map_err(|source| PipelineError::Http { stage, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("{stage} endpoint returned {status}: {body}");
            return Err(PipelineError::rejected(
                stage,
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
                body,
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|source| PipelineError::Http { stage, source })?;
        debug!("{stage} endpoint returned {} bytes", body.len());

        serde_json::from_str(&body).map_err(|source| PipelineError::Decode { stage, source })
    }
}

#[async_trait]
impl ProcessingBackend for HttpBackend {
    async fn parse_resume(
        &self,
        upload: &ResumeUpload,
        entry: &EntryPoint,
    ) -> Result<Value, PipelineError> {
        let stage = StageId::Parsing;
        let form = Self::upload_form(stage, upload)?
            .text("entryPoint", entry.entry_point.clone())
            .text("pageUrl", entry.page_url.clone());
        let request = self.client.post(self.endpoints.url(stage)).multipart(form);
        self.send(stage, request).await
    }

    async fn check_ats(
        &self,
        upload: &ResumeUpload,
        entry: &EntryPoint,
    ) -> Result<Value, PipelineError> {
        let stage = StageId::AtsCheck;
        let form = Self::upload_form(stage, upload)?
            .text("bypassCache", "true")
            .text("entryPoint", entry.entry_point.clone())
            .text("pageUrl", entry.page_url.clone());
        let request = self.client.post(self.endpoints.url(stage)).multipart(form);
        self.send(stage, request).await
    }

    async fn optimize(&self, request: &OptimizeRequest<'_>) -> Result<Value, PipelineError> {
        let stage = StageId::Optimization;
        let request = self.client.post(self.endpoints.url(stage)).json(request);
        self.send(stage, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_join_without_double_slash() {
        let endpoints = Endpoints::with_defaults("https://example.test/");
        assert_eq!(
            endpoints.parse,
            "https://example.test/api/gemini-parse-resume"
        );
        assert_eq!(endpoints.ats_check, "https://example.test/api/ats-checker");
        assert_eq!(
            endpoints.optimize,
            "https://example.test/api/optimize-resume"
        );
    }

    #[test]
    fn test_endpoints_custom_paths() {
        let endpoints = Endpoints::from_base("http://localhost:3000", "parse", "/ats", "opt/");
        assert_eq!(endpoints.url(StageId::Parsing), "http://localhost:3000/parse");
        assert_eq!(endpoints.url(StageId::AtsCheck), "http://localhost:3000/ats");
        assert_eq!(endpoints.url(StageId::Optimization), "http://localhost:3000/opt/");
    }
}
