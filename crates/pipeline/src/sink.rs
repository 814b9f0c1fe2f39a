//! Ticket creation.
//!
//! The pipeline talks to a `TicketSink` and never knows whether it is
//! creating real Jira issues or recording what it would have created.

use async_trait::async_trait;
use deck_core::adf::to_adf;
use deck_core::{Error, JiraCredentials, ProcessingConfig, Result, SlideAnalysis};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Request timeout for Jira calls.
pub const JIRA_TIMEOUT: Duration = Duration::from_secs(30);

/// Jira rejects summaries longer than this.
pub const MAX_SUMMARY_CHARS: usize = 200;

/// Everything needed to file one ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRequest {
    pub project_key: String,
    pub analysis: SlideAnalysis,
    /// Slide image to attach after creation.
    pub attachment: Option<PathBuf>,
}

impl TicketRequest {
    /// Labels sent with the ticket: the analysis labels plus `slide-N`.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.analysis.labels.iter().cloned().collect();
        labels.push(format!("slide-{}", self.analysis.slide_index));
        labels
    }

    /// Title cut to the tracker's summary limit.
    pub fn summary(&self) -> String {
        self.analysis.title.chars().take(MAX_SUMMARY_CHARS).collect()
    }
}

/// Creates tickets and returns their identifiers.
#[async_trait]
pub trait TicketSink: Send + Sync {
    async fn create_ticket(&self, request: &TicketRequest) -> Result<String>;

    /// Whether tickets are only recorded, never filed.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Pick the sink for this run: recording in dry-run mode, Jira otherwise.
pub fn build_sink(config: &ProcessingConfig) -> Result<Arc<dyn TicketSink>> {
    if config.dry_run {
        log::info!("DRY RUN MODE - No issues will be created");
        return Ok(Arc::new(RecordingSink::new()));
    }
    Ok(Arc::new(JiraSink::new(config.jira()?)?))
}

/// Sink backed by the Jira Cloud REST API (v3).
#[derive(Debug, Clone)]
pub struct JiraSink {
    client: reqwest::Client,
    credentials: JiraCredentials,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

impl JiraSink {
    pub fn new(credentials: JiraCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(JIRA_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            credentials,
        })
    }

    /// Issue creation payload.
    pub fn payload(request: &TicketRequest) -> Value {
        json!({
            "fields": {
                "project": { "key": request.project_key },
                "issuetype": { "name": request.analysis.issue_type.to_string() },
                "summary": request.summary(),
                "description": to_adf(&request.analysis.description),
                "labels": request.labels(),
            }
        })
    }

    /// Attach the slide image to an existing issue. Failures only warn.
    async fn attach_image(&self, issue_key: &str, image: &std::path::Path) {
        if let Err(e) = self.try_attach_image(issue_key, image).await {
            log::warn!("Failed to attach slide image to {}: {}", issue_key, e);
        }
    }

    async fn try_attach_image(&self, issue_key: &str, image: &std::path::Path) -> Result<()> {
        let bytes = tokio::fs::read(image).await?;
        let filename = image
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("slide.jpg")
            .to_string();

        let part = Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str("image/jpeg")
            .map_err(|e| Error::Ticket(e.to_string()))?;
        let form = Form::new().part("file", part);

        let url = format!(
            "{}/rest/api/3/issue/{}/attachments",
            self.credentials.base_url, issue_key
        );
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.email, Some(&self.credentials.api_token))
            .header("X-Atlassian-Token", "no-check")
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Ticket(format!("Failed to send request to {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
            return Err(Error::Ticket(format!("status {}: {}", status, body)));
        }

        log::info!("Attached slide image {} to {}", filename, issue_key);
        Ok(())
    }
}

#[async_trait]
impl TicketSink for JiraSink {
    async fn create_ticket(&self, request: &TicketRequest) -> Result<String> {
        let url = format!("{}/rest/api/3/issue", self.credentials.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.email, Some(&self.credentials.api_token))
            .json(&Self::payload(request))
            .send()
            .await
            .map_err(|e| Error::Ticket(format!("Failed to send request to {}: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Ticket(format!("Failed to read response from {}: {}", url, e)))?;
        if !status.is_success() {
            return Err(Error::Ticket(format!(
                "Jira returned {} for slide {}: {}",
                status, request.analysis.slide_index, body
            )));
        }

        let created: CreatedIssue = serde_json::from_str(&body)
            .map_err(|e| Error::Ticket(format!("Unexpected response body: {}", e)))?;
        log::info!(
            "Created Jira issue {} for slide {}",
            created.key,
            request.analysis.slide_index
        );

        if let Some(image) = &request.attachment {
            self.attach_image(&created.key, image).await;
        }

        Ok(created.key)
    }
}

/// Dry-run sink: records requests and hands back placeholder ids.
#[derive(Debug, Default)]
pub struct RecordingSink {
    requests: Mutex<Vec<TicketRequest>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder id reported for a would-be ticket.
    pub fn placeholder(request: &TicketRequest) -> String {
        format!(
            "DRY-RUN-{}-{}",
            request.project_key, request.analysis.slide_index
        )
    }

    /// Requests seen so far, in call order.
    pub fn recorded(&self) -> Vec<TicketRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl TicketSink for RecordingSink {
    async fn create_ticket(&self, request: &TicketRequest) -> Result<String> {
        log::info!(
            "Would create {} in {}: {}",
            request.analysis.issue_type,
            request.project_key,
            request.summary()
        );
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        Ok(Self::placeholder(request))
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
