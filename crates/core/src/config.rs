//! Run configuration.
//!
//! Built once at startup from the environment (after loading `.env`), then
//! adjusted by command-line flags and handed to every component by reference.

use crate::scanner::{RuleConfig, RuleSet};
use crate::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 5;
pub const DEFAULT_MAX_IMAGE_SIZE_MB: f64 = 2.0;
pub const DEFAULT_LIBREOFFICE_COMMAND: &str = "soffice";
pub const DEFAULT_PDFTOPPM_COMMAND: &str = "pdftoppm";

/// Upper bound on concurrent AI requests.
pub const MAX_CONCURRENT_REQUESTS_LIMIT: usize = 256;
/// Upper bound on the per-slide dispatch stagger.
pub const MAX_REQUEST_DELAY: Duration = Duration::from_secs(600);

/// Jira connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraCredentials {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
}

/// Configuration for one run of the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    // Jira settings. Only required when tickets are really created.
    pub jira_base_url: Option<String>,
    pub jira_email: Option<String>,
    pub jira_api_token: Option<String>,
    /// Manual project override; disables rule-based resolution.
    pub project_key: Option<String>,

    // OpenAI settings
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,

    // Processing settings
    pub max_image_size_mb: f64,
    pub libreoffice_command: String,
    pub pdftoppm_command: String,
    pub max_concurrent_requests: usize,
    pub request_delay: Duration,
    pub rules_path: Option<PathBuf>,
    pub dry_run: bool,
    pub debug: bool,
}

impl ProcessingConfig {
    /// Load configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("Failed to load .env: {}", e))),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let openai_api_key = get("OPENAI_API_KEY").ok_or_else(|| {
            Error::Config("Missing required environment variables: [\"OPENAI_API_KEY\"]".into())
        })?;

        Ok(Self {
            jira_base_url: get("JIRA_BASE_URL").map(|url| url.trim_end_matches('/').to_string()),
            jira_email: get("JIRA_EMAIL"),
            jira_api_token: get("JIRA_API_TOKEN"),
            project_key: get("JIRA_PROJECT_KEY"),
            openai_api_key,
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            max_image_size_mb: parse_or(
                "MAX_IMAGE_SIZE_MB",
                get("MAX_IMAGE_SIZE_MB"),
                DEFAULT_MAX_IMAGE_SIZE_MB,
            )?,
            libreoffice_command: get("LIBREOFFICE_COMMAND")
                .unwrap_or_else(|| DEFAULT_LIBREOFFICE_COMMAND.into()),
            pdftoppm_command: get("PDFTOPPM_COMMAND")
                .unwrap_or_else(|| DEFAULT_PDFTOPPM_COMMAND.into()),
            max_concurrent_requests: parse_or(
                "MAX_CONCURRENT_REQUESTS",
                get("MAX_CONCURRENT_REQUESTS"),
                DEFAULT_MAX_CONCURRENT_REQUESTS,
            )?,
            request_delay: Duration::from_millis(parse_or(
                "REQUEST_DELAY_MS",
                get("REQUEST_DELAY_MS"),
                0u64,
            )?),
            rules_path: get("DECK2JIRA_RULES").map(PathBuf::from),
            dry_run: false,
            debug: false,
        })
    }

    /// Check settings that depend on command-line overrides.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            return Err(Error::Config(
                "Maximum concurrent requests must be at least 1".into(),
            ));
        }
        if self.max_concurrent_requests > MAX_CONCURRENT_REQUESTS_LIMIT {
            return Err(Error::Config(format!(
                "Maximum concurrent requests must be at most {}, got {}",
                MAX_CONCURRENT_REQUESTS_LIMIT, self.max_concurrent_requests
            )));
        }
        if self.request_delay > MAX_REQUEST_DELAY {
            return Err(Error::Config(format!(
                "REQUEST_DELAY_MS must be at most {}",
                MAX_REQUEST_DELAY.as_millis()
            )));
        }
        if self.max_image_size_mb.is_nan() || self.max_image_size_mb <= 0.0 {
            return Err(Error::Config("MAX_IMAGE_SIZE_MB must be positive".into()));
        }
        if !self.dry_run {
            self.jira()?;
        }
        Ok(())
    }

    /// Jira credentials, or a configuration error naming what is missing.
    pub fn jira(&self) -> Result<JiraCredentials> {
        match (&self.jira_base_url, &self.jira_email, &self.jira_api_token) {
            (Some(base_url), Some(email), Some(api_token)) => Ok(JiraCredentials {
                base_url: base_url.clone(),
                email: email.clone(),
                api_token: api_token.clone(),
            }),
            _ => {
                let missing: Vec<&str> = [
                    ("JIRA_BASE_URL", self.jira_base_url.is_none()),
                    ("JIRA_EMAIL", self.jira_email.is_none()),
                    ("JIRA_API_TOKEN", self.jira_api_token.is_none()),
                ]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| *name)
                .collect();
                Err(Error::Config(format!(
                    "Missing required environment variables: {:?}",
                    missing
                )))
            }
        }
    }

    /// Compile the configured rules file, or the built-in rules.
    pub fn load_rules(&self) -> Result<RuleSet> {
        let config = match &self.rules_path {
            Some(path) => RuleConfig::load(path)?,
            None => RuleConfig::default(),
        };
        RuleSet::compile(&config)
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: '{}' ({})", key, raw, e))),
        None => Ok(default),
    }
}
