use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::backend::http::{DEFAULT_ATS_PATH, DEFAULT_OPTIMIZE_PATH, DEFAULT_PARSE_PATH};
use crate::backend::Endpoints;
use crate::models::EntryPoint;
use crate::pipeline::PipelineSettings;
use crate::quota::{PlanTier, DEFAULT_FREE_UPLOAD_LIMIT};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub parse_path: String,
    pub ats_path: String,
    pub optimize_path: String,
    pub stage_delay: Duration,
    pub message_interval: Duration,
    pub request_timeout: Duration,
    pub free_upload_limit: u32,
    pub quota_store_path: PathBuf,
    pub plan_tier: PlanTier,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_base_url: require_env("PROCESSOR_API_BASE_URL")?,
            parse_path: env_or("PROCESSOR_PARSE_PATH", DEFAULT_PARSE_PATH.to_string())?,
            ats_path: env_or("PROCESSOR_ATS_PATH", DEFAULT_ATS_PATH.to_string())?,
            optimize_path: env_or("PROCESSOR_OPTIMIZE_PATH", DEFAULT_OPTIMIZE_PATH.to_string())?,
            stage_delay: Duration::from_millis(env_or("STAGE_DELAY_MS", 2000)?),
            message_interval: Duration::from_millis(env_or("MESSAGE_INTERVAL_MS", 2000)?),
            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT_SECS", 120)?),
            free_upload_limit: env_or("FREE_UPLOAD_LIMIT", DEFAULT_FREE_UPLOAD_LIMIT)?,
            quota_store_path: env_or(
                "QUOTA_STORE_PATH",
                PathBuf::from(".resume-processor/store.json"),
            )?,
            plan_tier: env_or("PLAN_TIER", PlanTier::Free)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::from_base(
            &self.api_base_url,
            &self.parse_path,
            &self.ats_path,
            &self.optimize_path,
        )
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            stage_delay: self.stage_delay,
            message_interval: self.message_interval,
            entry_point: EntryPoint::default(),
            ..PipelineSettings::default()
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Parses `key` when set, otherwise returns `default`.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}
