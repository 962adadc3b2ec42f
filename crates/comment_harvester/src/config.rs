//! Run configuration: a RON file with defaults for every field, then CLI
//! overrides on top.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use comment_engine::{
    delay_from_secs, FetchSettings, HarvestSettings, RateSettings, DEFAULT_ENDPOINT,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub endpoint: String,
    /// Delimited file with one content id per row in the first column.
    pub ids_path: PathBuf,
    pub ids_have_header: bool,
    /// JSON Lines store; created on first write.
    pub output_path: PathBuf,
    pub requests_per_minute: u32,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub workers: usize,
    pub cap: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_response_bytes: u64,
    pub cursor_param: String,
    pub extra_query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub cookie: Option<String>,
    pub xsrf_token: Option<String>,
}

impl Default for FileConfig {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        let harvest = HarvestSettings::default();
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            ids_path: PathBuf::from("content_ids.csv"),
            ids_have_header: true,
            output_path: PathBuf::from("output/comments.jsonl"),
            requests_per_minute: harvest.rate.requests_per_minute,
            min_delay_secs: harvest.rate.min_delay.as_secs_f64(),
            max_delay_secs: harvest.rate.max_delay.as_secs_f64(),
            workers: harvest.workers,
            cap: harvest.cap,
            connect_timeout_secs: fetch.connect_timeout.as_secs(),
            request_timeout_secs: fetch.request_timeout.as_secs(),
            max_response_bytes: fetch.max_bytes,
            cursor_param: fetch.cursor_param,
            extra_query: fetch.extra_query,
            headers: fetch.headers,
            cookie: None,
            xsrf_token: None,
        }
    }
}

/// Flags that take precedence over the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Content id list (first column of a comma-separated file).
    #[arg(long)]
    pub ids: Option<PathBuf>,

    /// The id list has no header row.
    #[arg(long)]
    pub no_header: bool,

    /// JSON Lines file the comments are appended to.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Requests per minute across all workers.
    #[arg(long)]
    pub rpm: Option<u32>,

    /// Lower bound of the pause between two pages, in seconds.
    #[arg(long)]
    pub min_delay: Option<f64>,

    /// Upper bound of the pause between two pages, in seconds.
    #[arg(long)]
    pub max_delay: Option<f64>,

    /// Content ids harvested concurrently.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Maximum comments kept per content id.
    #[arg(long)]
    pub cap: Option<usize>,

    /// Session cookie sent with every request.
    #[arg(long, env = "HARVEST_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        ron::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(ids) = &overrides.ids {
            self.ids_path = ids.clone();
        }
        if overrides.no_header {
            self.ids_have_header = false;
        }
        if let Some(output) = &overrides.output {
            self.output_path = output.clone();
        }
        if let Some(rpm) = overrides.rpm {
            self.requests_per_minute = rpm;
        }
        if let Some(min) = overrides.min_delay {
            self.min_delay_secs = min;
        }
        if let Some(max) = overrides.max_delay {
            self.max_delay_secs = max;
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        if let Some(cap) = overrides.cap {
            self.cap = cap;
        }
        if let Some(cookie) = &overrides.cookie {
            self.cookie = Some(cookie.clone());
        }
    }

    /// Request settings; cookie and XSRF token become headers.
    pub fn fetch_settings(&self) -> FetchSettings {
        let mut headers = self.headers.clone();
        if let Some(cookie) = self.cookie.as_deref().filter(|c| !c.trim().is_empty()) {
            headers.push(("Cookie".to_string(), cookie.trim().to_string()));
        }
        if let Some(token) = self.xsrf_token.as_deref().filter(|t| !t.trim().is_empty()) {
            headers.push(("X-XSRF-TOKEN".to_string(), token.trim().to_string()));
        }
        FetchSettings {
            endpoint: self.endpoint.clone(),
            cursor_param: self.cursor_param.clone(),
            extra_query: self.extra_query.clone(),
            headers,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_bytes: self.max_response_bytes,
        }
    }

    /// Out-of-range values are clamped by the engine.
    pub fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            rate: RateSettings {
                requests_per_minute: self.requests_per_minute,
                min_delay: seconds(self.min_delay_secs),
                max_delay: seconds(self.max_delay_secs),
            },
            workers: self.workers,
            cap: self.cap,
        }
    }
}

fn seconds(secs: f64) -> Duration {
    delay_from_secs(secs).unwrap_or(Duration::ZERO)
}
