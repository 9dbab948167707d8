use crate::models::{
    AnalysisRequest, BigOReport, ComplexityReport, HistoryEntry, OptimizationReport,
};
use crate::utils::snippet;
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error};

pub const HISTORY_CAPACITY: usize = 5;

/// HTTP client for a running complexity-ai service.
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        // Upstream retries can take a while; leave room beyond the server's own timeout.
        let http = Client::builder().timeout(Duration::from_secs(300)).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn calculate(&self, code: &str, language: &str) -> Result<ComplexityReport> {
        self.post("/api/calculate", code, language).await
    }

    pub async fn big_o(&self, code: &str, language: &str) -> Result<BigOReport> {
        self.post("/api/bigO-analysis", code, language).await
    }

    pub async fn optimize(&self, code: &str, language: &str) -> Result<OptimizationReport> {
        self.post("/api/optimize", code, language).await
    }

    pub async fn ping(&self) -> Result<Value> {
        let resp = self
            .http
            .get(format!("{}/api/test", self.base_url))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("service unavailable: {}", resp.status()));
        }
        Ok(resp.json().await?)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, code: &str, language: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let body = AnalysisRequest {
            code: Some(code.to_string()),
            language: Some(language.to_string()),
        };
        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let payload: Value = resp.json().await.unwrap_or_default();
            let message = payload["error"].as_str().unwrap_or("request failed");
            error!("{} returned {}: {}", path, status, payload);
            return Err(match payload["details"].as_str() {
                Some(details) => anyhow!("{} ({}): {}", message, status, details),
                None => anyhow!("{} ({})", message, status),
            });
        }
        Ok(resp.json().await?)
    }
}

/// Most recent general analyses, newest first.
#[derive(Debug, Default)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: &ComplexityReport, code: &str) {
        self.entries.push_front(HistoryEntry {
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            complexity: report.complexity,
            big_o: report.big_o.clone(),
            code_snippet: snippet(code),
        });
        self.entries.truncate(HISTORY_CAPACITY);
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
