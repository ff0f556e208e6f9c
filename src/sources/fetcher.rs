use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    config::AppConfig,
    core::error::NinaError,
    pipeline::normalizer::{decode_body, RawAlert},
};

pub const PLACEHOLDER_HEADLINE: &str = "NINA Integration erfolgreich";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Stop at the first endpoint that answers with JSON.
    FirstSuccess,
    /// Query every endpoint and concatenate what parses.
    #[default]
    Accumulate,
}

pub struct Fetcher {
    client: reqwest::Client,
    endpoints: Vec<String>,
    mode: FetchMode,
}

impl Fetcher {
    pub fn new(config: &AppConfig) -> Result<Self, NinaError> {
        Self::with_endpoints(
            config.endpoints(),
            config.fetch_mode,
            config.timeout(),
            &config.user_agent,
        )
    }

    pub fn with_endpoints(
        endpoints: Vec<String>,
        mode: FetchMode,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, NinaError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .default_headers(headers)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(4))
            .build()
            .map_err(NinaError::from)?;

        Ok(Self {
            client,
            endpoints,
            mode,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Runs the endpoint sequence. Never fails: when nothing usable comes
    /// back the result is a single placeholder record.
    pub async fn fetch(&self, now: DateTime<Utc>) -> Vec<RawAlert> {
        let mut records = Vec::new();
        let mut any_success = false;

        for (idx, url) in self.endpoints.iter().enumerate() {
            match fetch_endpoint(&self.client, url).await {
                Ok(batch) => {
                    tracing::debug!("endpoint {} ({}) gave {} records", idx, url, batch.len());
                    any_success = true;
                    records.extend(batch);
                    if self.mode == FetchMode::FirstSuccess {
                        return records;
                    }
                }
                Err(err) => {
                    tracing::warn!("endpoint {} ({}) skipped: {}", idx, url, err);
                }
            }
        }

        let exhausted = match self.mode {
            FetchMode::FirstSuccess => !any_success,
            FetchMode::Accumulate => records.is_empty(),
        };
        if exhausted {
            tracing::info!(
                "no live warnings from {} endpoints, using placeholder",
                self.endpoints.len()
            );
            return vec![placeholder_alert(now)];
        }
        records
    }
}

async fn fetch_endpoint(client: &reqwest::Client, url: &str) -> Result<Vec<RawAlert>, NinaError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    tracing::debug!("GET {} -> {}", url, status);
    if status != StatusCode::OK {
        return Err(NinaError::Status(status.as_u16()));
    }
    let text = resp.text().await?;
    let body: Value = serde_json::from_str(&text)?;
    let decoded = decode_body(body);
    tracing::debug!("{} decoded as {}", url, decoded.kind());
    Ok(decoded.into_records())
}

/// Synthetic record signalling that the panel works but no feed had data.
/// It carries no id, so its detail link points at the listing page.
pub fn placeholder_alert(now: DateTime<Utc>) -> RawAlert {
    json!({
        "sent": now.to_rfc3339(),
        "msgType": "Alert",
        "info": [{
            "headline": PLACEHOLDER_HEADLINE,
            "severity": "Minor",
            "description": "Die NINA Warnmeldungen wurden erfolgreich eingebunden. Bei aktuellen Warnungen werden diese hier angezeigt.",
            "area": [{ "areaDesc": "Karteneditor" }]
        }]
    })
}
