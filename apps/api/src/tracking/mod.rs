//! Hosted web analytics: page views, custom events and a traffic summary.
//!
//! Submission uses the measurement-protocol collect endpoint; the summary is a
//! report query against the same property. Both are fire-and-report: nothing
//! here retries, and the summary degrades to `None` on any failure.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod classify;
pub mod handlers;

use crate::config::AnalyticsSettings;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const SUMMARY_METRICS: &[&str] = &["screenPageViews", "activeUsers", "newUsers", "eventCount"];

/// Period bounds accepted by the admin traffic picker.
pub const DEFAULT_SUMMARY_DAYS: u32 = 30;
pub const MAX_SUMMARY_DAYS: u32 = 365;

/// Clamps a requested summary period to `1..=MAX_SUMMARY_DAYS`.
pub fn summary_days(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_SUMMARY_DAYS)
        .clamp(1, MAX_SUMMARY_DAYS)
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Analytics API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Analytics is not configured")]
    Disabled,
}

/// One hit as the collect endpoint expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackEvent {
    pub name: String,
    pub params: BTreeMap<String, String>,
}

impl TrackEvent {
    pub fn page_view(location: &str, title: Option<&str>) -> Self {
        let mut params = BTreeMap::new();
        params.insert("page_location".to_string(), location.to_string());
        if let Some(title) = title {
            params.insert("page_title".to_string(), title.to_string());
        }
        Self {
            name: "page_view".to_string(),
            params,
        }
    }

    /// A `(category, action, label?)` event; the action becomes the event name.
    pub fn custom(category: &str, action: &str, label: Option<&str>) -> Self {
        let mut params = BTreeMap::new();
        params.insert("event_category".to_string(), category.to_string());
        if let Some(label) = label {
            params.insert("event_label".to_string(), label.to_string());
        }
        Self {
            name: action.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrafficSummary {
    pub page_views: u64,
    pub active_users: u64,
    pub new_users: u64,
    pub events: u64,
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn send(&self, client_id: &str, events: Vec<TrackEvent>) -> Result<(), AnalyticsError>;

    /// Totals for the last `days` days. `None` when the property cannot be queried.
    async fn summary(&self, days: u32) -> Option<TrafficSummary>;
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP implementation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CollectBody<'a> {
    client_id: &'a str,
    events: Vec<TrackEvent>,
}

#[derive(Deserialize)]
struct ReportResponse {
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRow {
    #[serde(default)]
    metric_values: Vec<MetricValue>,
}

#[derive(Deserialize)]
struct MetricValue {
    value: String,
}

#[derive(Clone)]
pub struct HostedAnalytics {
    client: Client,
    settings: AnalyticsSettings,
}

impl HostedAnalytics {
    pub fn new(settings: AnalyticsSettings) -> Result<Self, AnalyticsError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            settings,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.endpoint.trim_end_matches('/'), path)
    }

    async fn query_summary(&self, days: u32) -> Result<TrafficSummary, AnalyticsError> {
        let body = serde_json::json!({
            "dateRanges": [{ "startDate": format!("{days}daysAgo"), "endDate": "today" }],
            "metrics": SUMMARY_METRICS.iter().map(|m| serde_json::json!({ "name": m })).collect::<Vec<_>>(),
        });
        let response = self
            .client
            .post(self.endpoint(&format!(
                "/v1beta/properties/{}:runReport",
                self.settings.measurement_id
            )))
            .bearer_auth(&self.settings.api_secret)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let report: ReportResponse = response.json().await?;
        Ok(summary_from_values(
            report
                .rows
                .first()
                .map(|row| row.metric_values.as_slice())
                .unwrap_or_default(),
        ))
    }
}

/// Metric values arrive as strings in `SUMMARY_METRICS` order; unparseable ones count as 0.
fn summary_from_values(values: &[MetricValue]) -> TrafficSummary {
    let at = |i: usize| {
        values
            .get(i)
            .and_then(|v| v.value.parse::<u64>().ok())
            .unwrap_or(0)
    };
    TrafficSummary {
        page_views: at(0),
        active_users: at(1),
        new_users: at(2),
        events: at(3),
    }
}

#[async_trait]
impl AnalyticsSink for HostedAnalytics {
    async fn send(&self, client_id: &str, events: Vec<TrackEvent>) -> Result<(), AnalyticsError> {
        let count = events.len();
        let response = self
            .client
            .post(self.endpoint("/mp/collect"))
            .query(&[
                ("measurement_id", self.settings.measurement_id.as_str()),
                ("api_secret", self.settings.api_secret.as_str()),
            ])
            .json(&CollectBody { client_id, events })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::Api {
                status: status.as_u16(),
                message,
            });
        }
        debug!("Sent {count} analytics events for client {client_id}");
        Ok(())
    }

    async fn summary(&self, days: u32) -> Option<TrafficSummary> {
        match self.query_summary(days).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Traffic summary unavailable: {e}");
                None
            }
        }
    }
}

/// Stand-in used when no analytics property is configured.
pub struct DisabledAnalytics;

#[async_trait]
impl AnalyticsSink for DisabledAnalytics {
    async fn send(&self, _client_id: &str, _events: Vec<TrackEvent>) -> Result<(), AnalyticsError> {
        Err(AnalyticsError::Disabled)
    }

    async fn summary(&self, _days: u32) -> Option<TrafficSummary> {
        None
    }
}
