//! Grade delivery
//!
//! The grader's responsibility ends at handing the final percentage to a
//! sink: the grading service over HTTP, or the log when none is configured.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::GraderConfig;
use crate::error::GradeError;
use crate::report::Report;

/// Receiver of a finished grade
#[async_trait]
pub trait GradeSink: Send + Sync {
    /// Deliver `report.score.final_percent`. `Ok(false)` means the receiver
    /// rejected the grade.
    async fn deliver(&self, report: &Report) -> Result<bool, GradeError>;
}

/// Sink that records the grade in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogGradeSink;

#[async_trait]
impl GradeSink for LogGradeSink {
    async fn deliver(&self, report: &Report) -> Result<bool, GradeError> {
        let grade = report.score.final_percent;
        if !grade.is_finite() {
            return Ok(false);
        }
        info!(
            "Grade delivered: assignment={}, grade={:.3}%",
            report.assignment, grade
        );
        Ok(true)
    }
}

/// Acknowledgement returned by the grading service, `code == 1` on success
#[derive(Debug, Deserialize)]
struct GradeAck {
    code: i64,
}

/// Sink that sends the grade to the grading service:
/// `GET <url>&grade=<percent>` (or `?grade=` when the url has no query)
#[derive(Debug, Clone)]
pub struct HttpGradeSink {
    client: reqwest::Client,
    url: String,
    attempts: u32,
    retry_delay: Duration,
}

impl HttpGradeSink {
    pub fn new(url: impl Into<String>, attempts: u32, timeout: Duration) -> Result<Self, GradeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GradeError::Delivery(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            attempts: attempts.max(1),
            retry_delay: Duration::from_millis(500),
        })
    }

    /// HTTP sink when `autograde_url` is configured
    pub fn from_config(config: &GraderConfig) -> Result<Option<Self>, GradeError> {
        config
            .autograde_url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.delivery_attempts, config.delivery_timeout))
            .transpose()
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn send(&self, grade: f64) -> Result<String, reqwest::Error> {
        self.client
            .get(&self.url)
            .query(&[("grade", grade.to_string())])
            .send()
            .await?
            .text()
            .await
    }
}

#[async_trait]
impl GradeSink for HttpGradeSink {
    async fn deliver(&self, report: &Report) -> Result<bool, GradeError> {
        let grade = report.score.final_percent;
        if !grade.is_finite() {
            return Ok(false);
        }

        let mut last_error = None;
        for attempt in 1..=self.attempts {
            match self.send(grade).await {
                Ok(body) => {
                    let ack: GradeAck = serde_json::from_str(&body).map_err(|e| {
                        GradeError::Delivery(format!(
                            "unexpected response {:?}: {}",
                            body.chars().take(200).collect::<String>(),
                            e
                        ))
                    })?;
                    info!(
                        "Grade sent: assignment={}, grade={:.3}%, code={}",
                        report.assignment, grade, ack.code
                    );
                    return Ok(ack.code == 1);
                }
                Err(e) => {
                    warn!(
                        "Grade delivery attempt {}/{} failed: {}",
                        attempt, self.attempts, e
                    );
                    last_error = Some(e);
                    if attempt < self.attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(GradeError::Delivery(format!(
            "gave up after {} attempt(s): {}",
            self.attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}
