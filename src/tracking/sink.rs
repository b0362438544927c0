use reqwest::header::USER_AGENT;
use std::time::Duration;

use super::error::SinkError;
use super::types::TrackedRecord;
use crate::BoxFuture;

/// Destination for flushed batches of committed fixes.
pub trait FixSink: Send + Sync {
    fn write_batch<'a>(&'a self, batch: &'a [TrackedRecord]) -> BoxFuture<'a, Result<(), SinkError>>;
}

/// Posts each batch as a JSON array.
pub struct HttpFixSink {
    url: String,
    user_agent: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpFixSink {
    pub fn new(url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: user_agent.into(),
            timeout: Duration::from_secs(10),
            http: reqwest::Client::new(),
        }
    }

    /// Bounds each POST, connect included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post(&self, batch: &[TrackedRecord]) -> Result<(), SinkError> {
        let response = self
            .http
            .post(&self.url)
            .header(USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .json(batch)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }
        log::info!("Stored {} tracked fixes", batch.len());
        Ok(())
    }
}

impl FixSink for HttpFixSink {
    fn write_batch<'a>(&'a self, batch: &'a [TrackedRecord]) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(self.post(batch))
    }
}

/// Writes batches to the log instead of a remote store.
#[derive(Debug, Default)]
pub struct LogSink;

impl FixSink for LogSink {
    fn write_batch<'a>(&'a self, batch: &'a [TrackedRecord]) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async move {
            for record in batch {
                log::info!(
                    "{} at {:.6},{:.6} (±{:.0} m) {}",
                    record.employee_id,
                    record.lat,
                    record.lon,
                    record.accuracy,
                    record.recorded_at.to_rfc3339()
                );
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use chrono::Utc;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn record() -> TrackedRecord {
        TrackedRecord {
            employee_id: "emp-1".into(),
            lat: 40.7,
            lon: -74.0,
            accuracy: 8.0,
            heading: Some(90.0),
            speed: None,
            recorded_at: Utc::now(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn posts_batch_as_json_array() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let store = received.clone();
        let router = Router::new().route(
            "/tracking",
            post(move |Json(body): Json<Value>| {
                let store = store.clone();
                async move {
                    store.lock().unwrap().push(body);
                    StatusCode::CREATED
                }
            }),
        );
        let base = spawn_stub(router).await;
        let sink = HttpFixSink::new(format!("{}/tracking", base), "test-agent");

        sink.write_batch(&[record(), record()]).await.unwrap();

        let received = received.lock().unwrap();
        let rows = received[0].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["employee_id"], "emp-1");
        assert_eq!(rows[0]["is_active"], true);
    }

    #[tokio::test]
    async fn rejected_batch_reports_status() {
        let router = Router::new().route(
            "/tracking",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = spawn_stub(router).await;
        let sink = HttpFixSink::new(format!("{}/tracking", base), "test-agent");

        let err = sink.write_batch(&[record()]).await.unwrap_err();
        assert!(matches!(err, SinkError::Status(503)));
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let router = Router::new().route(
            "/tracking",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::CREATED
            }),
        );
        let base = spawn_stub(router).await;
        let sink = HttpFixSink::new(format!("{}/tracking", base), "test-agent")
            .with_timeout(Duration::from_millis(100));

        let err = sink.write_batch(&[record()]).await.unwrap_err();
        assert!(matches!(err, SinkError::Http(ref e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn log_sink_accepts_anything() {
        LogSink.write_batch(&[record()]).await.unwrap();
        LogSink.write_batch(&[]).await.unwrap();
    }
}
