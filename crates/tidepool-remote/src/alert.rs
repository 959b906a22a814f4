//! Webhook alert sink.
//!
//! Posts `{"alert": {"error": "..."}}` to the configured URL from a
//! spawned task. `notify` returns immediately; delivery failures are
//! logged and dropped.

use tracing::{debug, warn};

use tidepool_core::{Alert, AlertSink};

use crate::client::HttpClient;

#[derive(Debug, Clone)]
pub struct HttpAlertSink {
    client: HttpClient,
    url: String,
}

impl HttpAlertSink {
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AlertSink for HttpAlertSink {
    fn notify(&self, alert: Alert) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(error = %alert.error(), "no runtime to deliver alert, dropping");
            return;
        };

        let client = self.client.clone();
        let url = self.url.clone();
        handle.spawn(async move {
            match client.post_json(&url, &alert).await {
                Ok(resp) if resp.status.is_success() => {
                    debug!(%url, "alert delivered");
                }
                Ok(resp) => {
                    debug!(%url, status = %resp.status, "alert endpoint rejected alert");
                }
                Err(e) => {
                    debug!(%url, error = %e, "alert delivery failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use http::Method;

    use crate::test_server::TestServer;

    #[tokio::test]
    async fn posts_alert_payload() {
        let server = TestServer::start(|_, _| (202, String::new())).await;
        let sink = HttpAlertSink::new(
            HttpClient::new(Duration::from_secs(2)),
            format!("{}/alerts", server.url()),
        );

        sink.notify(Alert::new("cluster create failed: quota exceeded"));

        let requests = server.wait_for(1).await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].path, "/alerts");

        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "alert": { "error": "cluster create failed: quota exceeded" } })
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_does_not_block() {
        let sink = HttpAlertSink::new(
            HttpClient::new(Duration::from_millis(200)),
            "http://127.0.0.1:1/alerts",
        );
        // Returns straight away even though delivery will fail.
        sink.notify(Alert::new("boom"));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn outside_runtime_is_dropped() {
        let sink = HttpAlertSink::new(
            HttpClient::new(Duration::from_millis(200)),
            "http://127.0.0.1:1/alerts",
        );
        sink.notify(Alert::new("no runtime"));
        assert_eq!(sink.url(), "http://127.0.0.1:1/alerts");
    }
}
