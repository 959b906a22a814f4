//! Management gateway client.
//!
//! The gateway fronts the cloud provider's management APIs and holds the
//! credentials. One `GatewayClient` serves as the queue probe, the
//! cluster provisioning API, and the proxy app controller.
//!
//! ```text
//! GET    /queue       → {"length": n}
//! GET    /cluster     → {"state": "Running" | "InProgress" | ...}, 404 when absent
//! PUT    /cluster     create or update
//! DELETE /cluster     begin deleting
//! GET    /app         → {"state": "Running" | "Stopped" | ...}
//! POST   /app/start
//! POST   /app/stop
//! ```

use http::{Method, StatusCode};
use serde::Deserialize;
use tracing::info;

use tidepool_core::{BoxFuture, ClusterManager, ClusterStatus, ProxyApp, WorkQueue};

use crate::client::{HttpClient, HttpError, join_url};

#[derive(Debug, Deserialize)]
struct QueueStatus {
    length: u64,
}

#[derive(Debug, Deserialize)]
struct ResourceState {
    state: String,
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: HttpClient,
    base: String,
}

impl GatewayClient {
    pub fn new(client: HttpClient, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base, path)
    }

    pub async fn queue_length(&self) -> Result<u64, HttpError> {
        let url = self.url("queue");
        let resp = self.client.get(&url).await?.error_for_status(Method::GET, &url)?;
        Ok(resp.json::<QueueStatus>(&url)?.length)
    }

    pub async fn cluster_status(&self) -> Result<ClusterStatus, HttpError> {
        let url = self.url("cluster");
        let resp = self.client.get(&url).await?;
        if resp.status == StatusCode::NOT_FOUND {
            return Ok(ClusterStatus::NotFound);
        }
        let resp = resp.error_for_status(Method::GET, &url)?;
        let state: ResourceState = resp.json(&url)?;
        Ok(ClusterStatus::from_state(&state.state))
    }

    pub async fn app_running(&self) -> Result<bool, HttpError> {
        let url = self.url("app");
        let resp = self.client.get(&url).await?.error_for_status(Method::GET, &url)?;
        let state: ResourceState = resp.json(&url)?;
        Ok(state.state.eq_ignore_ascii_case("running"))
    }

    async fn call(&self, method: Method, path: &str) -> Result<(), HttpError> {
        let url = self.url(path);
        let body = (method != Method::DELETE).then(|| b"{}".to_vec());
        self.client
            .send(method.clone(), &url, body)
            .await?
            .error_for_status(method.clone(), &url)?;
        info!(%method, %url, "gateway call accepted");
        Ok(())
    }
}

impl WorkQueue for GatewayClient {
    fn pending(&self) -> BoxFuture<'_, anyhow::Result<u64>> {
        Box::pin(async move { Ok(self.queue_length().await?) })
    }
}

impl ClusterManager for GatewayClient {
    fn status(&self) -> BoxFuture<'_, anyhow::Result<ClusterStatus>> {
        Box::pin(async move { Ok(self.cluster_status().await?) })
    }

    fn create(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move { Ok(self.call(Method::PUT, "cluster").await?) })
    }

    fn delete(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move { Ok(self.call(Method::DELETE, "cluster").await?) })
    }
}

impl ProxyApp for GatewayClient {
    fn is_running(&self) -> BoxFuture<'_, anyhow::Result<bool>> {
        Box::pin(async move { Ok(self.app_running().await?) })
    }

    fn start(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move { Ok(self.call(Method::POST, "app/start").await?) })
    }

    fn stop(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move { Ok(self.call(Method::POST, "app/stop").await?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::test_server::TestServer;

    fn gateway(server: &TestServer) -> GatewayClient {
        GatewayClient::new(HttpClient::new(Duration::from_secs(2)), server.url())
    }

    #[tokio::test]
    async fn reads_queue_length() {
        let server = TestServer::start(|_, path| match path {
            "/queue" => (200, r#"{"length": 12}"#.to_string()),
            _ => (404, String::new()),
        })
        .await;

        assert_eq!(gateway(&server).pending().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn missing_cluster_is_not_found() {
        let server = TestServer::start(|_, _| (404, r#"{"error":"ResourceNotFound"}"#.to_string())).await;
        let status = ClusterManager::status(&gateway(&server)).await.unwrap();
        assert_eq!(status, ClusterStatus::NotFound);
    }

    #[tokio::test]
    async fn cluster_states_map_to_status() {
        let server = TestServer::start(|_, _| (200, r#"{"state":"InProgress"}"#.to_string())).await;
        let status = ClusterManager::status(&gateway(&server)).await.unwrap();
        assert_eq!(status, ClusterStatus::Transitioning("InProgress".to_string()));

        let server = TestServer::start(|_, _| (200, r#"{"state":"Running"}"#.to_string())).await;
        let status = ClusterManager::status(&gateway(&server)).await.unwrap();
        assert_eq!(status, ClusterStatus::Operational);
    }

    #[tokio::test]
    async fn server_error_is_an_error() {
        let server = TestServer::start(|_, _| (500, "boom".to_string())).await;
        let gw = gateway(&server);
        assert!(ClusterManager::status(&gw).await.is_err());
        assert!(gw.is_running().await.is_err());

        let err = gw.pending().await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn app_state() {
        let server = TestServer::start(|_, _| (200, r#"{"state":"Stopped"}"#.to_string())).await;
        assert!(!gateway(&server).is_running().await.unwrap());

        let server = TestServer::start(|_, _| (200, r#"{"state":"running"}"#.to_string())).await;
        assert!(gateway(&server).is_running().await.unwrap());
    }

    #[tokio::test]
    async fn actuators_hit_expected_routes() {
        let server = TestServer::start(|_, _| (202, String::new())).await;
        let gw = gateway(&server);

        gw.create().await.unwrap();
        gw.delete().await.unwrap();
        gw.start().await.unwrap();
        gw.stop().await.unwrap();

        let calls: Vec<(Method, String)> = server
            .requests()
            .into_iter()
            .map(|r| (r.method, r.path))
            .collect();
        assert_eq!(
            calls,
            vec![
                (Method::PUT, "/cluster".to_string()),
                (Method::DELETE, "/cluster".to_string()),
                (Method::POST, "/app/start".to_string()),
                (Method::POST, "/app/stop".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn rejected_action_is_an_error() {
        let server = TestServer::start(|_, _| (409, "conflict".to_string())).await;
        let err = gateway(&server).delete().await.unwrap_err();
        assert!(err.to_string().contains("409"));
    }
}
