//! services/api/src/adapters/orchestrator.rs
//!
//! This module contains the adapter for the external orchestration service
//! (news audio, initiative generation, advice, manuscripts). It implements the
//! `Orchestrator` port from the `core` crate over plain JSON POSTs.

use async_trait::async_trait;
use companion_core::ports::{Orchestrator, PortError, PortResult};
use serde_json::{json, Value};
use std::time::Duration;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct HttpOrchestrator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrchestrator {
    /// Creates a new `HttpOrchestrator` rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn post(&self, endpoint: &str, body: Value) -> PortResult<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Upstream(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(PortError::Upstream(format!(
                "{} answered {}",
                url,
                response.status()
            )));
        }
        Ok(response)
    }
}

//=========================================================================================
// `Orchestrator` Trait Implementation
//=========================================================================================

#[async_trait]
impl Orchestrator for HttpOrchestrator {
    async fn generate_news(&self, user_id: &str) -> PortResult<Value> {
        let response = self.post("news", json!({ "user_id": user_id })).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| PortError::Upstream(format!("news reply was not JSON: {}", e)))
    }

    async fn create_initiatives(&self, user_id: &str, career_goals: &str) -> PortResult<()> {
        self.post(
            "create-initiatives",
            json!({ "userId": user_id, "careerGoals": career_goals }),
        )
        .await?;
        Ok(())
    }

    async fn create_advice(&self, user_id: &str) -> PortResult<()> {
        self.post("advice", json!({ "userId": user_id })).await?;
        Ok(())
    }

    async fn create_manuscript(&self, user_id: &str) -> PortResult<()> {
        self.post("manuscript", json!({ "userId": user_id })).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator(server: &mockito::Server) -> HttpOrchestrator {
        HttpOrchestrator::new(server.url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn news_reply_is_relayed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/news")
            .match_body(mockito::Matcher::Json(json!({ "user_id": "u1" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"url":"https://storage.example/u1/news.mp3"}"#)
            .create_async()
            .await;

        let reply = orchestrator(&server).generate_news("u1").await.unwrap();
        assert_eq!(reply["url"], json!("https://storage.example/u1/news.mp3"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/advice")
            .match_body(mockito::Matcher::Json(json!({ "userId": "u1" })))
            .with_status(503)
            .with_body("busy")
            .create_async()
            .await;

        let result = orchestrator(&server).create_advice("u1").await;
        assert!(matches!(result, Err(PortError::Upstream(msg)) if msg.contains("503")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn initiatives_request_carries_the_goals() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/create-initiatives")
            .match_body(mockito::Matcher::Json(
                json!({ "userId": "u1", "careerGoals": "SRE: on-call" }),
            ))
            .with_status(200)
            .create_async()
            .await;

        orchestrator(&server)
            .create_initiatives("u1", "SRE: on-call")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_json_news_reply_is_an_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/news")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let result = orchestrator(&server).generate_news("u1").await;
        assert!(matches!(result, Err(PortError::Upstream(_))));
    }
}
