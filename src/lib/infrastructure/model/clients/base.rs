//! Base HTTP client with shared logic

use crate::infrastructure::model::types::ModelError;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Bearer-authenticated JSON poster for one endpoint
#[derive(Clone)]
pub struct HttpClientBase {
    pub endpoint: String,
    pub api_key: String,
    pub http: Client,
}

impl HttpClientBase {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            endpoint,
            api_key,
            http: Client::new(),
        }
    }

    /// Post JSON and decode the JSON response
    pub async fn post_with_bearer<Req, Res>(
        &self,
        body: &Req,
        timeout: Duration,
    ) -> Result<Res, ModelError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        self.send(body, Some(timeout))
            .await?
            .json()
            .await
            .map_err(|e| ModelError::network(&self.endpoint, e))
    }

    /// Post JSON and hand back the response for incremental reading
    pub async fn open_stream<Req>(&self, body: &Req) -> Result<Response, ModelError>
    where
        Req: Serialize,
    {
        self.send(body, None).await
    }

    async fn send<Req>(&self, body: &Req, timeout: Option<Duration>) -> Result<Response, ModelError>
    where
        Req: Serialize,
    {
        let mut request = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::network(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                endpoint: self.endpoint.clone(),
                status,
                body,
            });
        }
        Ok(response)
    }
}
