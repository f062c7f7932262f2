//! Thin HTTP client for the daemon API.

use std::sync::OnceLock;

use anyhow::{Context, bail};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// reqwest's webpki-roots TLS backend needs a process-wide rustls crypto
/// provider before the first client is built.
fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        // Another crate may have installed one first; that is fine.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

pub struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    pub fn new(base: &str) -> Self {
        install_rustls_provider();
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base, path)
    }

    async fn handle<T: DeserializeOwned>(&self, response: reqwest::Response) -> anyhow::Result<T> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("daemon returned a non-JSON response")?;
        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            bail!("{} ({})", message, status);
        }
        Ok(serde_json::from_value(body)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .context("failed to reach the daemon")?;
        self.handle(response).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Value>,
    ) -> anyhow::Result<T> {
        let mut request = self.http.post(self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.context("failed to reach the daemon")?;
        self.handle(response).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: Value) -> anyhow::Result<T> {
        let response = self
            .http
            .put(self.url(path))
            .json(&body)
            .send()
            .await
            .context("failed to reach the daemon")?;
        self.handle(response).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let response = self
            .http
            .delete(self.url(path))
            .send()
            .await
            .context("failed to reach the daemon")?;
        self.handle(response).await
    }
}
