// src/session.rs
use crate::error::{Result, SubhiveError};
use crate::types::Config;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Shared HTTP client plus per-source rate limiters. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    pub client: Client,
    rate_limiters: Arc<HashMap<String, Arc<DefaultDirectRateLimiter>>>,
}

impl Session {
    pub fn new(config: &Config) -> Result<Self> {
        let mut client_builder = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| SubhiveError::Config(format!("Invalid proxy URL: {}", e)))?;
            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder
            .build()
            .map_err(|e| SubhiveError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let rate_limiters = config
            .rate_limits
            .iter()
            .filter_map(|(source, limit)| {
                let per_second = NonZeroU32::new((*limit)?)?;
                let quota = Quota::per_second(per_second).allow_burst(NonZeroU32::MIN);
                Some((source.clone(), Arc::new(RateLimiter::direct(quota))))
            })
            .collect();

        Ok(Session {
            client,
            rate_limiters: Arc::new(rate_limiters),
        })
    }

    pub async fn wait_for_rate_limit(&self, source: &str) {
        if let Some(limiter) = self.rate_limiters.get(source) {
            limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;
        }
    }

    /// Sends the request and turns any non-2xx status into [`SubhiveError::Status`].
    pub async fn send(&self, request: RequestBuilder, source: &str) -> Result<Response> {
        self.wait_for_rate_limit(source).await;

        let response = request
            .send()
            .await
            .map_err(|e| SubhiveError::Network(format!("{}: {}", source, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubhiveError::Status {
                source_name: source.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    pub async fn get(&self, url: &str, source: &str) -> Result<Response> {
        self.send(self.client.get(url), source).await
    }

    pub async fn get_text(&self, url: &str, source: &str) -> Result<String> {
        let response = self.get(url, source).await?;
        Ok(response.text().await?)
    }

    pub async fn get_json<T>(&self, url: &str, source: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let text = self.get_text(url, source).await?;
        serde_json::from_str(&text)
            .map_err(|e| SubhiveError::Parse(format!("{}: invalid JSON: {}", source, e)))
    }

    /// POSTs `json` and hands back the raw response whatever its status.
    pub async fn post_json<T>(&self, url: &str, json: &T, source: &str) -> Result<Response>
    where
        T: serde::Serialize,
    {
        self.wait_for_rate_limit(source).await;

        self.client
            .post(url)
            .json(json)
            .send()
            .await
            .map_err(|e| SubhiveError::Network(format!("{}: {}", source, e)))
    }
}
