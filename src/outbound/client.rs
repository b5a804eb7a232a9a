//! HTTP execution of outbound requests

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method};
use thiserror::Error;

use super::types::{OutboundMethod, OutboundRequest, OutboundResponse};
use crate::config::UpstreamConfig;
use crate::logger;

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Performs one best-effort call per request: no retries, no caching.
#[async_trait]
pub trait OutboundClient: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, OutboundError>;
}

/// `reqwest`-backed client shared by all requests
#[derive(Debug, Clone)]
pub struct HttpOutboundClient {
    client: Client,
}

impl HttpOutboundClient {
    pub fn new(config: &UpstreamConfig, user_agent: &str) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().user_agent(user_agent.to_string());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    fn build(&self, request: &OutboundRequest) -> Result<reqwest::Request, reqwest::Error> {
        let method = match request.method {
            OutboundMethod::Get => Method::GET,
            OutboundMethod::Post => Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }
        builder.build()
    }
}

#[async_trait]
impl OutboundClient for HttpOutboundClient {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, OutboundError> {
        let transport = |source| OutboundError::Transport {
            url: request.url.clone(),
            source,
        };

        logger::log_outbound_call(&request.method.to_string(), &request.url);
        let started = Instant::now();

        let built = self.build(&request).map_err(transport)?;
        let response = self.client.execute(built).await.map_err(transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport)?;

        logger::log_outbound_response(&request.url, status.as_u16(), started.elapsed());
        if !status.is_success() {
            logger::log_warning(&format!(
                "Upstream {} answered with status {status}",
                request.url
            ));
        }

        let body = serde_json::from_slice(&bytes).map_err(|source| OutboundError::Decode {
            url: request.url.clone(),
            source,
        })?;

        Ok(OutboundResponse {
            status_code: status.as_u16(),
            body,
        })
    }
}
