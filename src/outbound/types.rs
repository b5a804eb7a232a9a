//! Outbound call descriptions
//!
//! Requests and responses are plain data so the handlers can be exercised
//! against any [`OutboundClient`](super::OutboundClient).

use std::collections::BTreeMap;
use std::fmt;

use url::Url;

use crate::config::UpstreamConfig;
use crate::error::StartupError;
use crate::form::Submission;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundMethod {
    Get,
    Post,
}

impl fmt::Display for OutboundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// One call to a third-party endpoint. Never modified after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: OutboundMethod,
    pub url: String,
    /// Sent as a JSON object body when present
    pub payload: Option<BTreeMap<String, String>>,
    pub headers: BTreeMap<String, String>,
}

/// Decoded reply of a third-party endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

impl OutboundResponse {
    /// Compact JSON text of the body, as embedded in pages
    pub fn body_text(&self) -> String {
        self.body.to_string()
    }
}

/// Fixed third-party endpoints, resolved once at startup
#[derive(Debug, Clone)]
pub struct Upstream {
    weather_url: String,
    echo_url: String,
}

impl Upstream {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, StartupError> {
        let weather = &config.weather;
        let weather_url = Url::parse_with_params(
            &weather.url,
            &[
                ("lat", weather.latitude.to_string()),
                ("lon", weather.longitude.to_string()),
                ("appid", weather.api_key.clone()),
            ],
        )
        .map_err(|source| StartupError::UpstreamUrl {
            url: weather.url.clone(),
            source,
        })?;
        let echo_url = Url::parse(&config.echo_url).map_err(|source| StartupError::UpstreamUrl {
            url: config.echo_url.clone(),
            source,
        })?;

        Ok(Self {
            weather_url: weather_url.into(),
            echo_url: echo_url.into(),
        })
    }

    pub fn weather_request(&self) -> OutboundRequest {
        OutboundRequest {
            method: OutboundMethod::Get,
            url: self.weather_url.clone(),
            payload: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn echo_request(&self, submission: &Submission) -> OutboundRequest {
        OutboundRequest {
            method: OutboundMethod::Post,
            url: self.echo_url.clone(),
            payload: Some(BTreeMap::from([(
                "key".to_string(),
                submission.user_input.clone(),
            )])),
            headers: BTreeMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]),
        }
    }
}
