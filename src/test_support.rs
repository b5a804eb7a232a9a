//! Shared fixtures for handler tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{AppState, Config};
use crate::outbound::{OutboundClient, OutboundError, OutboundRequest, OutboundResponse};

/// Outbound client that records every request and answers with a fixed reply
pub struct MockOutbound {
    reply: Option<Value>,
    calls: Mutex<Vec<OutboundRequest>>,
}

impl MockOutbound {
    /// Answer every call with `body`
    pub fn json(body: Value) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(body),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answer every call with a body that is not JSON
    pub fn not_json() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<OutboundRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutboundClient for MockOutbound {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, OutboundError> {
        self.calls.lock().unwrap().push(request.clone());
        match &self.reply {
            Some(body) => Ok(OutboundResponse {
                status_code: 200,
                body: body.clone(),
            }),
            None => Err(OutboundError::Decode {
                url: request.url,
                source: serde_json::from_str::<Value>("<html>502</html>").unwrap_err(),
            }),
        }
    }
}

pub fn test_config() -> Config {
    Config::from_toml_str(
        r#"
[http]
server_name = "portal-test"
max_body_size = 1024

[logging]
access_log = false

[security]
secret_key = "test-secret"

[[security.protected]]
prefix = "/admin"
token = "letmein"

[upstream]
echo_url = "https://echo.test/post"

[upstream.weather]
url = "https://weather.test/data/2.5/weather"
api_key = "k3y"
"#,
    )
    .unwrap()
}

pub fn test_state(outbound: &Arc<MockOutbound>) -> Arc<AppState> {
    let outbound: Arc<dyn OutboundClient> = outbound.clone();
    Arc::new(AppState::with_outbound(&test_config(), outbound).unwrap())
}
