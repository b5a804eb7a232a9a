// Application state module
// Read-only state shared by every request task

use std::sync::Arc;

use super::types::Config;
use crate::error::StartupError;
use crate::form::CsrfGuard;
use crate::handler;
use crate::outbound::{HttpOutboundClient, OutboundClient, Upstream};
use crate::render::PageRenderer;
use crate::routing::RouteTable;

/// Application state, built once at startup and never mutated
pub struct AppState {
    pub config: Config,
    pub routes: RouteTable,
    pub renderer: PageRenderer,
    pub csrf: CsrfGuard,
    pub upstream: Upstream,
    pub outbound: Arc<dyn OutboundClient>,
}

impl AppState {
    /// Create `AppState` with the `reqwest`-backed outbound client
    pub fn new(config: &Config) -> Result<Self, StartupError> {
        let client = HttpOutboundClient::new(&config.upstream, &config.http.server_name)?;
        Self::with_outbound(config, Arc::new(client))
    }

    /// Create `AppState` around any outbound client
    pub fn with_outbound(
        config: &Config,
        outbound: Arc<dyn OutboundClient>,
    ) -> Result<Self, StartupError> {
        Ok(Self {
            config: config.clone(),
            routes: RouteTable::build(handler::blueprints(config))?,
            renderer: PageRenderer::new(config.templates.dir.as_deref())?,
            csrf: CsrfGuard::new(&config.security)?,
            upstream: Upstream::from_config(&config.upstream)?,
            outbound,
        })
    }
}
