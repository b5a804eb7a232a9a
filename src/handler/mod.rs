//! Request handler module
//!
//! Responsible for request routing dispatch, the page handlers of the portal
//! and the error responder.

pub mod errors;
pub mod pages;
pub mod router;

use hyper::Method;

use crate::config::Config;
use crate::routing::{Blueprint, Endpoint};

// Re-export main entry point
pub use router::handle_request;

/// Blueprints served by this process
pub fn blueprints(config: &Config) -> Vec<Blueprint> {
    let mut blueprints = vec![Blueprint::new("portal")
        .route("/fetch_api", &[Method::GET], Endpoint::FetchApi)
        .route("/post_api", &[Method::GET, Method::POST], Endpoint::PostApi)];

    let health = &config.routes.health;
    if health.enabled {
        blueprints.push(
            Blueprint::new("health")
                .route(health.liveness_path.clone(), &[Method::GET], Endpoint::Liveness)
                .route(health.readiness_path.clone(), &[Method::GET], Endpoint::Readiness),
        );
    }

    blueprints
}
