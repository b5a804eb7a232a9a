//! Outbound request client
//!
//! Calls to third-party JSON APIs: the weather provider and the echo service.

mod client;
mod types;

pub use client::{HttpOutboundClient, OutboundClient, OutboundError};
pub use types::{OutboundMethod, OutboundRequest, OutboundResponse, Upstream};
