//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from specific business logic.

pub mod response;

// Re-export commonly used builders
pub use response::{
    build_405_response, build_413_response, build_500_response, build_502_response,
    build_health_response, build_html_response, build_options_response, build_plain_response,
};
