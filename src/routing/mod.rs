//! Routing module
//!
//! Provides request routing for the portal:
//! - Blueprint definitions compiled into an immutable route table
//! - Bearer-token guard for protected path prefixes

mod guard;
mod table;

pub use guard::{check_access, AccessDecision};
pub use table::{allow_header, Blueprint, Endpoint, RouteError, RouteMatch, RouteTable};
