//! Route table
//!
//! Blueprints declare routes as plain data. They are compiled once at startup
//! into an immutable table that maps a path and method to an endpoint.

use std::collections::HashMap;

use hyper::Method;
use thiserror::Error;

/// Handler a route dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    FetchApi,
    PostApi,
    Liveness,
    Readiness,
}

/// One route of a blueprint, relative to its URL prefix
#[derive(Debug, Clone)]
pub struct RouteDef {
    pub path: String,
    pub methods: Vec<Method>,
    pub endpoint: Endpoint,
}

/// Named group of routes sharing a URL prefix
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub name: String,
    pub url_prefix: String,
    pub routes: Vec<RouteDef>,
}

impl Blueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_prefix: String::new(),
            routes: Vec::new(),
        }
    }

    #[must_use]
    pub fn route(mut self, path: impl Into<String>, methods: &[Method], endpoint: Endpoint) -> Self {
        self.routes.push(RouteDef {
            path: path.into(),
            methods: methods.to_vec(),
            endpoint,
        });
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route '{path}' of blueprint '{blueprint}' must start with '/'")]
    InvalidPath { blueprint: String, path: String },

    #[error("route '{path}' of blueprint '{blueprint}' lists no methods")]
    NoMethods { blueprint: String, path: String },

    #[error("{method} {path} is registered twice (blueprint '{blueprint}')")]
    Duplicate {
        blueprint: String,
        path: String,
        method: Method,
    },
}

/// Result of looking up a request
#[derive(Debug, PartialEq, Eq)]
pub enum RouteMatch<'a> {
    Found(Endpoint),
    /// OPTIONS on a known path
    Options(&'a [Method]),
    MethodNotAllowed(&'a [Method]),
    NotFound,
}

#[derive(Debug)]
struct PathEntry {
    handlers: Vec<(Method, Endpoint)>,
    /// Methods answered on this path, in the order advertised by `Allow`
    allow: Vec<Method>,
}

#[derive(Debug)]
pub struct RouteTable {
    paths: HashMap<String, PathEntry>,
}

impl RouteTable {
    pub fn build(blueprints: Vec<Blueprint>) -> Result<Self, RouteError> {
        let mut paths: HashMap<String, PathEntry> = HashMap::new();

        for blueprint in blueprints {
            let prefix = blueprint.url_prefix.trim_end_matches('/');
            for route in blueprint.routes {
                if !route.path.starts_with('/') || !(prefix.is_empty() || prefix.starts_with('/')) {
                    return Err(RouteError::InvalidPath {
                        blueprint: blueprint.name,
                        path: format!("{prefix}{}", route.path),
                    });
                }
                let full_path = format!("{prefix}{}", route.path);
                if route.methods.is_empty() {
                    return Err(RouteError::NoMethods {
                        blueprint: blueprint.name,
                        path: full_path,
                    });
                }

                let entry = paths.entry(full_path.clone()).or_insert_with(|| PathEntry {
                    handlers: Vec::new(),
                    allow: Vec::new(),
                });
                for method in route.methods {
                    if entry.handlers.iter().any(|(m, _)| *m == method) {
                        return Err(RouteError::Duplicate {
                            blueprint: blueprint.name,
                            path: full_path,
                            method,
                        });
                    }
                    entry.handlers.push((method, route.endpoint));
                }
            }
        }

        for entry in paths.values_mut() {
            entry.allow = advertised_methods(&entry.handlers);
        }

        Ok(Self { paths })
    }

    pub fn resolve(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let Some(entry) = self.paths.get(path) else {
            return RouteMatch::NotFound;
        };
        if *method == Method::OPTIONS {
            return RouteMatch::Options(&entry.allow);
        }

        let lookup = |wanted: &Method| {
            entry
                .handlers
                .iter()
                .find(|(m, _)| m == wanted)
                .map(|(_, endpoint)| *endpoint)
        };
        let found = match lookup(method) {
            None if *method == Method::HEAD => lookup(&Method::GET),
            other => other,
        };

        found.map_or(RouteMatch::MethodNotAllowed(&entry.allow), RouteMatch::Found)
    }

    /// Number of distinct paths
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }
}

/// Registered methods plus HEAD where GET is served, and OPTIONS
fn advertised_methods(handlers: &[(Method, Endpoint)]) -> Vec<Method> {
    let mut allow: Vec<Method> = handlers.iter().map(|(m, _)| m.clone()).collect();
    if allow.contains(&Method::GET) && !allow.contains(&Method::HEAD) {
        allow.push(Method::HEAD);
    }
    if !allow.contains(&Method::OPTIONS) {
        allow.push(Method::OPTIONS);
    }
    allow
}

/// Render methods as an `Allow` header value
pub fn allow_header(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
