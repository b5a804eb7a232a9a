// Configuration module entry point
// Loads layered configuration and holds the shared application state

mod state;
mod types;

use std::net::SocketAddr;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File};

// Re-export public types
pub use state::AppState;
pub use types::{Config, ProtectedPrefix, SecurityConfig, UpstreamConfig, WeatherConfig};

/// Environment variable prefix, e.g. `PORTAL_SECURITY__SECRET_KEY`
const ENV_PREFIX: &str = "PORTAL";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        with_defaults(config::Config::builder())?
            .add_source(File::with_name(config_path).required(false))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    /// Load configuration from an in-memory TOML document, without
    /// environment overrides
    #[cfg(test)]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        with_defaults(config::Config::builder())?
            .add_source(File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Every key except `security.secret_key` has a default.
fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 5000)?
        .set_default("server.backlog", 1024)?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", true)?
        .set_default("logging.show_headers", false)?
        .set_default("performance.keep_alive_timeout", 75)?
        .set_default("performance.read_timeout", 30)?
        .set_default("performance.write_timeout", 30)?
        .set_default("performance.shutdown_grace_secs", 10)?
        .set_default("http.server_name", "tournament-portal")?
        .set_default("http.enable_cors", false)?
        .set_default("http.max_body_size", 1_048_576)? // 1MB
        .set_default("security.csrf_enabled", true)?
        .set_default("security.csrf_time_limit", 3600)?
        .set_default(
            "upstream.weather.url",
            "https://api.openweathermap.org/data/2.5/weather",
        )?
        .set_default("upstream.weather.latitude", 1.295_895)?
        .set_default("upstream.weather.longitude", 103.847_426_9)?
        .set_default("upstream.weather.api_key", "")?
        .set_default("upstream.echo_url", "https://httpbin.org/post")
}
