//! Server configuration from environment variables

use std::net::SocketAddr;

pub const DEFAULT_BIND: &str = "0.0.0.0:6574";
pub const DEFAULT_FEED_CAPACITY: usize = 1024;
pub const DEFAULT_OVERLAY_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket server listens on
    pub bind: SocketAddr,
    /// Buffered chat events before the bridge starts lagging
    pub feed_capacity: usize,
    /// Buffered answer events per overlay connection
    pub overlay_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 6574))),
            feed_capacity: DEFAULT_FEED_CAPACITY,
            overlay_capacity: DEFAULT_OVERLAY_CAPACITY,
        }
    }
}

fn parse_var<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Ok(value) = std::env::var(var) else {
        return Ok(None);
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            value,
            reason: e.to_string(),
        })
}

/// Use the parsed value, or fall back to `default` and log why
fn or_default<T>(result: Result<Option<T>, ConfigError>, default: T) -> T {
    match result {
        Ok(Some(v)) => v,
        Ok(None) => default,
        Err(e) => {
            tracing::warn!("{}, using default", e);
            default
        }
    }
}

fn non_zero(result: Result<Option<usize>, ConfigError>, var: &'static str) -> Result<Option<usize>, ConfigError> {
    match result {
        Ok(Some(0)) => Err(ConfigError::InvalidValue {
            var,
            value: "0".to_string(),
            reason: "capacity must be at least 1".to_string(),
        }),
        other => other,
    }
}

impl ServerConfig {
    /// Load config from environment variables:
    /// QUIZCAST_BIND, QUIZCAST_FEED_CAPACITY, QUIZCAST_OVERLAY_CAPACITY
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind = or_default(parse_var("QUIZCAST_BIND"), defaults.bind);
        let feed_capacity = or_default(
            non_zero(parse_var("QUIZCAST_FEED_CAPACITY"), "QUIZCAST_FEED_CAPACITY"),
            defaults.feed_capacity,
        );
        let overlay_capacity = or_default(
            non_zero(parse_var("QUIZCAST_OVERLAY_CAPACITY"), "QUIZCAST_OVERLAY_CAPACITY"),
            defaults.overlay_capacity,
        );

        tracing::info!(
            %bind,
            feed_capacity,
            overlay_capacity,
            "Server config loaded"
        );

        Self {
            bind,
            feed_capacity,
            overlay_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var("QUIZCAST_BIND");
        std::env::remove_var("QUIZCAST_FEED_CAPACITY");
        std::env::remove_var("QUIZCAST_OVERLAY_CAPACITY");
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = ServerConfig::from_env();
        assert_eq!(config.bind.port(), 6574);
        assert_eq!(config.feed_capacity, DEFAULT_FEED_CAPACITY);
        assert_eq!(config.overlay_capacity, DEFAULT_OVERLAY_CAPACITY);
    }

    #[test]
    #[serial]
    fn test_reads_env() {
        clear_env();
        std::env::set_var("QUIZCAST_BIND", "127.0.0.1:9000");
        std::env::set_var("QUIZCAST_FEED_CAPACITY", "64");
        let config = ServerConfig::from_env();
        assert_eq!(config.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.feed_capacity, 64);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("QUIZCAST_BIND", "not-an-address");
        std::env::set_var("QUIZCAST_FEED_CAPACITY", "0");
        std::env::set_var("QUIZCAST_OVERLAY_CAPACITY", "lots");
        let config = ServerConfig::from_env();
        assert_eq!(config.bind.port(), 6574);
        assert_eq!(config.feed_capacity, DEFAULT_FEED_CAPACITY);
        assert_eq!(config.overlay_capacity, DEFAULT_OVERLAY_CAPACITY);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_parse_error_message() {
        clear_env();
        std::env::set_var("QUIZCAST_FEED_CAPACITY", "lots");
        let err = parse_var::<usize>("QUIZCAST_FEED_CAPACITY").unwrap_err();
        assert!(err.to_string().contains("QUIZCAST_FEED_CAPACITY"));
        assert!(err.to_string().contains("\"lots\""));
        clear_env();
    }
}
