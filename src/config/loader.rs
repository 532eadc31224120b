//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingMode;

    #[test]
    fn parses_route_table() {
        let config = parse_config(
            r#"
            [proxy]
            public_origin = "https://proxy.example.com"

            [routes]
            google = "https://www.google.com"
            epg = "https://tv.example.org/epgphp/index.php"
            "#,
        )
        .unwrap();

        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes["google"], "https://www.google.com");
        assert_eq!(config.proxy.mode, RoutingMode::Table);
        assert_eq!(config.proxy.default_target, None);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn parses_passthrough_mode() {
        let config = parse_config(
            r#"
            [proxy]
            mode = "passthrough"
            passthrough_scheme = "http"
            "#,
        )
        .unwrap();
        assert_eq!(config.proxy.mode, RoutingMode::Passthrough);
        assert_eq!(config.proxy.passthrough_scheme, "http");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.routes.is_empty());
        assert_eq!(config.timeouts.connect_secs, 5);
        assert_eq!(config.limits.max_tunnels, 1024);
    }

    #[test]
    fn reports_syntax_and_semantic_errors() {
        assert!(matches!(parse_config("[routes"), Err(ConfigError::Parse(_))));

        let err = parse_config("[routes]\nbad = \"nope\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().starts_with("Validation failed: route \"bad\""));
    }
}
