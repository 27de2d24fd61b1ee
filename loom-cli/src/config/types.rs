use serde::{Deserialize, Serialize};

/// CLI-level configuration: the server host/port `loom serve` defaults to
/// when a flag is omitted. `loom_core::LoomConfig` governs batching, retry,
/// and eviction knobs directly via its own env-var overrides (spec §6.5) and
/// is not duplicated here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoomCliConfig {
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Host to bind `loom serve` to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind `loom serve` to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7432
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = LoomCliConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 7432);
    }

    #[test]
    fn toml_round_trip() {
        let config = LoomCliConfig {
            server: ServerSection {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
        };

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: LoomCliConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.server.host, "0.0.0.0");
        assert_eq!(parsed.server.port, 8080);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let toml_str = r#"
[server]
port = 9000
"#;
        let config: LoomCliConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn empty_config_uses_all_defaults() {
        let config: LoomCliConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 7432);
    }
}
