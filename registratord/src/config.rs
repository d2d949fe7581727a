use std::path::Path;
use serde::Deserialize;
use anyhow::{Context, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub mesos: MesosConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Adapter URI, the scheme selects the backend
    #[serde(default = "default_registry_uri")]
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MesosConfig {
    #[serde(default = "default_master_url")]
    pub master_url: String,
}

/// When to drop services of a container that exited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeregisterCheck {
    #[default]
    Always,
    OnSuccess,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Advertised IP override for every service
    #[serde(default)]
    pub host_ip: String,
    /// Advertise container-side ports and addresses instead of published ones
    #[serde(default)]
    pub internal: bool,
    /// Comma-separated tags appended to every service
    #[serde(default)]
    pub force_tags: String,
    /// Service TTL in seconds, 0 disables
    #[serde(default)]
    pub refresh_ttl: u64,
    /// Refresh period in seconds, 0 disables
    #[serde(default)]
    pub refresh_interval: u64,
    #[serde(default)]
    pub deregister: DeregisterCheck,
    /// Remove registry entries owned by this host that no container backs
    #[serde(default)]
    pub cleanup: bool,
    /// Resolve `SERVICE_PORT<n>_*` metadata from Marathon's `PORT<n>` variables
    #[serde(default)]
    pub use_marathon_ports: bool,
    #[serde(default = "default_single_service_name")]
    pub default_single_service_name: String,
    #[serde(default = "default_group_service_name")]
    pub default_group_service_name: String,
    /// e.g. "nc -w 5 -z {{HOST}} {{PORT}} >/dev/null", empty disables
    #[serde(default)]
    pub default_service_check_script: String,
    #[serde(default = "default_service_check_interval")]
    pub default_service_check_interval: String,
}

fn default_registry_uri() -> String {
    "mesos-consul://127.0.0.1:8500".to_string()
}

fn default_master_url() -> String {
    "http://master-1.node.consul:5050".to_string()
}

fn default_single_service_name() -> String {
    "{{NAME}}".to_string()
}

fn default_group_service_name() -> String {
    "{{NAME}}-{{PORT}}".to_string()
}

fn default_service_check_interval() -> String {
    shared::protocol::DEFAULT_CHECK_INTERVAL.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            uri: default_registry_uri(),
        }
    }
}

impl Default for MesosConfig {
    fn default() -> Self {
        Self {
            master_url: default_master_url(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host_ip: String::new(),
            internal: false,
            force_tags: String::new(),
            refresh_ttl: 0,
            refresh_interval: 0,
            deregister: DeregisterCheck::default(),
            cleanup: false,
            use_marathon_ports: false,
            default_single_service_name: default_single_service_name(),
            default_group_service_name: default_group_service_name(),
            default_service_check_script: String::new(),
            default_service_check_interval: default_service_check_interval(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.registry.uri, "mesos-consul://127.0.0.1:8500");
        assert_eq!(config.mesos.master_url, "http://master-1.node.consul:5050");
        assert_eq!(config.bridge.default_single_service_name, "{{NAME}}");
        assert_eq!(config.bridge.default_group_service_name, "{{NAME}}-{{PORT}}");
        assert_eq!(config.bridge.default_service_check_interval, "10s");
        assert_eq!(config.bridge.deregister, DeregisterCheck::Always);
    }

    #[test]
    fn test_load_bridge_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [registry]
            uri = "mesos-consul://consul.service:8500"

            [bridge]
            host_ip = "10.0.0.5"
            force_tags = "prod,edge"
            refresh_ttl = 30
            refresh_interval = 10
            deregister = "on-success"
            use_marathon_ports = true
            "#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.registry.uri, "mesos-consul://consul.service:8500");
        assert_eq!(config.bridge.host_ip, "10.0.0.5");
        assert_eq!(config.bridge.refresh_ttl, 30);
        assert_eq!(config.bridge.deregister, DeregisterCheck::OnSuccess);
        assert!(config.bridge.use_marathon_ports);
        assert!(!config.bridge.internal);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/nonexistent/registratord.toml").is_err());
    }
}
