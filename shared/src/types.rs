use std::collections::{BTreeMap, HashMap};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// A registerable service derived from one exposed container port.
/// This is the canonical descriptor handed to registry adapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Stable per (container, exposed port), e.g. "node-1:web:8080"
    pub id: String,

    /// Registry service name, never empty
    pub name: String,

    /// Advertised port
    pub port: u16,

    /// Advertised address; empty lets the registry agent fill in its own
    pub ip: String,

    /// Tags in insertion order
    pub tags: Vec<String>,

    /// Remaining `SERVICE_*` metadata, keys lower-cased
    pub attrs: HashMap<String, String>,

    /// Refresh TTL in seconds
    pub ttl: Option<u64>,

    /// Port binding this service was built from
    pub origin: ServicePort,
}

/// Resolved network binding of one exposed container port.
///
/// The container is referenced by id/name/hostname only; these are lookup
/// keys for logging and check interpolation, not a handle to the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub host_port: String,
    pub host_ip: String,
    pub exposed_port: String,
    pub exposed_ip: String,
    pub port_type: String,
    pub container_hostname: String,
    pub container_id: String,
    pub container_name: String,
}

/// Services orphaned by a container that exited, kept for a grace period
/// before they are deregistered.
#[derive(Debug, Clone)]
pub struct DeadContainer {
    /// Grace period in seconds
    pub ttl: u64,
    pub died_at: DateTime<Utc>,
    pub services: Vec<Service>,
}

impl DeadContainer {
    pub fn new(ttl: u64, services: Vec<Service>) -> Self {
        Self {
            ttl,
            died_at: Utc::now(),
            services,
        }
    }

    /// Whether the grace period has run out at `now`
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        let ttl = i64::try_from(self.ttl).unwrap_or(i64::MAX);
        now.signed_duration_since(self.died_at).num_seconds() >= ttl
    }
}

/// A runtime container as reported by the container watcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    pub id: String,

    /// Container name, possibly with the runtime's leading '/'
    pub name: String,

    /// Image reference, e.g. "registry.local/team/web:1.2"
    pub image: String,

    pub hostname: String,

    /// Environment as "KEY=VALUE" entries
    pub env: Vec<String>,

    pub labels: BTreeMap<String, String>,

    /// Exposed port specs, e.g. "8080/tcp" or "53/udp"
    pub exposed_ports: Vec<String>,

    /// Published bindings keyed by exposed port spec
    pub published: BTreeMap<String, Vec<PortBinding>>,

    pub network: NetworkSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Address on the default bridge network, empty when not attached
    pub ip_address: String,

    /// Named networks and the container's address on each
    pub networks: BTreeMap<String, EndpointSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub ip_address: String,
}

impl Container {
    /// Container name without the runtime's leading '/'
    pub fn short_name(&self) -> &str {
        self.name.trim_start_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_container_expiry() {
        let mut dead = DeadContainer::new(30, Vec::new());
        dead.died_at = Utc::now() - chrono::Duration::seconds(10);
        assert!(!dead.expired(Utc::now()));

        dead.died_at = Utc::now() - chrono::Duration::seconds(31);
        assert!(dead.expired(Utc::now()));
    }

    #[test]
    fn test_container_defaults_missing_fields() {
        let json = r#"{"id":"abc","name":"/web","exposed_ports":["80/tcp"]}"#;
        let container: Container = serde_json::from_str(json).unwrap();

        assert_eq!(container.short_name(), "web");
        assert!(container.env.is_empty());
        assert!(container.published.is_empty());
        assert_eq!(container.network.ip_address, "");
    }
}
