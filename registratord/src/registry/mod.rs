pub mod consul;
pub mod mesos_consul;

use std::str::FromStr;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;
use shared::protocol::MESOS_CONSUL_SCHEME;
use shared::types::Service;
use crate::error::{AdapterError, FactoryError};
use crate::mesos::Mesos;
use self::consul::ConsulClient;
use self::mesos_consul::MesosConsulAdapter;

/// Registry address used when the adapter URI has no host
pub const DEFAULT_REGISTRY_ADDRESS: &str = "127.0.0.1:8500";

/// Reconciliation operations a registry backend must provide.
///
/// Adapters never retry; callers wrap calls in `bridge::retry` if they want to.
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    /// Liveness probe against the backend
    async fn ping(&self) -> Result<(), AdapterError>;

    /// Upsert `service`; registering the same id again overwrites it
    async fn register(&self, service: &Service) -> Result<(), AdapterError>;

    /// Remove `service` by id, backend decides whether a missing id is an error
    async fn deregister(&self, service: &Service) -> Result<(), AdapterError>;

    /// Renew a service's liveness or TTL
    async fn refresh(&self, service: &Service) -> Result<(), AdapterError>;

    /// Everything currently registered with the backend
    async fn services(&self) -> Result<Vec<Service>, AdapterError>;
}

/// Known registry backends, selected by URI scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Consul agent, with Mesos master state fetched on every registration
    MesosConsul,
}

impl FromStr for BackendKind {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            MESOS_CONSUL_SCHEME => Ok(Self::MesosConsul),
            other => Err(FactoryError::UnknownBackend(other.to_string())),
        }
    }
}

/// Everything an adapter URI resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSpec {
    pub kind: BackendKind,
    /// "host:port" of the registry agent
    pub registry_address: String,
    pub mesos_url: String,
}

impl AdapterSpec {
    /// Parse e.g. "mesos-consul://consul.service:8500?mesos=http://leader.mesos:5050".
    /// The `mesos` query parameter overrides `default_mesos_url`.
    pub fn parse(uri: &str, default_mesos_url: &str) -> Result<Self, FactoryError> {
        let parsed = Url::parse(uri).map_err(|source| FactoryError::InvalidUri {
            uri: uri.to_string(),
            source,
        })?;

        let kind = parsed.scheme().parse::<BackendKind>()?;

        let registry_address = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) if !host.is_empty() => format!("{host}:{port}"),
            (Some(host), None) if !host.is_empty() => host.to_string(),
            _ => DEFAULT_REGISTRY_ADDRESS.to_string(),
        };

        let mesos_url = parsed
            .query_pairs()
            .find(|(k, _)| k == "mesos")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_else(|| default_mesos_url.to_string());

        Ok(Self {
            kind,
            registry_address,
            mesos_url,
        })
    }
}

/// Build the adapter selected by `uri`. `host` is the agent's hostname, the
/// same one used to prefix service ids.
pub fn new_adapter(
    uri: &str,
    default_mesos_url: &str,
    host: &str,
) -> Result<Box<dyn RegistryAdapter>, FactoryError> {
    let spec = AdapterSpec::parse(uri, default_mesos_url)?;
    tracing::info!("creating new adapter, uri: {}, spec: {:?}", uri, spec);

    let client = Client::builder().build().map_err(FactoryError::Client)?;

    match spec.kind {
        BackendKind::MesosConsul => {
            let consul = ConsulClient::new(&spec.registry_address, client.clone()).map_err(|source| {
                FactoryError::InvalidUri {
                    uri: uri.to_string(),
                    source,
                }
            })?;
            let mesos = Mesos::new(spec.mesos_url, client);
            Ok(Box::new(MesosConsulAdapter::new(consul, mesos, host)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESOS: &str = "http://master-1.node.consul:5050";

    #[test]
    fn test_parse_with_host() {
        let spec = AdapterSpec::parse("mesos-consul://consul.service:8500", MESOS).unwrap();

        assert_eq!(spec.kind, BackendKind::MesosConsul);
        assert_eq!(spec.registry_address, "consul.service:8500");
        assert_eq!(spec.mesos_url, MESOS);
    }

    #[test]
    fn test_parse_without_host() {
        let spec = AdapterSpec::parse("mesos-consul:", MESOS).unwrap();
        assert_eq!(spec.registry_address, DEFAULT_REGISTRY_ADDRESS);
    }

    #[test]
    fn test_mesos_query_override() {
        let spec = AdapterSpec::parse(
            "mesos-consul://10.0.0.1?mesos=http%3A%2F%2Fleader.mesos%3A5050",
            MESOS,
        )
        .unwrap();

        assert_eq!(spec.registry_address, "10.0.0.1");
        assert_eq!(spec.mesos_url, "http://leader.mesos:5050");
    }

    #[test]
    fn test_unknown_scheme() {
        let err = AdapterSpec::parse("etcd://127.0.0.1:2379", MESOS).unwrap_err();
        assert!(matches!(err, FactoryError::UnknownBackend(ref s) if s == "etcd"));
    }

    #[test]
    fn test_invalid_uri() {
        let err = AdapterSpec::parse("not a uri", MESOS).unwrap_err();
        assert!(matches!(err, FactoryError::InvalidUri { .. }));
    }

    #[test]
    fn test_new_adapter() {
        assert!(new_adapter("mesos-consul://127.0.0.1:8500", MESOS, "node-1").is_ok());
        assert!(new_adapter("zookeeper://127.0.0.1:2181", MESOS, "node-1").is_err());
    }
}
