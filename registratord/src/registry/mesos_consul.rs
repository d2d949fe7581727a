use async_trait::async_trait;
use shared::protocol::{
    ATTR_CHECK_CMD, ATTR_CHECK_HTTP, ATTR_CHECK_INTERVAL, ATTR_CHECK_SCRIPT, ATTR_CHECK_TIMEOUT,
    ATTR_CHECK_TTL, CHECK_CMD_PROGRAM, DEFAULT_CHECK_INTERVAL, MESOS_CONSUL_SCHEME,
    SCRIPT_SERVICE_IP, SCRIPT_SERVICE_PORT,
};
use shared::types::Service;
use crate::bridge::metadata::{expand_template, map_default};
use crate::error::AdapterError;
use crate::mesos::Mesos;
use crate::registry::consul::{AgentServiceCheck, AgentServiceRegistration, ConsulClient, RegistryBackend};
use crate::registry::RegistryAdapter;

/// Registers services with the local Consul agent, refreshing Mesos state
/// before every registration.
pub struct MesosConsulAdapter<B = ConsulClient> {
    registry: B,
    mesos: Mesos,
    /// Agent hostname, used to locate this node's tasks in the Mesos state
    host: String,
}

impl<B: RegistryBackend> MesosConsulAdapter<B> {
    pub fn new(registry: B, mesos: Mesos, host: impl Into<String>) -> Self {
        Self {
            registry,
            mesos,
            host: host.into(),
        }
    }

    fn log_task(&self, service: &Service) {
        let state = self.mesos.state();
        match state.task_for_port(&self.host, service.port) {
            Some(task) if task.is_running() => {
                tracing::debug!("{}: {} backs task {}", MESOS_CONSUL_SCHEME, service.id, task.id);
            }
            Some(task) => {
                tracing::warn!(
                    "{}: {} backs task {} in state {}",
                    MESOS_CONSUL_SCHEME,
                    service.id,
                    task.id,
                    task.state
                );
            }
            None => {
                tracing::debug!(
                    "{}: no mesos task on {} holds port {}",
                    MESOS_CONSUL_SCHEME,
                    self.host,
                    service.port
                );
            }
        }
    }
}

/// Health check for `service`, first matching attribute wins:
/// `check_http`, `check_cmd`, `check_script`, `check_ttl`.
///
/// A service with no address (wildcard binding) is checked through `host`.
pub fn build_check(service: &Service, host: &str) -> Option<AgentServiceCheck> {
    let attr = |key| map_default(&service.attrs, key, "");

    let mut check = AgentServiceCheck::default();
    if !attr(ATTR_CHECK_HTTP).is_empty() {
        let addr = if service.ip.is_empty() { host } else { service.ip.as_str() };
        check.http = format!("http://{}:{}{}", addr, service.port, attr(ATTR_CHECK_HTTP));
        check.timeout = attr(ATTR_CHECK_TIMEOUT).to_string();
    } else if !attr(ATTR_CHECK_CMD).is_empty() {
        let id = &service.origin.container_id;
        check.script = format!(
            "{} {} {} {}",
            CHECK_CMD_PROGRAM,
            id.get(..12).unwrap_or(id.as_str()),
            service.origin.exposed_port,
            attr(ATTR_CHECK_CMD)
        );
    } else if !attr(ATTR_CHECK_SCRIPT).is_empty() {
        check.script = expand_template(
            attr(ATTR_CHECK_SCRIPT),
            &[
                (SCRIPT_SERVICE_IP, service.origin.host_ip.as_str()),
                (SCRIPT_SERVICE_PORT, service.origin.host_port.as_str()),
            ],
        );
    } else if !attr(ATTR_CHECK_TTL).is_empty() {
        check.ttl = attr(ATTR_CHECK_TTL).to_string();
        return Some(check);
    } else {
        return None;
    }

    check.interval = map_default(&service.attrs, ATTR_CHECK_INTERVAL, DEFAULT_CHECK_INTERVAL).to_string();
    Some(check)
}

#[async_trait]
impl<B: RegistryBackend> RegistryAdapter for MesosConsulAdapter<B> {
    /// Asks the agent for the current leader
    async fn ping(&self) -> Result<(), AdapterError> {
        let leader = self.registry.leader().await?;
        tracing::info!("{}: current leader {}", MESOS_CONSUL_SCHEME, leader);
        Ok(())
    }

    async fn register(&self, service: &Service) -> Result<(), AdapterError> {
        tracing::info!("{}: registering service: {:?}", MESOS_CONSUL_SCHEME, service);

        self.mesos.refresh().await?;
        self.log_task(service);

        let registration = AgentServiceRegistration {
            id: service.id.clone(),
            name: service.name.clone(),
            tags: service.tags.clone(),
            port: service.port,
            address: service.ip.clone(),
            check: build_check(service, &self.host),
        };

        self.registry.service_register(&registration).await?;
        Ok(())
    }

    async fn deregister(&self, service: &Service) -> Result<(), AdapterError> {
        tracing::info!("{}: deregistering service: {:?}", MESOS_CONSUL_SCHEME, service);
        self.registry.service_deregister(&service.id).await?;
        Ok(())
    }

    /// Health is check-driven for Consul, nothing to renew
    async fn refresh(&self, _service: &Service) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Attributes and origin cannot be recovered from the agent and are left empty
    async fn services(&self) -> Result<Vec<Service>, AdapterError> {
        let services = self.registry.services().await?;

        Ok(services
            .into_values()
            .map(|s| Service {
                id: s.id,
                name: s.service,
                port: s.port,
                ip: s.address,
                tags: s.tags.unwrap_or_default(),
                ..Default::default()
            })
            .collect())
    }
}
