pub mod metadata;
pub mod port;
pub mod retry;
pub mod service;

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use shared::types::{Container, DeadContainer, Service};
use crate::config::{BridgeConfig, DeregisterCheck};
use crate::error::AdapterError;
use crate::events::ContainerEvent;
use crate::registry::RegistryAdapter;
use self::retry::retry;

/// Keeps the registry in line with the containers running on this host.
pub struct Bridge {
    registry: Box<dyn RegistryAdapter>,
    config: BridgeConfig,
    hostname: String,
    /// Registered services by container id
    services: HashMap<String, Vec<Service>>,
    /// Exited containers whose services are awaiting deregistration
    dead: HashMap<String, DeadContainer>,
}

impl Bridge {
    pub fn new(registry: Box<dyn RegistryAdapter>, config: BridgeConfig, hostname: impl Into<String>) -> Self {
        Self {
            registry,
            config,
            hostname: hostname.into(),
            services: HashMap::new(),
            dead: HashMap::new(),
        }
    }

    /// Ping the registry, retrying with backoff until it answers or the
    /// retry budget runs out
    pub async fn ping(&self) -> Result<(), AdapterError> {
        let registry = self.registry.as_ref();
        retry(move || registry.ping()).await
    }

    /// Register the services of a started container
    pub async fn add(&mut self, container: &Container) {
        if self.services.contains_key(&container.id) {
            tracing::debug!("container {} already registered", container.id);
            return;
        }

        if let Some(dead) = self.dead.remove(&container.id) {
            tracing::info!("container {} came back, keeping its services", container.id);
            self.services.insert(container.id.clone(), dead.services);
            return;
        }

        let mut registered = Vec::new();
        for service in service::services_for(container, &self.config, &self.hostname) {
            match self.registry.register(&service).await {
                Ok(()) => {
                    tracing::info!("added: {} {}", container.id, service.id);
                    registered.push(service);
                }
                Err(e) => {
                    tracing::error!("register failed: {} {}: {}", container.id, service.id, e);
                }
            }
        }

        if registered.is_empty() {
            tracing::debug!("container {} has no registered services", container.id);
            return;
        }
        self.services.insert(container.id.clone(), registered);
    }

    /// Handle a container exit. Services are dropped right away unless
    /// `on-success` is configured and the container failed, in which case
    /// they linger for `refresh_ttl` seconds.
    pub async fn remove(&mut self, container_id: &str, exit_code: i64) {
        let Some(services) = self.services.remove(container_id) else {
            tracing::debug!("container {} has no services", container_id);
            return;
        };

        let deregister_now = self.config.deregister == DeregisterCheck::Always
            || exit_code == 0
            || self.config.refresh_ttl == 0;

        if deregister_now {
            self.deregister_all(container_id, &services).await;
        } else {
            tracing::info!(
                "container {} exited with {}, deregistering in {}s",
                container_id,
                exit_code,
                self.config.refresh_ttl
            );
            self.dead.insert(
                container_id.to_string(),
                DeadContainer::new(self.config.refresh_ttl, services),
            );
        }
    }

    /// Renew TTL services and drop dead containers whose grace period is over
    pub async fn refresh(&mut self) {
        let now = Utc::now();
        let expired: Vec<String> = self
            .dead
            .iter()
            .filter(|(_, dead)| dead.expired(now))
            .map(|(id, _)| id.clone())
            .collect();

        for container_id in expired {
            if let Some(dead) = self.dead.remove(&container_id) {
                self.deregister_all(&container_id, &dead.services).await;
            }
        }

        for (container_id, services) in &self.services {
            for service in services.iter().filter(|s| s.ttl.is_some()) {
                if let Err(e) = self.registry.refresh(service).await {
                    tracing::error!("refresh failed: {} {}: {}", container_id, service.id, e);
                } else {
                    tracing::debug!("refreshed: {} {}", container_id, service.id);
                }
            }
        }
    }

    /// Re-register every known service, and with `cleanup` drop registry
    /// entries of this host that no container backs any more
    pub async fn sync(&self) {
        tracing::info!("syncing {} containers", self.services.len());

        for (container_id, services) in &self.services {
            for service in services {
                if let Err(e) = self.registry.register(service).await {
                    tracing::error!("sync register failed: {} {}: {}", container_id, service.id, e);
                }
            }
        }

        if !self.config.cleanup {
            return;
        }

        let registered = match self.registry.services().await {
            Ok(services) => services,
            Err(e) => {
                tracing::error!("cleanup failed to list services: {}", e);
                return;
            }
        };

        let known: HashSet<&str> = self
            .services
            .values()
            .chain(self.dead.values().map(|d| &d.services))
            .flatten()
            .map(|s| s.id.as_str())
            .collect();

        let prefix = format!("{}:", self.hostname);
        for service in registered {
            if service.id.starts_with(&prefix) && !known.contains(service.id.as_str()) {
                tracing::info!("dangling: {}", service.id);
                if let Err(e) = self.registry.deregister(&service).await {
                    tracing::error!("cleanup deregister failed: {}: {}", service.id, e);
                }
            }
        }
    }

    async fn deregister_all(&self, container_id: &str, services: &[Service]) {
        for service in services {
            match self.registry.deregister(service).await {
                Ok(()) => tracing::info!("removed: {} {}", container_id, service.id),
                Err(e) => {
                    tracing::error!("deregister failed: {} {}: {}", container_id, service.id, e)
                }
            }
        }
    }
}

/// Bridge event loop - applies container events and refreshes on a timer
pub async fn run(
    mut bridge: Bridge,
    mut rx: mpsc::Receiver<ContainerEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let refresh_enabled = bridge.config.refresh_interval > 0;
    let mut refresh_interval = tokio::time::interval(Duration::from_secs(
        bridge.config.refresh_interval.max(1),
    ));

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                match event {
                    ContainerEvent::Start { container } => bridge.add(&container).await,
                    ContainerEvent::Die { id, exit_code } => bridge.remove(&id, exit_code).await,
                }
            }
            _ = refresh_interval.tick(), if refresh_enabled => {
                bridge.refresh().await;
            }
            _ = cancel.cancelled() => {
                tracing::info!("Bridge shutting down");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use async_trait::async_trait;
    use shared::types::PortBinding;

    /// Records every call and keeps registrations by id
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        registered: Mutex<BTreeMap<String, Service>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn registered_ids(&self) -> Vec<String> {
            self.registered.lock().unwrap().keys().cloned().collect()
        }
    }

    struct RecordingAdapter(Arc<Recorder>);

    #[async_trait]
    impl RegistryAdapter for RecordingAdapter {
        async fn ping(&self) -> Result<(), AdapterError> {
            self.0.calls.lock().unwrap().push("ping".to_string());
            Ok(())
        }

        async fn register(&self, service: &Service) -> Result<(), AdapterError> {
            self.0.calls.lock().unwrap().push(format!("register {}", service.id));
            self.0
                .registered
                .lock()
                .unwrap()
                .insert(service.id.clone(), service.clone());
            Ok(())
        }

        async fn deregister(&self, service: &Service) -> Result<(), AdapterError> {
            self.0.calls.lock().unwrap().push(format!("deregister {}", service.id));
            self.0.registered.lock().unwrap().remove(&service.id);
            Ok(())
        }

        async fn refresh(&self, service: &Service) -> Result<(), AdapterError> {
            self.0.calls.lock().unwrap().push(format!("refresh {}", service.id));
            Ok(())
        }

        async fn services(&self) -> Result<Vec<Service>, AdapterError> {
            Ok(self.0.registered.lock().unwrap().values().cloned().collect())
        }
    }

    fn test_bridge(config: BridgeConfig) -> (Bridge, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let bridge = Bridge::new(Box::new(RecordingAdapter(recorder.clone())), config, "node-1");
        (bridge, recorder)
    }

    fn test_container(id: &str, name: &str, host_port: &str) -> Container {
        Container {
            id: id.to_string(),
            name: format!("/{name}"),
            image: "web:latest".to_string(),
            exposed_ports: vec!["80/tcp".to_string()],
            published: BTreeMap::from([(
                "80/tcp".to_string(),
                vec![PortBinding { host_ip: String::new(), host_port: host_port.to_string() }],
            )]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let (mut bridge, recorder) = test_bridge(BridgeConfig::default());

        bridge.add(&test_container("c1", "web", "31000")).await;
        assert_eq!(recorder.registered_ids(), vec!["node-1:web:80"]);

        // Second start of the same container is a no-op
        bridge.add(&test_container("c1", "web", "31000")).await;
        assert_eq!(recorder.calls().len(), 1);

        bridge.remove("c1", 0).await;
        assert!(recorder.registered_ids().is_empty());
        assert!(bridge.services.is_empty());
    }

    #[tokio::test]
    async fn test_failed_container_parked_with_on_success() {
        let config = BridgeConfig {
            deregister: DeregisterCheck::OnSuccess,
            refresh_ttl: 30,
            ..Default::default()
        };
        let (mut bridge, recorder) = test_bridge(config);

        bridge.add(&test_container("c1", "web", "31000")).await;
        bridge.remove("c1", 137).await;

        assert_eq!(recorder.registered_ids(), vec!["node-1:web:80"]);
        assert!(bridge.dead.contains_key("c1"));

        // Not yet expired: nothing is deregistered
        bridge.refresh().await;
        assert_eq!(recorder.registered_ids(), vec!["node-1:web:80"]);

        bridge.dead.get_mut("c1").unwrap().died_at = Utc::now() - chrono::Duration::seconds(31);
        bridge.refresh().await;

        assert!(recorder.registered_ids().is_empty());
        assert!(bridge.dead.is_empty());
    }

    #[tokio::test]
    async fn test_restarted_container_revived() {
        let config = BridgeConfig {
            deregister: DeregisterCheck::OnSuccess,
            refresh_ttl: 30,
            ..Default::default()
        };
        let (mut bridge, recorder) = test_bridge(config);

        bridge.add(&test_container("c1", "web", "31000")).await;
        bridge.remove("c1", 1).await;
        bridge.add(&test_container("c1", "web", "31000")).await;

        assert!(bridge.dead.is_empty());
        assert_eq!(bridge.services["c1"].len(), 1);
        assert_eq!(
            recorder.calls(),
            vec!["register node-1:web:80".to_string()]
        );
    }

    #[tokio::test]
    async fn test_always_deregisters_failed_container() {
        let config = BridgeConfig { refresh_ttl: 30, ..Default::default() };
        let (mut bridge, recorder) = test_bridge(config);

        bridge.add(&test_container("c1", "web", "31000")).await;
        bridge.remove("c1", 1).await;

        assert!(recorder.registered_ids().is_empty());
        assert!(bridge.dead.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_only_ttl_services() {
        let (mut bridge, recorder) = test_bridge(BridgeConfig::default());
        bridge.add(&test_container("c1", "web", "31000")).await;
        bridge.refresh().await;
        assert!(!recorder.calls().iter().any(|c| c.starts_with("refresh")));

        let (mut bridge, recorder) = test_bridge(BridgeConfig { refresh_ttl: 15, ..Default::default() });
        bridge.add(&test_container("c1", "web", "31000")).await;
        bridge.refresh().await;
        assert!(recorder.calls().contains(&"refresh node-1:web:80".to_string()));
    }

    #[tokio::test]
    async fn test_sync_cleans_dangling_services() {
        let config = BridgeConfig { cleanup: true, ..Default::default() };
        let (mut bridge, recorder) = test_bridge(config);

        bridge.add(&test_container("c1", "web", "31000")).await;
        for id in ["node-1:gone:80", "node-2:other:80"] {
            recorder.registered.lock().unwrap().insert(
                id.to_string(),
                Service { id: id.to_string(), name: "x".to_string(), ..Default::default() },
            );
        }

        bridge.sync().await;

        assert_eq!(
            recorder.registered_ids(),
            vec!["node-1:web:80".to_string(), "node-2:other:80".to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_applies_events() {
        let (bridge, recorder) = test_bridge(BridgeConfig::default());
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(bridge, rx, cancel.clone()));

        tx.send(ContainerEvent::Start { container: test_container("c1", "web", "31000") })
            .await
            .unwrap();
        tx.send(ContainerEvent::Die { id: "c1".to_string(), exit_code: 0 })
            .await
            .unwrap();
        drop(tx);

        while recorder.calls().len() < 2 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(
            recorder.calls(),
            vec![
                "register node-1:web:80".to_string(),
                "deregister node-1:web:80".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_ping_uses_registry() {
        let (bridge, recorder) = test_bridge(BridgeConfig::default());
        bridge.ping().await.unwrap();
        assert_eq!(recorder.calls(), vec!["ping".to_string()]);
    }
}
