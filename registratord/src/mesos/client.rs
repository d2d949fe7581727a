use std::sync::Arc;
use arc_swap::ArcSwap;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use shared::protocol::MESOS_STATE_PATH;
use crate::error::MesosError;
use crate::mesos::state::State;

/// Mesos master state fetcher.
///
/// Holds the last successfully loaded snapshot. `refresh` swaps in a whole
/// new snapshot or leaves the old one untouched; readers always see a
/// complete snapshot, at most as old as the last successful refresh.
pub struct Mesos {
    master_url: String,
    client: Client,
    state: ArcSwap<State>,
}

impl Mesos {
    pub fn new(master_url: impl Into<String>, client: Client) -> Self {
        let mut master_url = master_url.into();
        while master_url.ends_with('/') {
            master_url.pop();
        }
        Self {
            master_url,
            client,
            state: ArcSwap::from_pointee(State::default()),
        }
    }

    /// Current snapshot, empty until the first successful refresh
    pub fn state(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Reload the snapshot from the master. No retries.
    pub async fn refresh(&self) -> Result<(), MesosError> {
        tracing::info!("mesos: updating state...");
        let state = self.load_state().await.inspect_err(|e| {
            tracing::warn!("mesos: failed to load state: {}", e);
        })?;

        tracing::info!("mesos: got state updated, leader {}", state.leader);
        tracing::debug!("mesos: state: {:?}", state);
        self.state.store(Arc::new(state));
        Ok(())
    }

    async fn load_state(&self) -> Result<State, MesosError> {
        let url = format!("{}{}", self.master_url, MESOS_STATE_PATH);
        tracing::debug!("mesos: getting state from: {:?}", url);

        let resp = self
            .client
            .get(&url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|source| MesosError::Transport { url: url.clone(), source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MesosError::Status { url, status: status.as_u16() });
        }

        let body = resp
            .text()
            .await
            .map_err(|source| MesosError::Read { url: url.clone(), source })?;

        tracing::debug!("mesos: {} response:\n{}", MESOS_STATE_PATH, body);

        serde_json::from_str(&body).map_err(|source| MesosError::Decode { url, source })
    }
}
