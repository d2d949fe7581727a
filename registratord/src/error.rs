use thiserror::Error;

/// Failures talking to the registry agent
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("consul: request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("consul: {url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("consul: failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failures loading the Mesos state snapshot
#[derive(Debug, Error)]
pub enum MesosError {
    #[error("mesos: failed to GET {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("mesos: GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("mesos: failed to read {url} response: {source}")]
    Read {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("mesos: failed to parse {url} response: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by a registry adapter operation
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to update mesos state: {0}")]
    Mesos(#[from] MesosError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors building an adapter at startup
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("invalid registry uri {uri}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unrecognized registry backend: {0}")]
    UnknownBackend(String),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}
