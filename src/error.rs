use thiserror::Error;

/// Errors surfaced by the diagnostics core.
///
/// Aggregate reads (health, detection, pod lookup) return these directly.
/// Per-target write failures are flattened into result records with
/// `to_string()` so the provider's text survives unchanged.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested object does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// Transport or API failure from the kube client.
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// API status returned by a provider that does not go through kube.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The metrics.k8s.io API group is not served by this cluster.
    #[error("metrics server not available: {0}")]
    MetricsUnavailable(String),

    /// Caller supplied something the core refuses to send to the cluster.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn not_found(kind: &'static str, namespace: &str, name: &str) -> Self {
        Error::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// The API server's own message when there is one, otherwise the full display text.
    pub fn provider_message(&self) -> String {
        match self {
            Error::Api { message, .. } => message.clone(),
            Error::Kube(kube::Error::Api(resp)) => resp.message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Api { status, .. } => *status == 404,
            Error::Kube(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }
}
