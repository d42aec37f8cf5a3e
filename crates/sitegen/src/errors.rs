use thiserror::Error;

/// Failure of the completion stream itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("could not decode stream: {0}")]
    Decode(String),
}

/// Terminal failures surfaced to the user, one per kind of remedy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamFailure {
    #[error("authentication required")]
    AuthRequired,

    #[error("a provider or model must be selected: {message}")]
    ProviderRequired { message: String },

    #[error("quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("api error: {message}")]
    Api { message: String },

    #[error("network error: {message}")]
    Network { message: String },
}

/// Why a generation produced no usable result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Upstream(#[from] UpstreamFailure),

    /// The stream completed but never yielded valid content for the mode.
    #[error("malformed model output: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
