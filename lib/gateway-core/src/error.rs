use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid gateway configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to render proxy configuration: {0}")]
    ConfigGeneration(#[from] serde_yaml::Error),

    #[error("Failed to reconcile {kind}: {source}")]
    ResourceSync {
        kind: &'static str,
        #[source]
        source: kube::Error,
    },

    #[error("Failed to persist gateway status: {0}")]
    StatusPersist(#[source] kube::Error),

    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),
}

/// Spec problems that need a user edit to clear
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no AI models specified")]
    MissingModels,

    #[error("AI model name cannot be empty")]
    EmptyModelName,

    #[error("port must be positive, got {0}")]
    InvalidPort(i32),

    #[error("unsupported gateway type '{0}': only 'litellm' is supported")]
    UnsupportedType(String),
}

impl ValidationError {
    /// Condition reason reported for this failure
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::MissingModels => "MissingModels",
            ValidationError::EmptyModelName => "InvalidModelName",
            ValidationError::InvalidPort(_) => "InvalidPort",
            ValidationError::UnsupportedType(_) => "UnsupportedType",
        }
    }
}
