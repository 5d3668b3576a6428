use thiserror::Error;

/// Structural problems in a manifest. Always fatal: nothing runs when the
/// manifest fails to parse.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("manifest is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("manifest root must be a mapping")]
    NotAMapping,

    #[error("missing required phase '{0}'")]
    MissingPhase(String),

    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("malformed merge in {location}: {reason}")]
    MalformedMerge { location: String, reason: String },

    #[error("job {second} duplicates job {first}")]
    DuplicateJob { first: usize, second: usize },

    #[error("manifest declares no runtime versions and no jobs")]
    EmptyMatrix,

    #[error("job {0} has no runtime version and the manifest declares none")]
    UnresolvedRuntime(usize),
}

#[derive(Debug, Error)]
pub enum CirunError {
    #[error("manifest not found: {0}")]
    ManifestNotFound(String),

    #[error("report not found: {0}")]
    ReportNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CirunError>;
