use thiserror::Error;

#[derive(Error, Debug)]
pub enum PbpkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Physiologically inconsistent parameter set, detected at resolve time.
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// Failed derivative evaluation (bad volume, non-finite or unstable amounts).
    #[error("Domain error: {0}")]
    Domain(String),

    /// Missing or unknown inputs for the selected model variant.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Integration error: {0}")]
    Integration(String),
}

impl PbpkError {
    pub fn is_domain(&self) -> bool {
        matches!(self, PbpkError::Domain(_))
    }
}

pub type PbpkResult<T> = Result<T, PbpkError>;
