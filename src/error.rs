use thiserror::Error;

/// Result type used across the library.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Used when the user pass a logical invalid parameter to a function.
    #[error("Parameter error: {0}")]
    InvalidParameter(String),

    /// A trajectory id that has no directory under the dataset root.
    #[error("Unknown trajectory: {0}")]
    UnknownTrajectory(String),

    /// A dataset name that does not map to any known configuration.
    #[error("Unknown dataset type: {0}")]
    UnknownDataset(String),

    /// Malformed tabular input.
    #[error("Parser error: {0}")]
    Parser(String),

    /// A relative pose record that can't be composed.
    #[error("Invalid record at position {position}: {reason}")]
    InvalidRecord { position: usize, reason: String },

    /// Predictor output that doesn't match the ground-truth rows.
    #[error("Malformed prediction: {0}")]
    MalformedPrediction(String),

    /// Nothing to aggregate where data is mandatory.
    #[error("No data: {0}")]
    NoData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl EvalError {
    /// Create a error with the kind `InvalidParameter`.
    /// # Arguments
    /// * `msg` - The error message.
    pub fn invalid_parameter<T: ToString>(msg: T) -> Self {
        EvalError::InvalidParameter(msg.to_string())
    }

    /// Create a error with the kind `NoData`.
    pub fn no_data<T: ToString>(msg: T) -> Self {
        EvalError::NoData(msg.to_string())
    }

    /// Whether the error belongs to the configuration family, raised at assembly time.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EvalError::InvalidParameter(_)
                | EvalError::UnknownTrajectory(_)
                | EvalError::UnknownDataset(_)
        )
    }
}
