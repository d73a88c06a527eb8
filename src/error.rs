/// Errors returned by the calibration pipeline and its I/O helpers.
#[derive(thiserror::Error, Debug)]
pub enum CalibError {
    #[error("no image produced a complete set of chessboard corners")]
    InsufficientData,
    #[error("invalid sensor specification: {0}")]
    InvalidSensorSpec(String),
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("calibration solver failed: {0}")]
    SolverFailure(String),
    #[error("mismatched input shapes: {0}")]
    ShapeMismatch(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Glob(#[from] glob::PatternError),
}

pub type Result<T> = std::result::Result<T, CalibError>;
