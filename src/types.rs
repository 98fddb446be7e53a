use ndarray::Array2;

/// Elevation sample. `NaN` marks a void (no-data) cell.
pub type Elevation = f32;

/// 2D elevation array (rows x cols), row 0 is the northernmost row
pub type ElevationArray = Array2<Elevation>;

/// 2D ARGB image (rows x cols), fully transparent pixels are 0
pub type ArgbImage = Array2<u32>;

/// Error types for grid processing
#[derive(Debug, thiserror::Error)]
pub enum ReliefError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    #[error("Invalid grid header: {0}")]
    InvalidHeader(String),

    #[error("Corrupt grid: {0}")]
    CorruptGrid(String),
}

impl ReliefError {
    /// True for precondition violations on arguments, including shape mismatches.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            ReliefError::InvalidArgument(_) | ReliefError::ShapeMismatch { .. }
        )
    }
}

/// Result type for grid operations
pub type ReliefResult<T> = Result<T, ReliefError>;
