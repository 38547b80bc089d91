//! Errors that can occur while computing, storing, or coloring a fractal.

/// Errors that can occur during execution.
///
/// None of these are recoverable where they are detected;
/// they propagate up to whoever started the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration: a bad bounding box, too few samples, and so on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a fractal file, or its contents are damaged or truncated.
    #[error("corrupt file: {0}")]
    Corrupt(String),

    #[error("unsupported file version {found:#010x} (expected {expected:#010x})")]
    UnsupportedVersion { expected: u32, found: u32 },

    /// A writer was driven out of order.
    #[error("writer state error: {0}")]
    WriterState(String),

    #[error("incorrect number of rows: expected {expected}, got {actual}")]
    RowCount { expected: usize, actual: usize },

    #[error("incorrect row width: expected {expected}, got {actual}")]
    RowWidth { expected: usize, actual: usize },

    /// Malformed colorizer argument string, or a value that failed coercion.
    #[error("bad colorizer argument: {0}")]
    Argument(String),

    /// A colorizer hook failed, or the colorizer could not be found.
    #[error("colorizer failed in {hook}: {message}")]
    Colorizer { hook: &'static str, message: String },

    #[error("invalid color: {0}")]
    InvalidColor(String),

    #[error("internal error: {0}")]
    Internal(String),
}
