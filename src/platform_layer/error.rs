// Represents errors that can occur within the platform abstraction layer.
//
// This enum centralizes error handling for the event loop and the execution
// of `PlatformCommand`s, such as commands that name a window that is not open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Failure during the initialization of the platform layer or its components.
    InitializationFailed(String),
    /// An invalid handle (e.g., `WindowId`, `SlotId`) was used.
    InvalidHandle(String),
    /// A requested operation could not be completed.
    OperationFailed(String),
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::InitializationFailed(s) => write!(f, "Initialization Failed: {s}"),
            PlatformError::InvalidHandle(s) => write!(f, "Invalid Handle: {s}"),
            PlatformError::OperationFailed(s) => write!(f, "Operation Failed: {s}"),
        }
    }
}

impl std::error::Error for PlatformError {}

/// A specialized `Result` type for platform layer operations.
pub type Result<T> = std::result::Result<T, PlatformError>;
