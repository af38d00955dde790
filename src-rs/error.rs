use thiserror::Error;

/// Failure causes of a single orchestration pass.
///
/// None of these are recovered locally: they travel up to the driver's
/// top-level handler, which logs them and ends the pass.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Missing or invalid provider / tool-server settings. Raised before any network activity.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The model client could not be built, or the provider rejected the endpoint or credentials.
    #[error("client initialization error: {0}")]
    ClientInitialization(String),

    /// The tool server was unreachable or returned a malformed tool list.
    #[error("tool discovery error: {0}")]
    ToolDiscovery(String),

    /// A registered function call failed, or the model request itself failed.
    #[error("invocation error: {0}")]
    Invocation(String),

    /// The shutdown signal was observed while an operation was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

impl HarnessError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HarnessError::Cancelled)
    }

    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Configuration(_) => "ConfigurationError",
            HarnessError::ClientInitialization(_) => "ClientInitializationError",
            HarnessError::ToolDiscovery(_) => "ToolDiscoveryError",
            HarnessError::Invocation(_) => "InvocationError",
            HarnessError::Cancelled => "CancellationError",
        }
    }
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
