//! Error types for the shopping agents

use thiserror::Error;
use tower::BoxError;

/// Result type alias for the shopping agents
pub type Result<T> = std::result::Result<T, ShopError>;

/// Main error type for the shopping agents.
///
/// Domain dead-ends (an empty order at checkout, a missing card, removing an
/// item that is not in the cart) are *not* errors: tools answer them in
/// character. Everything here is either a wiring defect or a collaborator
/// failure the hosting layer has to decide about.
#[derive(Debug, Error)]
pub enum ShopError {
    /// Transfer target is not in the agent registry
    #[error("Invalid transition: no agent named '{target}' is registered")]
    InvalidTransition { target: String },

    /// The model asked for a tool the active agent does not expose
    #[error("Unknown tool '{tool}' for agent '{agent}'")]
    UnknownTool { agent: String, tool: String },

    /// The model produced arguments that do not fit the tool's schema
    #[error("Invalid arguments for tool '{tool}': {source}")]
    ToolArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    /// A turn was submitted before `Session::start`
    #[error("Session has not been started")]
    NotStarted,

    /// The model kept calling tools past the per-turn budget
    #[error("Maximum tool steps exceeded: {max_steps}")]
    MaxToolStepsExceeded { max_steps: usize },

    /// Failure reported by the language, messaging, or I/O collaborator
    #[error("Collaborator failure: {0}")]
    Collaborator(BoxError),

    /// Error from the OpenAI API
    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    /// Snapshot rendering error
    #[error("Snapshot error: {0}")]
    SnapshotError(#[from] serde_yaml::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ShopError {
    /// Wrap a collaborator failure.
    pub fn collaborator(err: impl Into<BoxError>) -> Self {
        ShopError::Collaborator(err.into())
    }

    /// True when the error comes from outside the core and a retry of the
    /// same turn may succeed.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, ShopError::Collaborator(_) | ShopError::OpenAIError(_))
    }
}
