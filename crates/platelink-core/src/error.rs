use thiserror::Error;

use crate::types::EngineStatus;

/// Top-level error type for the Platelink client.
///
/// Subsystem crates return this directly; the `?` operator works across
/// crate boundaries via the `From` impls below. State-machine misuse
/// (`InvalidState`, `AlreadyOpen`) is always detected synchronously —
/// those variants are never delivered through the listener.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlatelinkError {
    /// The recognition engine package is not installed or is disabled.
    /// Recoverable: trigger the install flow and retry.
    #[error("Recognition engine is not installed")]
    NotInstalled,

    /// `open()` was called while a session is already open or opening.
    #[error("Session is already open")]
    AlreadyOpen,

    /// A command was issued that is illegal for the current session state.
    /// The command has no side effect.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// The engine reported a failure status on a completion event.
    #[error("Engine reported failure (status code {})", .0.code())]
    Engine(EngineStatus),

    /// The engine process terminated unexpectedly. The session has been
    /// reset to its initial state; a fresh `open()` is required.
    #[error("Engine process disconnected")]
    Disconnected,

    /// A command could not be handed to the engine link.
    #[error("Engine transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for PlatelinkError {
    fn from(err: toml::de::Error) -> Self {
        PlatelinkError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PlatelinkError {
    fn from(err: toml::ser::Error) -> Self {
        PlatelinkError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PlatelinkError {
    fn from(err: serde_json::Error) -> Self {
        PlatelinkError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Platelink operations.
pub type Result<T> = std::result::Result<T, PlatelinkError>;
