use serde::{Deserialize, Serialize};

use crate::params::{DeviceParams, RecognitionParams};
use crate::types::{EngineStatus, ResultBatch};

/// Events delivered asynchronously by the engine over the callback channel.
///
/// Every session command has a matching completion variant; `Result`,
/// `SettingsChanged`, and `Disconnected` are unsolicited. Param payloads
/// are engine-authoritative copies — the session mirrors them into its
/// parameter store and never hands out the same instance twice.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EngineEvent {
    /// Completion of `open()`. Carries the engine's current configuration
    /// and whether it is already recognizing (for another consumer).
    Opened {
        status: EngineStatus,
        device: DeviceParams,
        recognition: RecognitionParams,
        recognizing: bool,
    },

    /// Completion of `setup()`. Carries the device params actually applied.
    SetupComplete {
        status: EngineStatus,
        device: DeviceParams,
    },

    /// Completion of `begin_recognition()`.
    Started { status: EngineStatus },

    /// Completion of `end_recognition()`.
    Stopped { status: EngineStatus },

    /// Completion of `close()`.
    Closed { status: EngineStatus },

    /// One recognition event's plate reads plus the associated frame.
    Result {
        status: EngineStatus,
        batch: ResultBatch,
    },

    /// The engine's configuration changed out-of-band (e.g. via its own
    /// settings screen).
    SettingsChanged {
        device: DeviceParams,
        recognition: RecognitionParams,
    },

    /// The engine process terminated unexpectedly.
    Disconnected,
}

impl EngineEvent {
    /// Returns a stable event name for structured logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            EngineEvent::Opened { .. } => "opened",
            EngineEvent::SetupComplete { .. } => "setup_complete",
            EngineEvent::Started { .. } => "started",
            EngineEvent::Stopped { .. } => "stopped",
            EngineEvent::Closed { .. } => "closed",
            EngineEvent::Result { .. } => "result",
            EngineEvent::SettingsChanged { .. } => "settings_changed",
            EngineEvent::Disconnected => "disconnected",
        }
    }
}
