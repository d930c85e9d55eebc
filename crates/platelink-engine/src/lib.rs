//! Platelink Engine crate - the boundary to the out-of-process ANPR engine.
//!
//! Provides the `EngineLink` command trait, the availability probe that
//! checks the local package registry before a session is created, and a
//! `MockEngine` that emulates the remote service's callback protocol for
//! tests and platforms without the real engine installed.

pub mod mock;
pub mod probe;

use platelink_core::error::Result;
use platelink_core::params::{DeviceParams, RecognitionParams};

pub use mock::{MockEngine, MockEngineConfig};
pub use probe::{AvailabilityProbe, FixedProbe, RegistryProbe};

/// Command surface of the remote recognition engine.
///
/// Every command is fire-and-forget: it must return immediately, and its
/// outcome arrives later as an `EngineEvent` on the callback channel. An
/// `Err` here means only that the command could not be handed to the
/// engine (transport failure), never that the operation itself failed.
///
/// Param arguments are taken by value; the engine keeps its own copy and
/// the caller keeps theirs.
pub trait EngineLink: Send + Sync {
    /// Request a connection. Completion: `EngineEvent::Opened`.
    fn open(&self) -> Result<()>;

    /// Apply device configuration. Completion: `EngineEvent::SetupComplete`.
    fn setup(&self, device: DeviceParams) -> Result<()>;

    /// Start recognition. Completion: `EngineEvent::Started`, followed by a
    /// stream of `EngineEvent::Result` while recognition runs.
    fn begin_recognition(&self, recognition: RecognitionParams) -> Result<()>;

    /// Stop recognition. Completion: `EngineEvent::Stopped`.
    fn end_recognition(&self) -> Result<()>;

    /// Tear the connection down. Completion: `EngineEvent::Closed`.
    fn close(&self) -> Result<()>;
}
