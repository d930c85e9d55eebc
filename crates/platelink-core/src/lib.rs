//! Platelink Core crate - shared types for the plate-recognition client.
//!
//! Holds the data model (statuses, plate reads, result batches), the
//! engine parameter blobs, the engine event protocol, the error taxonomy,
//! and TOML configuration. Everything here is plain data; behavior lives
//! in the engine and session crates.

pub mod config;
pub mod error;
pub mod events;
pub mod params;
pub mod types;

pub use config::PlatelinkConfig;
pub use error::{PlatelinkError, Result};
pub use events::EngineEvent;
pub use params::{DeviceParams, RecognitionParams};
pub use types::*;
