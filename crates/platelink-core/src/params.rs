//! Engine-authoritative configuration blobs.
//!
//! The engine is the source of truth for both structs: the client never
//! validates them and only mirrors the copies delivered on `opened`,
//! `setup_complete`, and `settings_changed` events. Every cross-boundary
//! transfer is a value copy (`Clone` is the deep copy); the client and the
//! engine never share a reference to the same instance.

use serde::{Deserialize, Serialize};

use crate::types::PlateRect;

/// Camera/device settings recognized by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceParams {
    /// Capture width in pixels.
    pub width: u32,
    /// Capture height in pixels.
    pub height: u32,
    /// Capture frames per second.
    pub fps: f64,
    /// Focus mode: "auto", "continuous", or "fixed".
    pub focus_mode: String,
    /// Whether the torch/flash is enabled.
    pub flash: bool,
    /// Sensor rotation in degrees (0, 90, 180, 270).
    pub rotation_degrees: u16,
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30.0,
            focus_mode: "continuous".to_string(),
            flash: false,
            rotation_degrees: 0,
        }
    }
}

/// Recognition behavior settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionParams {
    /// Plate syntax preset, e.g. "eu", "us", "generic".
    pub country: String,
    /// Reads below this confidence are dropped by the engine.
    pub min_confidence: f64,
    /// Maximum plate reads reported per frame.
    pub max_plates_per_frame: u32,
    /// A plate re-read within this window is suppressed as a duplicate.
    pub duplicate_window_ms: u32,
    /// Regions of interest in frame coordinates. Empty means full frame.
    pub regions: Vec<PlateRect>,
}

impl Default for RecognitionParams {
    fn default() -> Self {
        Self {
            country: "eu".to_string(),
            min_confidence: 0.6,
            max_plates_per_frame: 4,
            duplicate_window_ms: 2000,
            regions: Vec::new(),
        }
    }
}
