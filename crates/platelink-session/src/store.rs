//! Local mirror of the engine-authoritative configuration.
//!
//! The store is mutated from multiple callback contexts (open-complete,
//! setup-complete, settings-changed), so every update is a full overwrite
//! under one lock acquisition: readers can never observe a half-updated
//! pair of params. Snapshots are independent deep copies — mutating a
//! snapshot never leaks back into the store or the engine.

use std::sync::{Arc, Mutex};

use platelink_core::params::{DeviceParams, RecognitionParams};

#[derive(Debug, Clone, Default)]
struct Params {
    device: DeviceParams,
    recognition: RecognitionParams,
}

/// Last-known-good device and recognition parameters.
///
/// Cloning shares the underlying storage. The consumer may read via
/// `snapshot()` but must not write; only session event handling calls the
/// sync methods, keeping the mirror aligned with the engine.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    inner: Arc<Mutex<Params>>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite both blobs in a single mutation.
    pub fn sync_from(&self, device: DeviceParams, recognition: RecognitionParams) {
        let mut inner = self.inner.lock().expect("params mutex poisoned");
        *inner = Params {
            device,
            recognition,
        };
    }

    /// Overwrite the device blob only (setup completions carry no
    /// recognition params).
    pub fn sync_device(&self, device: DeviceParams) {
        let mut inner = self.inner.lock().expect("params mutex poisoned");
        inner.device = device;
    }

    /// Returns independent copies of both blobs.
    pub fn snapshot(&self) -> (DeviceParams, RecognitionParams) {
        let inner = self.inner.lock().expect("params mutex poisoned");
        (inner.device.clone(), inner.recognition.clone())
    }
}
