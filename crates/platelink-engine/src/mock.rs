//! In-process mock of the remote ANPR engine.
//!
//! Emulates the service's callback protocol: every command is answered with
//! the matching completion event on the event channel, and while recognition
//! runs a background task streams synthetic result batches. Failure statuses
//! and a simulated process death are scriptable, which is what the session
//! tests and the demo binary run against.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use platelink_core::error::{PlatelinkError, Result};
use platelink_core::events::EngineEvent;
use platelink_core::params::{DeviceParams, RecognitionParams};
use platelink_core::types::{
    Confidence, EngineStatus, FrameSnapshot, PlateRead, PlateRect, PlateText, ResultBatch,
};

use crate::EngineLink;

/// Scripted behavior for the mock engine.
#[derive(Debug, Clone)]
pub struct MockEngineConfig {
    /// Status reported on the `opened` completion.
    pub open_status: EngineStatus,
    /// Status reported on the `started` completion.
    pub start_status: EngineStatus,
    /// Interval between synthetic result batches while recognizing.
    pub result_interval: Duration,
    /// Plate reads per synthetic batch.
    pub reads_per_batch: usize,
}

impl Default for MockEngineConfig {
    fn default() -> Self {
        Self {
            open_status: EngineStatus::Success,
            start_status: EngineStatus::Success,
            result_interval: Duration::from_millis(50),
            reads_per_batch: 1,
        }
    }
}

/// Mock engine holding the sender side of the callback channel.
///
/// The engine keeps its own authoritative copies of the configuration
/// blobs; event payloads are clones of those, never shared references.
pub struct MockEngine {
    config: MockEngineConfig,
    events: mpsc::UnboundedSender<EngineEvent>,
    device: Arc<Mutex<DeviceParams>>,
    recognition: Arc<Mutex<RecognitionParams>>,
    running: Arc<AtomicBool>,
    plate_counter: Arc<AtomicU64>,
}

impl MockEngine {
    /// Create a mock engine and the receiver end of its event channel.
    pub fn new(config: MockEngineConfig) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            config,
            events: tx,
            device: Arc::new(Mutex::new(DeviceParams::default())),
            recognition: Arc::new(Mutex::new(RecognitionParams::default())),
            running: Arc::new(AtomicBool::new(false)),
            plate_counter: Arc::new(AtomicU64::new(0)),
        };
        (engine, rx)
    }

    /// Simulate the engine process dying. Stops any result stream and
    /// emits a single `Disconnected` event.
    pub fn kill(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.events.send(EngineEvent::Disconnected);
    }

    /// Simulate an out-of-band settings change (e.g. the engine's own
    /// configuration screen). Emits `SettingsChanged` with copies of the
    /// new authoritative params.
    pub fn change_settings(&self, device: DeviceParams, recognition: RecognitionParams) {
        *self.device.lock().expect("device mutex poisoned") = device.clone();
        *self.recognition.lock().expect("recognition mutex poisoned") = recognition.clone();
        let _ = self.events.send(EngineEvent::SettingsChanged {
            device,
            recognition,
        });
    }

    /// Inject a raw event, for driving edge cases in tests.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    fn send(&self, event: EngineEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| PlatelinkError::Transport("engine event channel closed".to_string()))
    }

    fn synthetic_batch(counter: &AtomicU64, reads_per_batch: usize) -> ResultBatch {
        let reads = (0..reads_per_batch)
            .map(|_| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                PlateRead {
                    plate: PlateText::new(format!("MK{:02} TST", n % 100)),
                    confidence: Confidence::new(0.85),
                    region: PlateRect {
                        x: 100,
                        y: 200,
                        width: 160,
                        height: 48,
                    },
                }
            })
            .collect();
        ResultBatch::new(
            reads,
            FrameSnapshot {
                width: 1280,
                height: 720,
                data: Vec::new(),
            },
        )
    }
}

impl EngineLink for MockEngine {
    fn open(&self) -> Result<()> {
        let device = self.device.lock().expect("device mutex poisoned").clone();
        let recognition = self
            .recognition
            .lock()
            .expect("recognition mutex poisoned")
            .clone();
        self.send(EngineEvent::Opened {
            status: self.config.open_status,
            device,
            recognition,
            recognizing: self.running.load(Ordering::SeqCst),
        })
    }

    fn setup(&self, device: DeviceParams) -> Result<()> {
        *self.device.lock().expect("device mutex poisoned") = device.clone();
        self.send(EngineEvent::SetupComplete {
            status: EngineStatus::Success,
            device,
        })
    }

    fn begin_recognition(&self, recognition: RecognitionParams) -> Result<()> {
        if !self.config.start_status.is_success() {
            return self.send(EngineEvent::Started {
                status: self.config.start_status,
            });
        }

        *self.recognition.lock().expect("recognition mutex poisoned") = recognition;
        self.running.store(true, Ordering::SeqCst);
        self.send(EngineEvent::Started {
            status: EngineStatus::Success,
        })?;

        // Stream synthetic batches until stopped. Requires a tokio runtime.
        let events = self.events.clone();
        let running = Arc::clone(&self.running);
        let counter = Arc::clone(&self.plate_counter);
        let interval = self.config.result_interval;
        let reads_per_batch = self.config.reads_per_batch;
        tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                tokio::time::sleep(interval).await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let batch = MockEngine::synthetic_batch(&counter, reads_per_batch);
                if events
                    .send(EngineEvent::Result {
                        status: EngineStatus::Success,
                        batch,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });
        Ok(())
    }

    fn end_recognition(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        self.send(EngineEvent::Stopped {
            status: EngineStatus::Success,
        })
    }

    fn close(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        self.send(EngineEvent::Closed {
            status: EngineStatus::Success,
        })
    }
}
