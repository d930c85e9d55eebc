//! Engine session orchestration.
//!
//! `EngineSession` drives open/setup/start/stop/close against the remote
//! engine. Every command returns immediately; its outcome arrives later on
//! the callback channel and is routed through `handle_event`, which gates
//! each event on the current state so completions from a superseded
//! operation never act. The session owns the connection handle exclusively
//! and is created and destroyed explicitly, one per consumer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use platelink_core::error::{PlatelinkError, Result};
use platelink_core::events::EngineEvent;
use platelink_core::params::{DeviceParams, RecognitionParams};
use platelink_core::types::EngineStatus;
use platelink_engine::{AvailabilityProbe, EngineLink};

use crate::dispatch::{ResultDispatcher, ResultSink};
use crate::state::{SessionState, StateMachine};
use crate::store::ParameterStore;

/// Consumer-side view of the session lifecycle, one method per engine
/// event. All methods have empty default bodies so a consumer implements
/// only what it cares about.
///
/// Each completion method carries the engine's status; `on_engine_failure`
/// is additionally invoked for anything that went wrong asynchronously —
/// `PlatelinkError::Engine` for a completion with a failure status,
/// `PlatelinkError::Disconnected` when the engine process dies — so a
/// consumer can centralize error handling on the one taxonomy without
/// matching every event.
pub trait SessionListener: Send + Sync {
    fn on_opened(&self, _status: EngineStatus) {}
    fn on_setup_complete(&self, _status: EngineStatus) {}
    fn on_started(&self, _status: EngineStatus) {}
    fn on_stopped(&self, _status: EngineStatus) {}
    fn on_closed(&self, _status: EngineStatus) {}
    fn on_settings_changed(&self, _device: DeviceParams, _recognition: RecognitionParams) {}
    fn on_disconnected(&self) {}
    fn on_engine_failure(&self, _operation: &'static str, _error: PlatelinkError) {}
}

/// The session state machine and its result-delivery pipeline.
///
/// Commands are validated against the current state and rejected
/// synchronously when illegal — never queued. Racing commands (e.g.
/// `begin_recognition` vs. `close`) are therefore resolved by whichever
/// transition lands first; the loser gets `InvalidState`.
pub struct EngineSession {
    link: Arc<dyn EngineLink>,
    probe: Arc<dyn AvailabilityProbe>,
    state: StateMachine,
    store: ParameterStore,
    dispatcher: ResultDispatcher,
    listener: Mutex<Option<Arc<dyn SessionListener>>>,
    auto_setup: bool,
    epoch: AtomicU64,
}

impl EngineSession {
    /// Create a session against the given engine link and probe.
    /// The session starts in `Closed` with auto-setup enabled.
    pub fn new(link: Arc<dyn EngineLink>, probe: Arc<dyn AvailabilityProbe>) -> Self {
        Self {
            link,
            probe,
            state: StateMachine::new(),
            store: ParameterStore::new(),
            dispatcher: ResultDispatcher::new(),
            listener: Mutex::new(None),
            auto_setup: true,
            epoch: AtomicU64::new(0),
        }
    }

    /// Disable or re-enable the automatic `setup` issued after a
    /// successful open.
    pub fn with_auto_setup(mut self, auto_setup: bool) -> Self {
        self.auto_setup = auto_setup;
        self
    }

    /// Returns the current session state.
    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// True iff recognition is running right now.
    pub fn is_recognition_running(&self) -> bool {
        self.state.current() == SessionState::Recognizing
    }

    /// Independent copies of the last-known-good engine configuration.
    pub fn params(&self) -> (DeviceParams, RecognitionParams) {
        self.store.snapshot()
    }

    /// The result-delivery pipeline, exposed for its counters.
    pub fn dispatcher(&self) -> &ResultDispatcher {
        &self.dispatcher
    }

    /// Register the sink recognition batches are forwarded to.
    pub fn register_sink(&self, sink: Arc<dyn ResultSink>) {
        self.dispatcher.register_sink(sink);
    }

    /// Drop the result sink; subsequent batches are discarded.
    pub fn clear_sink(&self) {
        self.dispatcher.clear_sink();
    }

    /// Open a connection to the engine.
    ///
    /// Fails with `NotInstalled` before any engine call if the probe
    /// reports the engine absent, and with `AlreadyOpen` when the session
    /// is not `Closed`. Otherwise transitions to `Opening` and issues the
    /// open command; the outcome arrives as `EngineEvent::Opened`.
    pub fn open(&self, listener: Arc<dyn SessionListener>) -> Result<()> {
        self.open_with(listener)
    }

    /// Re-run the open sequence with the listener retained from a
    /// previous session, e.g. after a disconnect or after the external
    /// configurator exits. Rejected with `AlreadyOpen` unless `Closed`.
    pub fn reconnect(&self) -> Result<()> {
        let retained = self
            .listener
            .lock()
            .expect("listener mutex poisoned")
            .clone();
        match retained {
            Some(listener) => self.open_with(listener),
            None => Err(PlatelinkError::InvalidState {
                operation: "reconnect",
                state: "Closed with no retained listener".to_string(),
            }),
        }
    }

    fn open_with(&self, listener: Arc<dyn SessionListener>) -> Result<()> {
        if !self.probe.is_available() {
            return Err(PlatelinkError::NotInstalled);
        }
        self.state
            .transition(SessionState::Opening)
            .map_err(|_| PlatelinkError::AlreadyOpen)?;

        *self.listener.lock().expect("listener mutex poisoned") = Some(listener);
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(epoch, "Opening engine session");

        self.link.open().map_err(|e| self.transport_reset(e))
    }

    /// Start recognition with the supplied parameters. Valid only from
    /// `Ready`; completion arrives as `EngineEvent::Started`.
    pub fn begin_recognition(&self, recognition: RecognitionParams) -> Result<()> {
        let current = self.state.current();
        if current != SessionState::Ready {
            return Err(PlatelinkError::InvalidState {
                operation: "begin_recognition",
                state: current.to_string(),
            });
        }
        self.state
            .transition(SessionState::Configuring)
            .map_err(|_| PlatelinkError::InvalidState {
                operation: "begin_recognition",
                state: self.state.current().to_string(),
            })?;

        self.link
            .begin_recognition(recognition)
            .map_err(|e| self.transport_reset(e))
    }

    /// Stop recognition. Valid only from `Recognizing`; completion arrives
    /// as `EngineEvent::Stopped`.
    pub fn end_recognition(&self) -> Result<()> {
        let current = self.state.current();
        if current != SessionState::Recognizing {
            return Err(PlatelinkError::InvalidState {
                operation: "end_recognition",
                state: current.to_string(),
            });
        }
        self.state
            .transition(SessionState::Stopping)
            .map_err(|_| PlatelinkError::InvalidState {
                operation: "end_recognition",
                state: self.state.current().to_string(),
            })?;

        self.link.end_recognition().map_err(|e| self.transport_reset(e))
    }

    /// Tear the session down. Valid from any state except `Closed`;
    /// idempotent while a close is already in flight. Honored even during
    /// `Opening`, `Configuring`, or `Recognizing` — completions of the
    /// superseded operation are discarded once the session is `Closing`.
    pub fn close(&self) -> Result<()> {
        match self.state.current() {
            SessionState::Closing => {
                tracing::debug!("Close already in progress");
                Ok(())
            }
            SessionState::Closed => Err(PlatelinkError::InvalidState {
                operation: "close",
                state: SessionState::Closed.to_string(),
            }),
            current => {
                self.state
                    .transition(SessionState::Closing)
                    .map_err(|_| PlatelinkError::InvalidState {
                        operation: "close",
                        state: self.state.current().to_string(),
                    })?;
                tracing::info!(from = %current, "Closing engine session");
                self.link.close().map_err(|e| self.transport_reset(e))
            }
        }
    }

    /// A transport error means the link itself is unusable: reset to the
    /// initial state so a fresh `open()` can be attempted.
    fn transport_reset(&self, err: PlatelinkError) -> PlatelinkError {
        tracing::warn!(error = %err, "Engine link unusable; resetting session");
        self.state.reset();
        err
    }

    fn notify<F: FnOnce(&dyn SessionListener)>(&self, f: F) {
        let listener = self
            .listener
            .lock()
            .expect("listener mutex poisoned")
            .clone();
        if let Some(listener) = listener {
            f(listener.as_ref());
        }
    }

    fn surface_failure(&self, operation: &'static str, status: EngineStatus) {
        tracing::warn!(operation, code = status.code(), "Engine reported failure");
        self.notify(|l| l.on_engine_failure(operation, PlatelinkError::Engine(status)));
    }

    /// Process one event from the engine callback channel.
    ///
    /// Dispatch is keyed on the current state: an event that is illegal
    /// for the state the session is in right now (typically a completion
    /// of a superseded operation) is ignored with a debug log.
    pub fn handle_event(&self, event: EngineEvent) {
        let state = self.state.current();
        let name = event.event_name();

        match event {
            EngineEvent::Opened {
                status,
                device,
                recognition,
                recognizing,
            } => {
                if state != SessionState::Opening {
                    tracing::debug!(event = name, %state, "Ignoring stale event");
                    return;
                }
                if status.is_success() {
                    self.store.sync_from(device.clone(), recognition);
                    let _ = self.state.transition(SessionState::Ready);
                    self.notify(|l| l.on_opened(status));
                    // The engine may already be recognizing for another
                    // consumer; only configure it when it reports idle.
                    if self.auto_setup && !recognizing {
                        if let Err(e) = self.link.setup(device) {
                            tracing::warn!(error = %e, "Post-open setup could not be issued");
                        }
                    }
                } else {
                    let _ = self.state.transition(SessionState::Failed);
                    self.notify(|l| l.on_opened(status));
                    self.surface_failure("opened", status);
                }
            }

            EngineEvent::SetupComplete { status, device } => {
                if !matches!(
                    state,
                    SessionState::Ready
                        | SessionState::Configuring
                        | SessionState::Recognizing
                        | SessionState::Stopping
                ) {
                    tracing::debug!(event = name, %state, "Ignoring stale event");
                    return;
                }
                if status.is_success() {
                    self.store.sync_device(device);
                } else {
                    self.surface_failure("setup_complete", status);
                }
                self.notify(|l| l.on_setup_complete(status));
            }

            EngineEvent::Started { status } => {
                if state != SessionState::Configuring {
                    tracing::debug!(event = name, %state, "Ignoring stale event");
                    return;
                }
                if status.is_success() {
                    let _ = self.state.transition(SessionState::Recognizing);
                } else {
                    let _ = self.state.transition(SessionState::Ready);
                    self.surface_failure("started", status);
                }
                self.notify(|l| l.on_started(status));
            }

            EngineEvent::Stopped { status } => {
                if state != SessionState::Stopping {
                    tracing::debug!(event = name, %state, "Ignoring stale event");
                    return;
                }
                let _ = self.state.transition(SessionState::Ready);
                if !status.is_success() {
                    self.surface_failure("stopped", status);
                }
                self.notify(|l| l.on_stopped(status));
            }

            EngineEvent::Result { status, batch } => {
                if state != SessionState::Recognizing {
                    tracing::debug!(event = name, %state, "Ignoring stale event");
                    return;
                }
                if status.is_success() {
                    self.dispatcher.deliver(batch);
                } else {
                    tracing::debug!(code = status.code(), "Skipping failed result batch");
                }
            }

            EngineEvent::SettingsChanged {
                device,
                recognition,
            } => {
                if !matches!(
                    state,
                    SessionState::Ready
                        | SessionState::Configuring
                        | SessionState::Recognizing
                        | SessionState::Stopping
                ) {
                    tracing::debug!(event = name, %state, "Ignoring stale event");
                    return;
                }
                self.store.sync_from(device.clone(), recognition.clone());
                self.notify(|l| l.on_settings_changed(device, recognition));
            }

            EngineEvent::Closed { status } => {
                if state != SessionState::Closing {
                    tracing::debug!(event = name, %state, "Ignoring stale event");
                    return;
                }
                let _ = self.state.transition(SessionState::Closed);
                // Release the listener; exactly one on_closed per close.
                let listener = self
                    .listener
                    .lock()
                    .expect("listener mutex poisoned")
                    .take();
                tracing::info!("Engine session closed");
                if let Some(listener) = listener {
                    listener.on_closed(status);
                }
            }

            EngineEvent::Disconnected => {
                if state == SessionState::Closed {
                    tracing::debug!(event = name, %state, "Ignoring stale event");
                    return;
                }
                // Hard reset, discarding any pending command. The listener
                // is retained so reconnect() can re-run the open sequence.
                self.state.reset();
                self.notify(|l| l.on_disconnected());
                self.notify(|l| l.on_engine_failure("disconnect", PlatelinkError::Disconnected));
            }

            // `EngineEvent` is #[non_exhaustive]; all current variants are
            // handled above.
            _ => {
                tracing::debug!(event = name, %state, "Ignoring unknown event");
            }
        }
    }

    /// Wire an engine event receiver to `handle_event` on a tokio task.
    pub fn spawn_event_pump(
        self: &Arc<Self>,
        mut receiver: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                tracing::trace!(event = event.event_name(), "Engine event received");
                session.handle_event(event);
            }
            tracing::debug!("Engine event channel closed; pump finished");
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
