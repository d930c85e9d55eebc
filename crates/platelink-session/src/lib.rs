//! Platelink Session - client-side lifecycle management for a remote
//! plate-recognition engine.
//!
//! The session layer owns the state machine that sequences the engine's
//! asynchronous command/completion protocol, mirrors the engine's
//! authoritative configuration, and fans recognition results out to the
//! consumer without ever blocking the callback path.

pub mod dispatch;
pub mod session;
pub mod state;
pub mod store;

pub use dispatch::{ResultDispatcher, ResultSink};
pub use session::{EngineSession, SessionListener};
pub use state::{SessionState, StateMachine};
pub use store::ParameterStore;
