use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Status
// =============================================================================

/// Status reported by the engine on every completion and result event.
///
/// The engine's taxonomy is open-ended: anything other than `Success`
/// arrives as a numeric failure code the consumer can inspect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Success,
    Failure(u32),
}

impl EngineStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, EngineStatus::Success)
    }

    /// Returns the numeric status code. `Success` is 0.
    pub fn code(&self) -> u32 {
        match self {
            EngineStatus::Success => 0,
            EngineStatus::Failure(code) => *code,
        }
    }
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Recognition confidence. Range: 0.0 (no confidence) to 1.0 (certain).
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Confidence(pub f64);

impl Confidence {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }
}

/// Normalized plate text (e.g. "AB12 CDE"). Truncated to 32 characters
/// on creation; no real plate format exceeds that.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlateText(pub String);

impl PlateText {
    pub fn new(text: String) -> Self {
        // Engine text is opaque and may be non-ASCII; cut on a char
        // boundary, never a byte index.
        match text.char_indices().nth(32) {
            Some((idx, _)) => Self(text[..idx].to_string()),
            None => Self(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

// =============================================================================
// Recognition output
// =============================================================================

/// Plate bounding box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One detected plate read. Immutable once produced by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlateRead {
    pub plate: PlateText,
    pub confidence: Confidence,
    pub region: PlateRect,
}

/// The image snapshot attached to a result batch.
///
/// Raw frame bytes are excluded from JSON serialization; they exist only
/// for in-process hand-off to the consumer sink.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// One recognition event's output: an ordered sequence of plate reads plus
/// the frame they were detected in. Produced atomically by the engine and
/// consumed exactly once by the result dispatcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultBatch {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub reads: Vec<PlateRead>,
    pub frame: FrameSnapshot,
}

impl ResultBatch {
    /// Create a batch stamped with the current time.
    pub fn new(reads: Vec<PlateRead>, frame: FrameSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            reads,
            frame,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
