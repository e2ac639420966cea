use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A finalized caller utterance. Interim fragments never land here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptLine {
    /// Transcribed text as finalized by the recognizer.
    pub text: String,

    /// When the utterance began (first interim fragment, or finalization time
    /// when no interim preceded it).
    pub started_at: DateTime<Utc>,

    /// When the recognizer finalized the utterance.
    pub ended_at: DateTime<Utc>,

    /// Confidence score (0.0 to 1.0), if the recognizer reported one.
    pub confidence: Option<f32>,
}

/// Monotonic per-session counters. Written only by the session's own
/// run loop; read as a snapshot by external callers.
#[derive(Debug, Default)]
pub struct SessionCounters {
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    frames_dropped: AtomicU64,
    transcript_lines: AtomicU64,
    turns_completed: AtomicU64,
    turns_failed: AtomicU64,
}

impl SessionCounters {
    pub fn record_frame(&self, bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_dropped_frame(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transcript_line(&self) {
        self.transcript_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_turn_completed(&self) {
        self.turns_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_turn_failed(&self) {
        self.turns_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            transcript_lines: self.transcript_lines.load(Ordering::Relaxed),
            turns_completed: self.turns_completed.load(Ordering::Relaxed),
            turns_failed: self.turns_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub frames_received: u64,
    pub bytes_received: u64,
    pub frames_dropped: u64,
    pub transcript_lines: u64,
    pub turns_completed: u64,
    pub turns_failed: u64,
}

/// Point-in-time statistics for one call session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Current state of the session state machine.
    pub state: String,

    /// When the session was created.
    pub started_at: DateTime<Utc>,

    /// Seconds since the session was created.
    pub duration_secs: f64,

    #[serde(flatten)]
    pub counters: CounterSnapshot,
}
