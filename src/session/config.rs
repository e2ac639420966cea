use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Turn-arbitration tuning for a call session.
///
/// None of these have a single canonical value; deployments tune them per
/// telephony provider and acoustic environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTuning {
    /// Consecutive non-silence inbound frames required before caller audio
    /// during a reply counts as barge-in rather than background noise.
    #[serde(default = "default_barge_in_frames")]
    pub barge_in_frames: u32,

    /// Normalized RMS energy above which a frame counts as speech.
    #[serde(default = "default_speech_threshold")]
    pub speech_threshold: f32,

    /// Seconds without inbound media before the session closes itself.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Overall budget for one reply turn's external calls (generation plus
    /// synthesis). Exceeding it cancels the turn, never the session.
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,

    /// Spoken when the call goes active. For calls without a resolved owner
    /// this is the only audio the session will ever produce.
    #[serde(default)]
    pub greeting: Option<String>,
}

fn default_barge_in_frames() -> u32 {
    3
}

fn default_speech_threshold() -> f32 {
    0.02
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_turn_timeout_secs() -> u64 {
    15
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            barge_in_frames: default_barge_in_frames(),
            speech_threshold: default_speech_threshold(),
            idle_timeout_secs: default_idle_timeout_secs(),
            turn_timeout_secs: default_turn_timeout_secs(),
            greeting: None,
        }
    }
}

impl SessionTuning {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }
}

/// Everything a session needs beyond its identity and providers.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tuning: SessionTuning,

    /// Bytes per outbound media frame (u-law, one byte per sample).
    pub frame_bytes: usize,

    /// Real-time pacing interval between outbound frames.
    pub frame_interval: Duration,

    /// Inbound frames held while the transcription channel is slow; oldest
    /// are evicted past this.
    pub buffer_capacity: usize,

    /// Capacity of the non-blocking push queue into the recognizer channel.
    pub bridge_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tuning: SessionTuning::default(),
            frame_bytes: 160,                          // 20ms at 8kHz u-law
            frame_interval: Duration::from_millis(20),
            buffer_capacity: 256,
            bridge_capacity: 64,
        }
    }
}
