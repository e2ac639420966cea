// Shared test doubles for session-level tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use callstream::codec::DecodedFrame;
use callstream::error::{SttError, TurnError};
use callstream::reply::{Exchange, ReplyGenerator};
use callstream::session::{Providers, SessionConfig, SessionHandle, SessionState, SessionTuning};
use callstream::store::MemoryCallStore;
use callstream::stt::{bridge_parts, RecognizerBackend, TranscriptEvent, TranscriptionBridge};
use callstream::tts::SpeechSynthesizer;

/// Recognizer whose transcript feed is driven by the test. Pushed audio
/// frames are drained and counted.
pub struct ScriptedRecognizer {
    feed: Arc<Mutex<Option<mpsc::Sender<TranscriptEvent>>>>,
    pub pushed_frames: Arc<AtomicUsize>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self {
            feed: Arc::new(Mutex::new(None)),
            pushed_frames: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Waits until the session has opened its channel, then returns the
    /// sender the test injects transcript events through.
    pub async fn feed(&self) -> mpsc::Sender<TranscriptEvent> {
        for _ in 0..200 {
            if let Some(tx) = self.feed.lock().await.clone() {
                return tx;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session never opened a transcription channel");
    }
}

#[async_trait]
impl RecognizerBackend for ScriptedRecognizer {
    async fn open(
        &self,
        _session_id: &str,
    ) -> Result<(TranscriptionBridge, mpsc::Receiver<TranscriptEvent>), SttError> {
        let parts = bridge_parts(64);

        let pushed = self.pushed_frames.clone();
        let mut audio_rx = parts.audio_rx;
        tokio::spawn(async move {
            while audio_rx.recv().await.is_some() {
                pushed.fetch_add(1, Ordering::SeqCst);
            }
        });

        *self.feed.lock().await = Some(parts.events_tx.clone());

        Ok((parts.bridge, parts.events))
    }
}

/// Recognizer that always rejects the session.
pub struct UnavailableRecognizer;

#[async_trait]
impl RecognizerBackend for UnavailableRecognizer {
    async fn open(
        &self,
        _session_id: &str,
    ) -> Result<(TranscriptionBridge, mpsc::Receiver<TranscriptEvent>), SttError> {
        Err(SttError::ChannelUnavailable("rejected by test".to_string()))
    }
}

/// Generator returning a fixed reply, tracking call counts and the maximum
/// number of concurrently running generations.
pub struct StaticGenerator {
    reply: String,
    delay: Duration,
    pub calls: Arc<AtomicUsize>,
    concurrent: Arc<AtomicUsize>,
    pub max_concurrent: Arc<AtomicUsize>,
}

impl StaticGenerator {
    pub fn new(reply: &str) -> Self {
        Self::with_delay(reply, Duration::ZERO)
    }

    pub fn with_delay(reply: &str, delay: Duration) -> Self {
        Self {
            reply: reply.to_string(),
            delay,
            calls: Arc::new(AtomicUsize::new(0)),
            concurrent: Arc::new(AtomicUsize::new(0)),
            max_concurrent: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ReplyGenerator for StaticGenerator {
    async fn generate(&self, _history: &[Exchange], _latest: &str) -> Result<String, TurnError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Generator that always fails the turn.
pub struct FailingGenerator;

#[async_trait]
impl ReplyGenerator for FailingGenerator {
    async fn generate(&self, _history: &[Exchange], _latest: &str) -> Result<String, TurnError> {
        Err(TurnError::GenerationRejected("rejected by test".to_string()))
    }
}

/// Synthesizer returning a fixed audio buffer.
pub struct FixedSynthesizer {
    audio: Vec<u8>,
}

impl FixedSynthesizer {
    pub fn new(audio: Vec<u8>) -> Self {
        Self { audio }
    }
}

#[async_trait]
impl SpeechSynthesizer for FixedSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, TurnError> {
        Ok(self.audio.clone())
    }
}

pub fn providers(
    recognizer: Arc<dyn RecognizerBackend>,
    generator: Arc<dyn ReplyGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<MemoryCallStore>,
) -> Providers {
    Providers {
        recognizer,
        generator,
        synthesizer,
        store,
    }
}

/// Small frames and short pacing so tests run quickly.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        tuning: SessionTuning {
            barge_in_frames: 3,
            speech_threshold: 0.02,
            idle_timeout_secs: 60,
            turn_timeout_secs: 5,
            greeting: None,
        },
        frame_bytes: 160,
        frame_interval: Duration::from_millis(5),
        buffer_capacity: 32,
        bridge_capacity: 64,
    }
}

/// A loud u-law frame (0x00 decodes to maximum magnitude).
pub fn speech_frame(sequence: u64) -> DecodedFrame {
    DecodedFrame {
        bytes: vec![0x00; 160],
        sequence,
    }
}

/// A silent u-law frame.
pub fn silence_frame(sequence: u64) -> DecodedFrame {
    DecodedFrame {
        bytes: vec![0xFF; 160],
        sequence,
    }
}

pub fn interim(text: &str) -> TranscriptEvent {
    TranscriptEvent {
        text: text.to_string(),
        is_final: false,
        confidence: None,
    }
}

pub fn final_transcript(text: &str) -> TranscriptEvent {
    TranscriptEvent {
        text: text.to_string(),
        is_final: true,
        confidence: Some(0.9),
    }
}

/// Polls until the session reaches `expected` or the deadline passes.
pub async fn wait_for_state(handle: &SessionHandle, expected: SessionState, deadline: Duration) {
    let start = std::time::Instant::now();
    loop {
        if handle.state().await == expected {
            return;
        }
        if start.elapsed() > deadline {
            panic!(
                "session never reached {:?} (currently {:?})",
                expected,
                handle.state().await
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
