//! Channel handle for one session's streaming recognition.
//!
//! The bridge decouples the session's single-writer loop from the upstream
//! recognizer: `push` never blocks (it enqueues or reports back-pressure),
//! transcript events arrive on an ordinary receiver the loop can select on,
//! and `close` is idempotent and safe during an in-flight push.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SttError;

/// One interim or final transcript event from the recognizer, in emission
/// order.
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
    pub confidence: Option<f32>,
}

/// Why a frame could not be handed to the recognizer right now.
#[derive(Debug)]
pub enum PushError {
    /// The queue is full; the frame is handed back so the caller can keep it
    /// buffered and retry later.
    Full(Vec<u8>),
    /// The channel is closed; no further audio will be accepted.
    Closed,
}

/// Live recognition channel for one session.
pub struct TranscriptionBridge {
    audio_tx: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
}

impl TranscriptionBridge {
    /// Enqueues a frame of caller audio without waiting on the upstream
    /// recognizer.
    pub fn push(&self, frame: Vec<u8>) -> Result<(), PushError> {
        match self.audio_tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(frame)) => Err(PushError::Full(frame)),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PushError::Closed),
        }
    }

    /// Closes the channel. Safe to call any number of times.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TranscriptionBridge {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The plumbing a backend wires its pump tasks to when opening a channel.
pub struct BridgeParts {
    pub bridge: TranscriptionBridge,
    pub events: mpsc::Receiver<TranscriptEvent>,
    pub audio_rx: mpsc::Receiver<Vec<u8>>,
    pub events_tx: mpsc::Sender<TranscriptEvent>,
    pub cancel: CancellationToken,
}

/// Builds the channel pair backing a [`TranscriptionBridge`].
pub fn bridge_parts(capacity: usize) -> BridgeParts {
    let (audio_tx, audio_rx) = mpsc::channel(capacity);
    let (events_tx, events) = mpsc::channel(capacity);
    let cancel = CancellationToken::new();

    BridgeParts {
        bridge: TranscriptionBridge {
            audio_tx,
            cancel: cancel.clone(),
        },
        events,
        audio_rx,
        events_tx,
        cancel,
    }
}

/// A streaming speech recognizer that can open per-session channels.
#[async_trait]
pub trait RecognizerBackend: Send + Sync {
    /// Opens a recognition channel for a session.
    ///
    /// Fails with [`SttError::ChannelUnavailable`] when the upstream
    /// recognizer rejects the session; callers degrade to a no-transcription
    /// mode and keep the call alive.
    async fn open(
        &self,
        session_id: &str,
    ) -> Result<(TranscriptionBridge, mpsc::Receiver<TranscriptEvent>), SttError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_is_non_blocking_and_reports_backpressure() {
        let parts = bridge_parts(1);
        assert!(parts.bridge.push(vec![1]).is_ok());

        match parts.bridge.push(vec![2]) {
            Err(PushError::Full(frame)) => assert_eq!(frame, vec![2]),
            other => panic!("expected Full, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn push_after_receiver_dropped_reports_closed() {
        let parts = bridge_parts(1);
        drop(parts.audio_rx);

        assert!(matches!(parts.bridge.push(vec![1]), Err(PushError::Closed)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let parts = bridge_parts(1);
        parts.bridge.close();
        parts.bridge.close();
        assert!(parts.cancel.is_cancelled());
    }
}
