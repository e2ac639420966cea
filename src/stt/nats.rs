use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::bridge::{bridge_parts, RecognizerBackend, TranscriptEvent, TranscriptionBridge};
use super::messages::{AudioFrameMessage, TranscriptMessage};
use crate::error::SttError;

/// Streaming recognizer over NATS pub/sub.
///
/// Caller audio is published as JSON frames on `stt.audio.call-<session>`;
/// interim and final transcripts come back on `stt.text.>` and are filtered
/// by session id, since the recognizer publishes partials and finals on
/// separate subjects.
pub struct NatsRecognizer {
    client: Option<async_nats::Client>,
    sample_rate: u32,
    capacity: usize,
}

impl NatsRecognizer {
    /// Connects to the recognizer transport. A failed connection is not
    /// fatal here: sessions opened against an unconnected recognizer get
    /// `ChannelUnavailable` and degrade individually.
    pub async fn connect(url: &str, sample_rate: u32, capacity: usize) -> Self {
        let client = match async_nats::connect(url).await {
            Ok(client) => {
                info!("Connected to recognizer transport at {}", url);
                Some(client)
            }
            Err(e) => {
                warn!("Recognizer transport unreachable at {}: {}", url, e);
                None
            }
        };

        Self {
            client,
            sample_rate,
            capacity,
        }
    }
}

#[async_trait]
impl RecognizerBackend for NatsRecognizer {
    async fn open(
        &self,
        session_id: &str,
    ) -> Result<(TranscriptionBridge, mpsc::Receiver<TranscriptEvent>), SttError> {
        let client = self
            .client
            .clone()
            .ok_or_else(|| SttError::ChannelUnavailable("transport not connected".to_string()))?;

        let mut subscriber = client
            .subscribe("stt.text.>")
            .await
            .map_err(|e| SttError::ChannelUnavailable(e.to_string()))?;

        let parts = bridge_parts(self.capacity);
        let session = session_id.to_string();

        // Audio pump: drain the push queue into the recognizer subject. A
        // final empty frame tells the recognizer to flush pending results.
        let subject = format!("stt.audio.call-{}", session);
        let sample_rate = self.sample_rate;
        let cancel = parts.cancel.clone();
        let mut audio_rx = parts.audio_rx;
        let publish_session = session.clone();
        let publish_client = client.clone();
        tokio::spawn(async move {
            let mut sequence: u64 = 0;

            loop {
                let frame = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    maybe = audio_rx.recv() => match maybe {
                        Some(frame) => frame,
                        None => break,
                    },
                };

                let message = AudioFrameMessage {
                    session_id: publish_session.clone(),
                    sequence,
                    audio: BASE64.encode(&frame),
                    sample_rate,
                    channels: 1,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    final_frame: false,
                };
                sequence += 1;

                let Ok(payload) = serde_json::to_vec(&message) else {
                    continue;
                };
                if let Err(e) = publish_client.publish(subject.clone(), payload.into()).await {
                    warn!("Failed to publish audio frame for {}: {}", publish_session, e);
                    break;
                }
            }

            let flush = AudioFrameMessage {
                session_id: publish_session.clone(),
                sequence,
                audio: String::new(),
                sample_rate,
                channels: 1,
                timestamp: chrono::Utc::now().to_rfc3339(),
                final_frame: true,
            };
            if let Ok(payload) = serde_json::to_vec(&flush) {
                if let Err(e) = publish_client.publish(subject.clone(), payload.into()).await {
                    debug!("Final frame publish failed for {}: {}", publish_session, e);
                }
            }

            debug!("Audio pump stopped for session {}", publish_session);
        });

        // Event pump: forward this session's transcripts, in emission order.
        let cancel = parts.cancel.clone();
        let events_tx = parts.events_tx;
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    maybe = subscriber.next() => match maybe {
                        Some(msg) => msg,
                        None => break,
                    },
                };

                let transcript = match serde_json::from_slice::<TranscriptMessage>(&msg.payload) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("Failed to parse transcript message: {}", e);
                        continue;
                    }
                };

                if transcript.session_id != session {
                    continue;
                }

                let event = TranscriptEvent {
                    text: transcript.text,
                    is_final: !transcript.partial,
                    confidence: transcript.confidence,
                };
                if events_tx.send(event).await.is_err() {
                    break;
                }
            }

            debug!("Transcript pump stopped for session {}", session);
        });

        Ok((parts.bridge, parts.events))
    }
}
