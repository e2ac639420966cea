//! Wire envelope for the call media stream.
//!
//! Frames travel as JSON text messages tagged by an `event` field. Media
//! payloads are base64-encoded u-law bytes with per-frame sequence metadata.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Inbound messages received from the call transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundMessage {
    /// Transport-level handshake, sent once before `start`.
    Connected,
    Start {
        start: StartMeta,
    },
    Media {
        media: MediaMeta,
    },
    Stop,
    /// Playback position marker; acknowledged silently.
    Mark,
    #[serde(other)]
    Unknown,
}

/// Metadata carried by the `start` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMeta {
    pub call_id: String,
    #[serde(default)]
    pub stream_id: Option<String>,
    /// Authenticated owner of the call; absent for unauthenticated inbound
    /// calls, which run in a degraded greeting-only mode.
    #[serde(default)]
    pub owner_id: Option<String>,
}

/// Metadata carried by an inbound `media` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMeta {
    pub payload: String,
    /// Transport sequence number, transmitted as a decimal string.
    #[serde(default)]
    pub sequence_number: Option<String>,
}

/// A decoded inbound media frame.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub bytes: Vec<u8>,
    pub sequence: u64,
}

/// Outbound messages written back to the call transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundMessage {
    Ready {
        #[serde(rename = "streamId")]
        stream_id: String,
    },
    Media {
        #[serde(rename = "streamId")]
        stream_id: String,
        media: OutboundMedia,
    },
    Transcript {
        #[serde(rename = "streamId")]
        stream_id: String,
        transcript: TranscriptPayload,
    },
    Stopped {
        #[serde(rename = "streamId")]
        stream_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMedia {
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptPayload {
    pub text: String,
    pub is_final: bool,
}

/// Decodes an inbound media frame.
///
/// Fails with [`FrameError::Malformed`] when the payload is not valid base64
/// or the sequence metadata is missing or unparsable. Pure; safe to call from
/// any number of sessions concurrently.
pub fn decode_media(media: &MediaMeta) -> Result<DecodedFrame, FrameError> {
    let sequence = media
        .sequence_number
        .as_deref()
        .ok_or_else(|| FrameError::Malformed("missing sequenceNumber".to_string()))?;
    let sequence = sequence
        .parse::<u64>()
        .map_err(|_| FrameError::Malformed(format!("bad sequenceNumber {:?}", sequence)))?;

    let bytes = BASE64
        .decode(media.payload.as_bytes())
        .map_err(|e| FrameError::Malformed(format!("payload is not valid base64: {e}")))?;

    Ok(DecodedFrame { bytes, sequence })
}

/// Encodes a synthesized audio frame for transmission. Total for well-formed
/// input; never fails.
pub fn encode_media(payload: &[u8], stream_id: &str) -> OutboundMessage {
    OutboundMessage::Media {
        stream_id: stream_id.to_string(),
        media: OutboundMedia {
            payload: BASE64.encode(payload),
        },
    }
}
