pub mod bridge;
pub mod messages;
pub mod nats;

pub use bridge::{
    bridge_parts, BridgeParts, PushError, RecognizerBackend, TranscriptEvent, TranscriptionBridge,
};
pub use messages::{AudioFrameMessage, TranscriptMessage};
pub use nats::NatsRecognizer;
