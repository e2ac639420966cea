use std::time::Duration;
use thiserror::Error;

/// Errors raised while decoding inbound media frames.
///
/// A malformed frame is dropped and the call continues; it never tears the
/// session down.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed media frame: {0}")]
    Malformed(String),
}

/// Errors raised by the streaming transcription channel.
#[derive(Debug, Error)]
pub enum SttError {
    /// The upstream recognizer rejected the session. The call continues in a
    /// no-transcription degraded mode.
    #[error("transcription channel unavailable: {0}")]
    ChannelUnavailable(String),

    /// The channel was closed while audio was still being pushed.
    #[error("transcription channel closed")]
    Closed,
}

/// Turn-level failures of the generate/synthesize pipeline.
///
/// All of these are non-fatal: the failed turn is logged, the caller hears
/// silence for that turn, and the session returns to listening.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("reply generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("reply generation rejected: {0}")]
    GenerationRejected(String),

    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),
}

/// Errors raised by the session registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("session already registered for call {0}")]
    DuplicateSession(String),
}

/// Errors raised by the call-record store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("call store request failed: {0}")]
    Request(String),

    #[error("call store rejected the update: {0}")]
    Rejected(String),
}
