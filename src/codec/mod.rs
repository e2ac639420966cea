pub mod envelope;
pub mod framer;
pub mod mulaw;

pub use envelope::{
    decode_media, encode_media, DecodedFrame, InboundMessage, MediaMeta, OutboundMedia,
    OutboundMessage, StartMeta, TranscriptPayload,
};
pub use framer::OutboundFramer;
