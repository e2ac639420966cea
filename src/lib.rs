pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod reply;
pub mod session;
pub mod store;
pub mod stt;
pub mod transport;
pub mod tts;

pub use codec::{
    decode_media, encode_media, DecodedFrame, InboundMessage, OutboundFramer, OutboundMessage,
};
pub use config::Config;
pub use error::{FrameError, RegistryError, SttError, StoreError, TurnError};
pub use http::{create_router, AppState};
pub use reply::{Exchange, ReplyGenerator};
pub use session::{
    CallSession, InboundEvent, Providers, SessionContext, SessionHandle, SessionRegistry,
    SessionState, SessionStats, SessionTuning, TranscriptLine,
};
pub use store::{CallStatus, CallStore, MemoryCallStore};
pub use stt::{RecognizerBackend, TranscriptEvent, TranscriptionBridge};
pub use tts::SpeechSynthesizer;
