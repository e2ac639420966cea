//! Call session management
//!
//! One `CallSession` per live call. The session owns the per-call state
//! machine, transcript accumulation, and turn arbitration; the
//! `SessionRegistry` is the process-wide index over all of them.

mod config;
mod registry;
mod session;
mod stats;

pub use config::{SessionConfig, SessionTuning};
pub use registry::SessionRegistry;
pub use session::{
    CallSession, InboundEvent, Providers, SessionContext, SessionHandle, SessionState,
};
pub use stats::{CounterSnapshot, SessionCounters, SessionStats, TranscriptLine};
