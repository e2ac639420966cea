//! One live call: state machine, turn arbitration, and the single-writer
//! event loop that owns all mutation.
//!
//! Every session runs one spawned task. The transport adapter queues decoded
//! events into it, the transcription bridge feeds transcript events, and an
//! in-flight reply turn reports its frames and outcome through an internal
//! channel. Nothing outside the loop mutates session state; external callers
//! read snapshots through the [`SessionHandle`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{
    encode_media, mulaw, DecodedFrame, OutboundFramer, OutboundMessage, TranscriptPayload,
};
use crate::error::TurnError;
use crate::reply::{Exchange, ReplyGenerator};
use crate::store::{CallStatus, CallStore};
use crate::stt::{PushError, RecognizerBackend, TranscriptEvent, TranscriptionBridge};
use crate::tts::SpeechSynthesizer;

use super::config::SessionConfig;
use super::stats::{SessionCounters, SessionStats, TranscriptLine};

/// Session state machine. `Listening` and `Responding` are the two
/// sub-states of an active call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    /// Waiting for caller speech.
    Listening,
    /// A reply is being generated, synthesized, or played.
    Responding,
    Closing,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Listening => "listening",
            SessionState::Responding => "responding",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Listening | SessionState::Responding)
    }
}

/// Identity of one call, as supplied by the telephony layer.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub call_id: String,
    pub stream_id: String,
    /// Authenticated owner; absent for unauthenticated inbound calls, which
    /// run greeting-only.
    pub owner_id: Option<String>,
}

/// External collaborators a session drives. Selected once at startup; the
/// session never branches on which backend is behind a trait.
#[derive(Clone)]
pub struct Providers {
    pub recognizer: Arc<dyn RecognizerBackend>,
    pub generator: Arc<dyn ReplyGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub store: Arc<dyn CallStore>,
}

/// Decoded transport events queued into the session loop.
#[derive(Debug)]
pub enum InboundEvent {
    Start,
    Media(DecodedFrame),
    Stop,
}

/// Shared handle to a running session. Cheap to clone via `Arc`; all reads
/// are snapshots of state the run loop owns.
pub struct SessionHandle {
    pub session_id: String,
    pub call_id: String,
    pub stream_id: String,
    pub owner_id: Option<String>,
    pub started_at: DateTime<Utc>,
    event_tx: mpsc::Sender<InboundEvent>,
    cancel: CancellationToken,
    state: Arc<RwLock<SessionState>>,
    counters: Arc<SessionCounters>,
    transcript: Arc<Mutex<Vec<TranscriptLine>>>,
}

impl SessionHandle {
    /// Queues one transport event. Returns `false` once the session's loop
    /// has exited and the event can no longer be delivered.
    pub async fn dispatch(&self, event: InboundEvent) -> bool {
        self.event_tx.send(event).await.is_ok()
    }

    /// Forces teardown, bypassing normal stop handling. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the session's run loop has exited.
    pub async fn done(&self) {
        self.event_tx.closed().await;
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn stats(&self) -> SessionStats {
        SessionStats {
            state: self.state.read().await.as_str().to_string(),
            started_at: self.started_at,
            duration_secs: (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0,
            counters: self.counters.snapshot(),
        }
    }

    /// Finalized transcript lines accumulated so far.
    pub async fn transcript(&self) -> Vec<TranscriptLine> {
        self.transcript.lock().await.clone()
    }
}

/// What a spawned reply turn is asked to do.
enum TurnRequest {
    /// Speak fixed text (the greeting); skips generation.
    Speak(String),
    /// Generate a reply to the latest utterance, then speak it.
    Respond { utterance: String },
}

/// Events a reply turn reports back into the session loop.
#[derive(Debug)]
enum TurnEvent {
    Reply { turn: u64, text: String },
    Media { turn: u64, payload: Vec<u8> },
    Done { turn: u64, outcome: TurnOutcome },
}

#[derive(Debug)]
enum TurnOutcome {
    Completed { frames: usize },
    Cancelled,
    Failed(TurnError),
}

struct ActiveTurn {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy)]
enum CloseCause {
    /// The transport delivered a `stop` event.
    Remote,
    /// No inbound media within the idle timeout.
    Idle,
    /// `SessionHandle::close` (transport error or administrative close).
    Forced,
    /// The transport dropped its sender without a `stop`.
    TransportGone,
}

/// The stateful core of one call. Owned entirely by its run-loop task.
pub struct CallSession {
    ctx: SessionContext,
    session_id: String,
    config: SessionConfig,
    providers: Providers,
    outbound: mpsc::Sender<OutboundMessage>,

    state: Arc<RwLock<SessionState>>,
    counters: Arc<SessionCounters>,
    transcript: Arc<Mutex<Vec<TranscriptLine>>>,
    cancel: CancellationToken,
    spawned: Instant,

    audio_buffer: VecDeque<Vec<u8>>,
    bridge: Option<TranscriptionBridge>,
    pending_transcripts: Option<mpsc::Receiver<TranscriptEvent>>,
    pending_interim: Option<String>,
    utterance_started: Option<DateTime<Utc>>,
    exchanges: Vec<Exchange>,
    active_turn: Option<ActiveTurn>,
    turn_seq: u64,
    consecutive_speech: u32,
    last_media: Instant,
    activated: bool,
    degraded: bool,
    transcription_down: bool,
    turn_tx: mpsc::UnboundedSender<TurnEvent>,
}

impl CallSession {
    /// Spawns the session's run loop and returns its shared handle.
    pub fn spawn(
        ctx: SessionContext,
        config: SessionConfig,
        providers: Providers,
        outbound: mpsc::Sender<OutboundMessage>,
    ) -> Arc<SessionHandle> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let (event_tx, event_rx) = mpsc::channel(64);
        let (turn_tx, turn_rx) = mpsc::unbounded_channel();
        let state = Arc::new(RwLock::new(SessionState::Connecting));
        let counters = Arc::new(SessionCounters::default());
        let transcript = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        let started_at = Utc::now();

        let handle = Arc::new(SessionHandle {
            session_id: session_id.clone(),
            call_id: ctx.call_id.clone(),
            stream_id: ctx.stream_id.clone(),
            owner_id: ctx.owner_id.clone(),
            started_at,
            event_tx,
            cancel: cancel.clone(),
            state: state.clone(),
            counters: counters.clone(),
            transcript: transcript.clone(),
        });

        let degraded = ctx.owner_id.is_none();
        let session = CallSession {
            ctx,
            session_id,
            config,
            providers,
            outbound,
            state,
            counters,
            transcript,
            cancel,
            spawned: Instant::now(),
            audio_buffer: VecDeque::new(),
            bridge: None,
            pending_transcripts: None,
            pending_interim: None,
            utterance_started: None,
            exchanges: Vec::new(),
            active_turn: None,
            turn_seq: 0,
            consecutive_speech: 0,
            last_media: Instant::now(),
            activated: false,
            degraded,
            transcription_down: false,
            turn_tx,
        };

        tokio::spawn(session.run(event_rx, turn_rx));

        handle
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<InboundEvent>,
        mut turns: mpsc::UnboundedReceiver<TurnEvent>,
    ) {
        info!(
            session = %self.session_id,
            call = %self.ctx.call_id,
            "Session loop started"
        );

        let cancel = self.cancel.clone();
        let mut transcripts: Option<mpsc::Receiver<TranscriptEvent>> = None;
        let cause;

        loop {
            // Activation opens the transcription channel mid-loop; pick the
            // receiver up here so the select below can watch it.
            if let Some(rx) = self.pending_transcripts.take() {
                transcripts = Some(rx);
            }

            let active = self.state.read().await.is_active();
            let idle_deadline = tokio::time::Instant::from_std(
                self.last_media + self.config.tuning.idle_timeout(),
            );

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    cause = CloseCause::Forced;
                    break;
                }

                maybe = events.recv() => match maybe {
                    Some(InboundEvent::Start) => self.activate().await,
                    Some(InboundEvent::Media(frame)) => self.handle_media(frame).await,
                    Some(InboundEvent::Stop) => {
                        cause = CloseCause::Remote;
                        break;
                    }
                    None => {
                        cause = CloseCause::TransportGone;
                        break;
                    }
                },

                maybe = next_transcript(&mut transcripts) => match maybe {
                    Some(event) => self.handle_transcript(event).await,
                    None => {
                        debug!(call = %self.ctx.call_id, "Transcript channel drained");
                        transcripts = None;
                    }
                },

                Some(event) = turns.recv() => self.handle_turn_event(event).await,

                _ = tokio::time::sleep_until(idle_deadline), if active => {
                    warn!(call = %self.ctx.call_id, "Idle timeout reached, closing session");
                    cause = CloseCause::Idle;
                    break;
                }
            }
        }

        self.teardown(cause).await;
    }

    /// `Connecting -> Active/Listening`. An unresolved owner degrades the
    /// session but never blocks the transition.
    async fn activate(&mut self) {
        if *self.state.read().await != SessionState::Connecting {
            warn!(call = %self.ctx.call_id, "Duplicate start event ignored");
            return;
        }
        self.activated = true;

        if let Err(e) = self
            .providers
            .store
            .create_call(&self.ctx.call_id, self.ctx.owner_id.as_deref())
            .await
        {
            warn!(call = %self.ctx.call_id, "Failed to record call start: {}", e);
        }

        match self.providers.recognizer.open(&self.session_id).await {
            Ok((bridge, events)) => {
                self.bridge = Some(bridge);
                self.pending_transcripts = Some(events);
            }
            Err(e) => {
                warn!(
                    call = %self.ctx.call_id,
                    "Transcription unavailable, call continues without turns: {}", e
                );
                self.transcription_down = true;
            }
        }

        self.set_state(SessionState::Listening).await;
        let _ = self
            .outbound
            .send(OutboundMessage::Ready {
                stream_id: self.ctx.stream_id.clone(),
            })
            .await;

        if self.degraded {
            info!(call = %self.ctx.call_id, "No owner resolved, running greeting-only");
        }

        if let Some(greeting) = self.config.tuning.greeting.clone() {
            self.start_turn(TurnRequest::Speak(greeting)).await;
        }
    }

    async fn handle_media(&mut self, frame: DecodedFrame) {
        let state = *self.state.read().await;
        if !state.is_active() {
            debug!(call = %self.ctx.call_id, "Media frame before start ignored");
            return;
        }

        self.counters.record_frame(frame.bytes.len());
        self.last_media = Instant::now();

        // Caller audio while a reply is playing is candidate barge-in, but
        // only after the debounce window of consecutive speech frames.
        if state == SessionState::Responding {
            if mulaw::is_speech(&frame.bytes, self.config.tuning.speech_threshold) {
                self.consecutive_speech += 1;
                if self.consecutive_speech >= self.config.tuning.barge_in_frames {
                    self.barge_in().await;
                }
            } else {
                self.consecutive_speech = 0;
            }
        }

        // With no recognizer behind the buffer there is nothing to feed;
        // barge-in detection above already consumed the frame.
        if self.transcription_down {
            return;
        }

        if self.audio_buffer.len() >= self.config.buffer_capacity {
            self.audio_buffer.pop_front();
            self.counters.record_dropped_frame();
        }
        self.audio_buffer.push_back(frame.bytes);
        self.drain_audio();
    }

    /// Forwards buffered audio to the transcription channel without ever
    /// blocking the loop; back-pressured frames stay queued.
    fn drain_audio(&mut self) {
        let Some(bridge) = &self.bridge else { return };

        while let Some(frame) = self.audio_buffer.pop_front() {
            match bridge.push(frame) {
                Ok(()) => {}
                Err(PushError::Full(frame)) => {
                    self.audio_buffer.push_front(frame);
                    break;
                }
                Err(PushError::Closed) => {
                    warn!(call = %self.ctx.call_id, "Transcription channel closed mid-call");
                    self.bridge = None;
                    self.transcription_down = true;
                    break;
                }
            }
        }
    }

    async fn barge_in(&mut self) {
        if let Some(turn) = self.active_turn.take() {
            info!(call = %self.ctx.call_id, turn = turn.id, "Barge-in, cancelling reply");
            turn.cancel.cancel();
        }
        self.consecutive_speech = 0;
        self.set_state(SessionState::Listening).await;
    }

    async fn handle_transcript(&mut self, event: TranscriptEvent) {
        if event.is_final {
            self.handle_final_transcript(event).await;
        } else {
            self.handle_interim_transcript(event).await;
        }
    }

    async fn handle_interim_transcript(&mut self, event: TranscriptEvent) {
        if self.utterance_started.is_none() {
            self.utterance_started = Some(Utc::now());
        }
        self.pending_interim = Some(event.text.clone());
        self.send_transcript(event.text, false).await;
    }

    async fn handle_final_transcript(&mut self, event: TranscriptEvent) {
        self.pending_interim = None;
        let text = event.text.trim().to_string();
        if text.is_empty() {
            // Noise-only utterance: stay listening.
            self.utterance_started = None;
            return;
        }

        self.send_transcript(text.clone(), true).await;
        self.push_transcript_line(text.clone(), event.confidence).await;

        if self.active_turn.is_some() {
            // Rapid consecutive finals never stack reply tasks; the later
            // utterance is recorded and the in-flight turn keeps playing.
            debug!(call = %self.ctx.call_id, "Final transcript during active reply, no new turn");
            return;
        }
        if self.degraded || *self.state.read().await != SessionState::Listening {
            return;
        }

        self.exchanges.push(Exchange {
            caller: text.clone(),
            reply: None,
        });
        self.start_turn(TurnRequest::Respond { utterance: text }).await;
    }

    async fn push_transcript_line(&mut self, text: String, confidence: Option<f32>) {
        let ended_at = Utc::now();
        let started_at = self.utterance_started.take().unwrap_or(ended_at);
        self.transcript.lock().await.push(TranscriptLine {
            text,
            started_at,
            ended_at,
            confidence,
        });
        self.counters.record_transcript_line();
    }

    async fn send_transcript(&self, text: String, is_final: bool) {
        let _ = self
            .outbound
            .send(OutboundMessage::Transcript {
                stream_id: self.ctx.stream_id.clone(),
                transcript: TranscriptPayload { text, is_final },
            })
            .await;
    }

    async fn start_turn(&mut self, request: TurnRequest) {
        self.turn_seq += 1;
        let id = self.turn_seq;
        let cancel = CancellationToken::new();
        self.active_turn = Some(ActiveTurn {
            id,
            cancel: cancel.clone(),
        });
        self.consecutive_speech = 0;

        let history = match &request {
            // The exchange opened for this turn is the latest utterance, not
            // prior context.
            TurnRequest::Respond { .. } => self.exchanges[..self.exchanges.len() - 1].to_vec(),
            TurnRequest::Speak(_) => Vec::new(),
        };
        let framer = OutboundFramer::new(self.config.frame_bytes, self.config.frame_interval);

        tokio::spawn(run_turn(
            id,
            request,
            history,
            self.providers.generator.clone(),
            self.providers.synthesizer.clone(),
            framer,
            self.config.tuning.turn_timeout(),
            cancel,
            self.turn_tx.clone(),
        ));

        self.set_state(SessionState::Responding).await;
    }

    async fn handle_turn_event(&mut self, event: TurnEvent) {
        match event {
            TurnEvent::Reply { turn, text } => {
                if self.current_turn() == Some(turn) {
                    if let Some(exchange) = self.exchanges.last_mut() {
                        exchange.reply = Some(text);
                    }
                }
            }
            TurnEvent::Media { turn, payload } => {
                // Frames from a turn that is no longer active were produced
                // before its cancellation was acknowledged; they are dropped
                // here and never reach the transport.
                if self.current_turn() == Some(turn) {
                    let _ = self
                        .outbound
                        .send(encode_media(&payload, &self.ctx.stream_id))
                        .await;
                }
            }
            TurnEvent::Done { turn, outcome } => {
                if self.current_turn() != Some(turn) {
                    // A cancelled turn finishing late; nothing to do.
                    return;
                }
                self.active_turn = None;
                match outcome {
                    TurnOutcome::Completed { frames } => {
                        self.counters.record_turn_completed();
                        debug!(call = %self.ctx.call_id, turn, frames, "Reply turn completed");
                    }
                    TurnOutcome::Cancelled => {
                        debug!(call = %self.ctx.call_id, turn, "Reply turn cancelled");
                    }
                    TurnOutcome::Failed(e) => {
                        self.counters.record_turn_failed();
                        warn!(call = %self.ctx.call_id, turn, "Reply turn failed: {}", e);
                    }
                }
                if *self.state.read().await == SessionState::Responding {
                    self.set_state(SessionState::Listening).await;
                }
            }
        }
    }

    async fn teardown(mut self, cause: CloseCause) {
        self.set_state(SessionState::Closing).await;
        debug!(call = %self.ctx.call_id, ?cause, "Tearing down session");

        if let Some(turn) = self.active_turn.take() {
            turn.cancel.cancel();
        }
        if let Some(bridge) = &self.bridge {
            bridge.close();
        }

        // A non-trivial interim the recognizer never finalized still becomes
        // a transcript line.
        if let Some(text) = self.pending_interim.take() {
            if !text.trim().is_empty() {
                self.push_transcript_line(text, None).await;
            }
        }

        if self.activated {
            let status = match cause {
                CloseCause::Remote | CloseCause::Idle => CallStatus::Completed,
                CloseCause::Forced | CloseCause::TransportGone => CallStatus::Failed,
            };
            let duration = self.spawned.elapsed().as_secs_f64();

            if !self.degraded {
                let lines = self.transcript.lock().await.clone();
                if let Err(e) = self
                    .providers
                    .store
                    .save_transcript(&self.ctx.call_id, &lines)
                    .await
                {
                    warn!(call = %self.ctx.call_id, "Failed to save transcript: {}", e);
                }
            }
            if let Err(e) = self
                .providers
                .store
                .update_call_status(&self.ctx.call_id, status, duration)
                .await
            {
                warn!(call = %self.ctx.call_id, "Failed to record call status: {}", e);
            }

            info!(
                call = %self.ctx.call_id,
                status = status.as_str(),
                duration_secs = duration,
                "Call finished"
            );
        }

        let _ = self
            .outbound
            .send(OutboundMessage::Stopped {
                stream_id: self.ctx.stream_id.clone(),
            })
            .await;

        self.set_state(SessionState::Closed).await;
    }

    fn current_turn(&self) -> Option<u64> {
        self.active_turn.as_ref().map(|t| t.id)
    }

    async fn set_state(&self, next: SessionState) {
        let mut state = self.state.write().await;
        if *state != next {
            debug!(
                call = %self.ctx.call_id,
                from = state.as_str(),
                to = next.as_str(),
                "State transition"
            );
            *state = next;
        }
    }
}

async fn next_transcript(
    rx: &mut Option<mpsc::Receiver<TranscriptEvent>>,
) -> Option<TranscriptEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// One reply turn: generate, synthesize, stream. Runs detached from the
/// session loop so the loop keeps accepting inbound audio while this task
/// waits on external providers.
#[allow(clippy::too_many_arguments)]
async fn run_turn(
    id: u64,
    request: TurnRequest,
    history: Vec<Exchange>,
    generator: Arc<dyn ReplyGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    framer: OutboundFramer,
    timeout: Duration,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<TurnEvent>,
) {
    let outcome = drive_turn(
        id, request, history, generator, synthesizer, framer, timeout, &cancel, &events,
    )
    .await;
    let _ = events.send(TurnEvent::Done { turn: id, outcome });
}

#[allow(clippy::too_many_arguments)]
async fn drive_turn(
    id: u64,
    request: TurnRequest,
    history: Vec<Exchange>,
    generator: Arc<dyn ReplyGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    framer: OutboundFramer,
    timeout: Duration,
    cancel: &CancellationToken,
    events: &mpsc::UnboundedSender<TurnEvent>,
) -> TurnOutcome {
    // One budget for both external round trips.
    let deadline = tokio::time::Instant::now() + timeout;

    let text = match request {
        TurnRequest::Speak(text) => text,
        TurnRequest::Respond { utterance } => {
            let generated = tokio::select! {
                biased;
                _ = cancel.cancelled() => return TurnOutcome::Cancelled,
                result = tokio::time::timeout_at(deadline, generator.generate(&history, &utterance)) => {
                    match result {
                        Err(_) => return TurnOutcome::Failed(TurnError::GenerationTimeout(timeout)),
                        Ok(Err(e)) => return TurnOutcome::Failed(e),
                        Ok(Ok(text)) => text,
                    }
                }
            };
            let _ = events.send(TurnEvent::Reply {
                turn: id,
                text: generated.clone(),
            });
            generated
        }
    };

    let audio = tokio::select! {
        biased;
        _ = cancel.cancelled() => return TurnOutcome::Cancelled,
        result = tokio::time::timeout_at(deadline, synthesizer.synthesize(&text)) => {
            match result {
                Err(_) => return TurnOutcome::Failed(TurnError::GenerationTimeout(timeout)),
                Ok(Err(e)) => return TurnOutcome::Failed(e),
                Ok(Ok(audio)) => audio,
            }
        }
    };

    let frames = framer
        .stream(&audio, cancel, |payload| {
            events
                .send(TurnEvent::Media { turn: id, payload })
                .is_ok()
        })
        .await;

    if cancel.is_cancelled() {
        TurnOutcome::Cancelled
    } else {
        TurnOutcome::Completed { frames }
    }
}
