// End-to-end scenario: start -> caller speech -> transcription -> generated
// reply -> synthesized audio streamed back -> stop.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::mpsc;

use callstream::codec::OutboundMessage;
use callstream::session::{
    CallSession, InboundEvent, SessionContext, SessionRegistry, SessionState,
};
use callstream::store::{CallStatus, MemoryCallStore};

use common::*;

#[tokio::test]
async fn full_call_round_trip() {
    let store = Arc::new(MemoryCallStore::new());
    let recognizer = Arc::new(ScriptedRecognizer::new());
    let generator = Arc::new(StaticGenerator::new("Sure, try restarting the device."));
    // 2.5 frames of reply audio: the framer pads the last frame.
    let reply_audio: Vec<u8> = (0..400).map(|i| (i % 251) as u8).collect();
    let synthesizer = Arc::new(FixedSynthesizer::new(reply_audio.clone()));

    let registry = SessionRegistry::new();
    let (outbound_tx, mut outbound) = mpsc::channel(1024);

    let providers = providers(recognizer.clone(), generator.clone(), synthesizer, store.clone());
    let config = test_config();
    let handle = registry
        .create("C1", || {
            CallSession::spawn(
                SessionContext {
                    call_id: "C1".to_string(),
                    stream_id: "S1".to_string(),
                    owner_id: Some("U1".to_string()),
                },
                config,
                providers,
                outbound_tx,
            )
        })
        .await
        .unwrap();

    // -- start ---------------------------------------------------------------
    handle.dispatch(InboundEvent::Start).await;
    let first = tokio::time::timeout(Duration::from_secs(2), outbound.recv())
        .await
        .unwrap()
        .unwrap();
    match first {
        OutboundMessage::Ready { stream_id } => assert_eq!(stream_id, "S1"),
        other => panic!("expected ready ack, got {other:?}"),
    }

    // -- caller speech -------------------------------------------------------
    for sequence in 0..25 {
        assert!(handle.dispatch(InboundEvent::Media(speech_frame(sequence))).await);
    }
    let feed = recognizer.feed().await;
    feed.send(interim("turn it off")).await.unwrap();
    feed.send(final_transcript("turn it off and on again"))
        .await
        .unwrap();

    // -- reply streams back, in order, covering the whole buffer -------------
    let mut saw_final_transcript = false;
    let mut media_payloads: Vec<Vec<u8>> = Vec::new();

    let deadline = std::time::Instant::now() + Duration::from_secs(3);
    while media_payloads.len() < 3 {
        assert!(std::time::Instant::now() < deadline, "reply audio never finished");
        let message = tokio::time::timeout(Duration::from_secs(1), outbound.recv())
            .await
            .expect("outbound stalled")
            .expect("outbound closed");
        match message {
            OutboundMessage::Transcript { transcript, .. } => {
                if transcript.is_final {
                    assert_eq!(transcript.text, "turn it off and on again");
                    saw_final_transcript = true;
                }
            }
            OutboundMessage::Media { media, .. } => {
                media_payloads.push(BASE64.decode(media.payload).unwrap());
            }
            other => panic!("unexpected message mid-call: {other:?}"),
        }
    }

    assert!(saw_final_transcript);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert!(media_payloads.iter().all(|f| f.len() == 160));
    let streamed: Vec<u8> = media_payloads.concat();
    assert_eq!(&streamed[..reply_audio.len()], &reply_audio[..]);
    // Padding on the final frame is u-law silence.
    assert!(streamed[reply_audio.len()..].iter().all(|&b| b == 0xFF));

    wait_for_state(&handle, SessionState::Listening, Duration::from_secs(2)).await;
    assert_eq!(handle.stats().await.counters.turns_completed, 1);

    // -- stop ----------------------------------------------------------------
    handle.dispatch(InboundEvent::Stop).await;

    let mut saw_stopped = false;
    while let Ok(Some(message)) =
        tokio::time::timeout(Duration::from_millis(500), outbound.recv()).await
    {
        if matches!(message, OutboundMessage::Stopped { .. }) {
            saw_stopped = true;
        }
    }
    assert!(saw_stopped, "stop was never acknowledged");

    tokio::time::timeout(Duration::from_secs(2), handle.done())
        .await
        .expect("session never closed");
    registry.remove("C1").await;
    assert_eq!(registry.active_count().await, 0);

    // -- the call record store saw the whole lifecycle -----------------------
    let record = store.call("C1").await.expect("call recorded");
    assert_eq!(record.owner_id.as_deref(), Some("U1"));
    assert_eq!(record.status, CallStatus::Completed);
    assert!(record.duration_secs > 0.0);
    assert_eq!(record.transcript.len(), 1);
    assert_eq!(record.transcript[0].text, "turn it off and on again");

    // Every pushed frame reached the transcription channel.
    assert_eq!(recognizer.pushed_frames.load(Ordering::SeqCst), 25);
    assert_eq!(handle.stats().await.counters.frames_received, 25);
}
