// Unit tests for the wire envelope and media frame codec.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use callstream::codec::{decode_media, encode_media, InboundMessage, MediaMeta, OutboundMessage};
use callstream::error::FrameError;

fn media(payload: &str, sequence: Option<&str>) -> MediaMeta {
    MediaMeta {
        payload: payload.to_string(),
        sequence_number: sequence.map(str::to_string),
    }
}

#[test]
fn decode_valid_frame() {
    let bytes = vec![0u8, 1, 2, 3, 255];
    let meta = media(&BASE64.encode(&bytes), Some("7"));

    let frame = decode_media(&meta).unwrap();
    assert_eq!(frame.bytes, bytes);
    assert_eq!(frame.sequence, 7);
}

#[test]
fn decode_rejects_missing_sequence() {
    let meta = media(&BASE64.encode([0u8; 4]), None);
    assert!(matches!(
        decode_media(&meta),
        Err(FrameError::Malformed(_))
    ));
}

#[test]
fn decode_rejects_unparsable_sequence() {
    let meta = media(&BASE64.encode([0u8; 4]), Some("not-a-number"));
    assert!(matches!(
        decode_media(&meta),
        Err(FrameError::Malformed(_))
    ));
}

#[test]
fn decode_rejects_invalid_base64() {
    let meta = media("@@not base64@@", Some("1"));
    assert!(matches!(
        decode_media(&meta),
        Err(FrameError::Malformed(_))
    ));
}

#[test]
fn encode_roundtrips_payload() {
    let payload = vec![10u8, 20, 30];
    let message = encode_media(&payload, "S1");

    let json = serde_json::to_string(&message).unwrap();
    assert!(json.contains("\"event\":\"media\""));
    assert!(json.contains("\"streamId\":\"S1\""));

    match serde_json::from_str::<OutboundMessage>(&json).unwrap() {
        OutboundMessage::Media { stream_id, media } => {
            assert_eq!(stream_id, "S1");
            assert_eq!(BASE64.decode(media.payload).unwrap(), payload);
        }
        other => panic!("wrong message: {other:?}"),
    }
}

#[test]
fn inbound_start_event_parses() {
    let json = r#"{
        "event": "start",
        "start": {
            "callId": "C1",
            "streamId": "S1",
            "ownerId": "U1"
        }
    }"#;

    match serde_json::from_str::<InboundMessage>(json).unwrap() {
        InboundMessage::Start { start } => {
            assert_eq!(start.call_id, "C1");
            assert_eq!(start.stream_id.as_deref(), Some("S1"));
            assert_eq!(start.owner_id.as_deref(), Some("U1"));
        }
        other => panic!("wrong message: {other:?}"),
    }
}

#[test]
fn inbound_start_without_owner_parses() {
    let json = r#"{"event":"start","start":{"callId":"C2"}}"#;

    match serde_json::from_str::<InboundMessage>(json).unwrap() {
        InboundMessage::Start { start } => {
            assert_eq!(start.call_id, "C2");
            assert!(start.owner_id.is_none());
        }
        other => panic!("wrong message: {other:?}"),
    }
}

#[test]
fn inbound_media_event_parses() {
    let json = r#"{
        "event": "media",
        "media": { "payload": "AAAA", "sequenceNumber": "42" }
    }"#;

    match serde_json::from_str::<InboundMessage>(json).unwrap() {
        InboundMessage::Media { media } => {
            let frame = decode_media(&media).unwrap();
            assert_eq!(frame.sequence, 42);
            assert_eq!(frame.bytes.len(), 3);
        }
        other => panic!("wrong message: {other:?}"),
    }
}

#[test]
fn stop_connected_and_mark_parse_as_units() {
    assert!(matches!(
        serde_json::from_str::<InboundMessage>(r#"{"event":"stop"}"#).unwrap(),
        InboundMessage::Stop
    ));
    assert!(matches!(
        serde_json::from_str::<InboundMessage>(r#"{"event":"connected"}"#).unwrap(),
        InboundMessage::Connected
    ));
    assert!(matches!(
        serde_json::from_str::<InboundMessage>(r#"{"event":"mark"}"#).unwrap(),
        InboundMessage::Mark
    ));
}

#[test]
fn unrecognized_event_kind_is_tolerated() {
    let json = r#"{"event":"dtmf","digit":"5"}"#;
    assert!(matches!(
        serde_json::from_str::<InboundMessage>(json).unwrap(),
        InboundMessage::Unknown
    ));
}

#[test]
fn outbound_transcript_shape() {
    let message = OutboundMessage::Transcript {
        stream_id: "S1".to_string(),
        transcript: callstream::codec::TranscriptPayload {
            text: "hello".to_string(),
            is_final: true,
        },
    };

    let json = serde_json::to_string(&message).unwrap();
    assert!(json.contains("\"event\":\"transcript\""));
    assert!(json.contains("\"isFinal\":true"));
    assert!(json.contains("\"text\":\"hello\""));
}
