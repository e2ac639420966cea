//! Slices a synthesized audio buffer into paced outbound frames.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::mulaw;

/// Streams reply audio as fixed-size frames at real-time playback rate.
///
/// Frames are emitted no faster than the audio's own duration requires, so
/// the receiving transport is never flooded. Cancellation (barge-in) is
/// observed between frames; a frame is either emitted whole or not at all.
#[derive(Debug, Clone)]
pub struct OutboundFramer {
    frame_bytes: usize,
    frame_interval: Duration,
}

impl OutboundFramer {
    pub fn new(frame_bytes: usize, frame_interval: Duration) -> Self {
        Self {
            frame_bytes,
            frame_interval,
        }
    }

    /// Splits `audio` into frames of exactly `frame_bytes` bytes, padding the
    /// final frame with u-law silence.
    pub fn frames(&self, audio: &[u8]) -> Vec<Vec<u8>> {
        if audio.is_empty() {
            return Vec::new();
        }
        audio
            .chunks(self.frame_bytes)
            .map(|chunk| {
                let mut frame = chunk.to_vec();
                frame.resize(self.frame_bytes, mulaw::SILENCE);
                frame
            })
            .collect()
    }

    /// Emits `audio` frame by frame into `sink`, paced at one frame per
    /// interval. Stops early when `cancel` fires or `sink` reports the
    /// receiver is gone. Returns the number of frames emitted.
    pub async fn stream<F>(&self, audio: &[u8], cancel: &CancellationToken, mut sink: F) -> usize
    where
        F: FnMut(Vec<u8>) -> bool,
    {
        let mut ticker = tokio::time::interval(self.frame_interval);
        let mut emitted = 0;

        for frame in self.frames(audio) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !sink(frame) {
                        break;
                    }
                    emitted += 1;
                }
            }
        }

        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_final_frame_with_silence() {
        let framer = OutboundFramer::new(4, Duration::from_millis(1));
        let frames = framer.frames(&[1, 2, 3, 4, 5]);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], vec![1, 2, 3, 4]);
        assert_eq!(frames[1], vec![5, mulaw::SILENCE, mulaw::SILENCE, mulaw::SILENCE]);
    }

    #[test]
    fn empty_audio_yields_no_frames() {
        let framer = OutboundFramer::new(160, Duration::from_millis(20));
        assert!(framer.frames(&[]).is_empty());
    }

    #[tokio::test]
    async fn streams_all_frames_in_order() {
        let framer = OutboundFramer::new(2, Duration::from_millis(1));
        let cancel = CancellationToken::new();
        let mut collected = Vec::new();

        let emitted = framer
            .stream(&[1, 2, 3, 4, 5, 6], &cancel, |frame| {
                collected.push(frame);
                true
            })
            .await;

        assert_eq!(emitted, 3);
        assert_eq!(collected.concat(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn cancellation_stops_the_stream() {
        let framer = OutboundFramer::new(2, Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let mut emitted_frames = Vec::new();

        let emitted = framer
            .stream(&[0u8; 64], &cancel, |frame| {
                emitted_frames.push(frame);
                if emitted_frames.len() == 2 {
                    cancel.cancel();
                }
                true
            })
            .await;

        // The token fired after the second frame; nothing further was emitted
        // and every emitted frame is whole.
        assert_eq!(emitted, 2);
        assert!(emitted_frames.iter().all(|f| f.len() == 2));
    }
}
