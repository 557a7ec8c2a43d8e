//! Synthesized speech payloads and exclusive playback.
//!
//! The speech endpoint returns raw 16-bit little-endian PCM, mono, 24 kHz,
//! base64-encoded.

use crate::error::GatewayError;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 24_000;
pub const CHANNELS: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpeechAudio {
    pub pcm: Vec<u8>,
}

impl SpeechAudio {
    pub fn from_base64(encoded: &str) -> Result<Self, GatewayError> {
        Ok(Self {
            pcm: BASE64_STANDARD.decode(encoded.trim())?,
        })
    }

    /// Valid but silent audio is still `Some(SpeechAudio)` upstream.
    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    /// Samples normalized to [-1.0, 1.0). A trailing odd byte is dropped.
    pub fn samples(&self) -> Vec<f32> {
        self.pcm
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
            .collect()
    }

    pub fn duration(&self) -> Duration {
        let frames = (self.pcm.len() / 2) as u64 / CHANNELS as u64;
        Duration::from_micros(frames * 1_000_000 / SAMPLE_RATE as u64)
    }
}

/// Allows one playback at a time. A request while another is active is refused.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSlot {
    active: Arc<Mutex<Option<String>>>,
}

impl PlaybackSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `message_id`; `None` if something is already playing.
    pub fn try_acquire(&self, message_id: &str) -> Option<PlaybackGuard> {
        let mut active = self.active.lock().ok()?;
        if let Some(current) = active.as_deref() {
            log::debug!("Playback of {} rejected, {} is playing", message_id, current);
            return None;
        }
        *active = Some(message_id.to_string());
        Some(PlaybackGuard {
            active: Arc::clone(&self.active),
        })
    }

    /// Id of the message currently being played, if any.
    pub fn current(&self) -> Option<String> {
        self.active.lock().ok().and_then(|active| active.clone())
    }
}

/// Releases the slot on drop.
#[derive(Debug)]
pub struct PlaybackGuard {
    active: Arc<Mutex<Option<String>>>,
}

/// Audio ready to play, holding the slot until dropped.
#[derive(Debug)]
pub struct Playback {
    pub message_id: String,
    pub audio: SpeechAudio,
    _guard: PlaybackGuard,
}

impl Playback {
    pub fn new(message_id: impl Into<String>, audio: SpeechAudio, guard: PlaybackGuard) -> Self {
        Self {
            message_id: message_id.into(),
            audio,
            _guard: guard,
        }
    }
}

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            *active = None;
        }
    }
}
