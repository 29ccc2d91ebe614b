pub mod codec;
pub mod recorder;
pub mod segmenter;

pub use codec::{DecodeError, PACKET_SIZE, Packet, decode_packet};
pub use recorder::{DEFAULT_PORT, RecorderEvent, SessionRecorder};
pub use segmenter::{LapSegmenter, Transition};

use serde::{Deserialize, Serialize};

/// Lap number reported while the car is not on a valid lap (pits, menus, replays).
pub const LAP_SENTINEL: u8 = 255;

/// One decoded telemetry observation as stored in a session buffer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Last completed lap time in seconds, 0 until a lap has been completed
    pub last_lap_time: f32,
    /// Lap counter as reported by the game
    pub lap_number: u8,
    pub track_id: String,
    /// Vehicle speed in m/s
    pub speed: f32,
    /// World position
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Idle,
    Recording,
    Stopped,
}

/// Recording state for one continuous attempt on one track.
///
/// Every sample in `buffer` shares the session's `track_id`. The buffer is only
/// appended to by the recorder worker and is handed back by
/// [`SessionRecorder::stop`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub buffer: Vec<Sample>,
    pub track_id: Option<String>,
    pub model: Option<String>,
    pub last_lap_number: u8,
    pub status: SessionStatus,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all recorded samples and forget the vehicle, keeping the track.
    pub(crate) fn reset(&mut self) {
        self.buffer.clear();
        self.last_lap_number = 0;
        self.model = None;
    }

    pub(crate) fn adopt_model(&mut self, model: &str) {
        if self.model.is_none() && !model.is_empty() {
            self.model = Some(model.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
