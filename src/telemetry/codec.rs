// Decoder for the fixed-layout telemetry datagram.
//
// Every field is read at a fixed offset from the datagram with an explicit
// bounds check. Multi-byte values use the sender's native byte order, which
// for the supported games is the same machine the recorder runs on.

use snafu::Snafu;

use super::Sample;

/// Exact size of a telemetry datagram in bytes.
pub const PACKET_SIZE: usize = 92;
/// Size of the NUL-padded text fields.
const TEXT_FIELD_LEN: usize = 32;

const OFF_WHEEL_SPEED_FRONT: usize = 0; // f32, m/s
const OFF_WHEEL_SPEED_REAR: usize = 4; // f32, m/s
const OFF_LAP_NUMBER: usize = 8; // u8, 255 = not on a valid lap
const OFF_LAST_LAP_TIME: usize = 12; // f32, seconds
const OFF_TRACK_ID: usize = 16; // [u8; 32]
const OFF_MODEL: usize = 48; // [u8; 32]
const OFF_POS_X: usize = 80; // f32
const OFF_POS_Y: usize = 84; // f32
const OFF_SPEED: usize = 88; // f32, m/s

#[derive(Debug, Snafu, PartialEq)]
pub enum DecodeError {
    #[snafu(display("Wrong datagram length: expected {expected}, got {actual}"))]
    WrongLength { expected: usize, actual: usize },
    #[snafu(display("Field {field} is out of bounds"))]
    OutOfBounds { field: &'static str },
    #[snafu(display("Field {field} is not valid UTF-8"))]
    InvalidText { field: &'static str },
    #[snafu(display("Field {field} is empty"))]
    EmptyText { field: &'static str },
    #[snafu(display("Field {field} is not a finite number"))]
    NonFiniteField { field: &'static str },
}

/// A decoded datagram, including the wheel speeds used only to judge validity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Packet {
    pub wheel_speed_front: f32,
    pub wheel_speed_rear: f32,
    pub lap_number: u8,
    pub last_lap_time: f32,
    pub track_id: String,
    pub model: String,
    pub x: f32,
    pub y: f32,
    pub speed: f32,
}

impl Packet {
    /// Mean of front and rear wheel speed.
    pub fn observed_speed(&self) -> f32 {
        (self.wheel_speed_front + self.wheel_speed_rear) / 2.0
    }

    pub fn into_sample(self) -> Sample {
        Sample {
            last_lap_time: self.last_lap_time,
            lap_number: self.lap_number,
            track_id: self.track_id,
            speed: self.speed,
            x: self.x,
            y: self.y,
        }
    }

    /// Lay the packet out on the wire. Text longer than a field is truncated.
    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut buf = [0u8; PACKET_SIZE];
        write_f32(&mut buf, OFF_WHEEL_SPEED_FRONT, self.wheel_speed_front);
        write_f32(&mut buf, OFF_WHEEL_SPEED_REAR, self.wheel_speed_rear);
        buf[OFF_LAP_NUMBER] = self.lap_number;
        write_f32(&mut buf, OFF_LAST_LAP_TIME, self.last_lap_time);
        write_text(&mut buf, OFF_TRACK_ID, &self.track_id);
        write_text(&mut buf, OFF_MODEL, &self.model);
        write_f32(&mut buf, OFF_POS_X, self.x);
        write_f32(&mut buf, OFF_POS_Y, self.y);
        write_f32(&mut buf, OFF_SPEED, self.speed);
        buf
    }
}

/// Decode one datagram. Anything other than a well-formed record of exactly
/// [`PACKET_SIZE`] bytes is rejected.
///
/// Text fields end at the first NUL and are otherwise taken verbatim, spaces
/// included. Text containing control characters is rejected.
pub fn decode_packet(data: &[u8]) -> Result<Packet, DecodeError> {
    if data.len() != PACKET_SIZE {
        return Err(DecodeError::WrongLength {
            expected: PACKET_SIZE,
            actual: data.len(),
        });
    }

    let lap_number = *data
        .get(OFF_LAP_NUMBER)
        .ok_or(DecodeError::OutOfBounds {
            field: "lap_number",
        })?;

    Ok(Packet {
        wheel_speed_front: read_f32(data, OFF_WHEEL_SPEED_FRONT, "wheel_speed_front")?,
        wheel_speed_rear: read_f32(data, OFF_WHEEL_SPEED_REAR, "wheel_speed_rear")?,
        lap_number,
        last_lap_time: read_f32(data, OFF_LAST_LAP_TIME, "last_lap_time")?,
        track_id: read_text(data, OFF_TRACK_ID, "track_id")?,
        model: read_text(data, OFF_MODEL, "model")?,
        x: read_f32(data, OFF_POS_X, "x")?,
        y: read_f32(data, OFF_POS_Y, "y")?,
        speed: read_f32(data, OFF_SPEED, "speed")?,
    })
}

fn read_f32(data: &[u8], offset: usize, field: &'static str) -> Result<f32, DecodeError> {
    let value = data
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(f32::from_ne_bytes)
        .ok_or(DecodeError::OutOfBounds { field })?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DecodeError::NonFiniteField { field })
    }
}

fn read_text(data: &[u8], offset: usize, field: &'static str) -> Result<String, DecodeError> {
    let raw = data
        .get(offset..offset + TEXT_FIELD_LEN)
        .ok_or(DecodeError::OutOfBounds { field })?;
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    let text = std::str::from_utf8(&raw[..end]).map_err(|_| DecodeError::InvalidText { field })?;
    // control characters would break the tab-separated export
    if text.chars().any(char::is_control) {
        return Err(DecodeError::InvalidText { field });
    }
    // the model may legitimately be blank, the track never is
    if text.is_empty() && field == "track_id" {
        return Err(DecodeError::EmptyText { field });
    }
    Ok(text.to_string())
}

fn write_f32(buf: &mut [u8; PACKET_SIZE], offset: usize, value: f32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
}

fn write_text(buf: &mut [u8; PACKET_SIZE], offset: usize, text: &str) {
    let bytes = text.as_bytes();
    let len = bytes.len().min(TEXT_FIELD_LEN);
    buf[offset..offset + len].copy_from_slice(&bytes[..len]);
}
