use log::warn;
use serde::Deserialize;

use crate::types::Sample;

/// Fixed wire layout: stream id (u32), gap in microseconds (u32),
/// x/y/z readings (f32), all little-endian.
pub const BINARY_FRAME_LEN: usize = 20;

const MICROS_PER_SEC: f64 = 1_000_000.0;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("bad frame length: got {0} bytes, expected 20")]
    BadLength(usize),
    #[error("invalid JSON payload: {0}")]
    BadJson(#[from] serde_json::Error),
}

/// JSON wire shape: one object per sample, gap in microseconds.
#[derive(Deserialize)]
struct WireSample {
    idx: u32,
    gap: f64,
    x: f32,
    y: f32,
    z: f32,
}

impl From<WireSample> for Sample {
    fn from(wire: WireSample) -> Self {
        Sample::new(wire.idx, wire.gap / MICROS_PER_SEC, wire.x, wire.y, wire.z)
    }
}

/// Decodes one binary network unit. Anything other than exactly 20 bytes
/// is malformed.
pub fn decode_binary(unit: &[u8]) -> Result<Sample, DecodeError> {
    if unit.len() != BINARY_FRAME_LEN {
        return Err(DecodeError::BadLength(unit.len()));
    }
    let stream_id = u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]);
    let gap_us = u32::from_le_bytes([unit[4], unit[5], unit[6], unit[7]]);
    let x = f32::from_le_bytes([unit[8], unit[9], unit[10], unit[11]]);
    let y = f32::from_le_bytes([unit[12], unit[13], unit[14], unit[15]]);
    let z = f32::from_le_bytes([unit[16], unit[17], unit[18], unit[19]]);
    Ok(Sample::new(stream_id, gap_us as f64 / MICROS_PER_SEC, x, y, z))
}

/// Decodes one JSON text message: an array of sample objects. Objects
/// missing required fields are skipped individually with a warning; a
/// message that is not a JSON array fails wholesale.
pub fn decode_json_batch(message: &str) -> Result<Vec<Sample>, DecodeError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(message)?;
    let mut samples = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<WireSample>(entry) {
            Ok(wire) => samples.push(Sample::from(wire)),
            Err(e) => warn!("Skipping sample with missing or invalid fields: {e}"),
        }
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(stream_id: u32, gap_us: u32, x: f32, y: f32, z: f32) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BINARY_FRAME_LEN);
        bytes.extend_from_slice(&stream_id.to_le_bytes());
        bytes.extend_from_slice(&gap_us.to_le_bytes());
        bytes.extend_from_slice(&x.to_le_bytes());
        bytes.extend_from_slice(&y.to_le_bytes());
        bytes.extend_from_slice(&z.to_le_bytes());
        bytes
    }

    #[test]
    fn binary_frame_decodes_with_gap_in_seconds() {
        let sample = decode_binary(&frame(7, 500_000, 1.5, -2.0, 9.81)).unwrap();
        assert_eq!(sample.stream_id, 7);
        assert!((sample.gap - 0.5).abs() < 1e-12);
        assert_eq!(sample.x, 1.5);
        assert_eq!(sample.y, -2.0);
        assert_eq!(sample.z, 9.81);
    }

    #[test]
    fn short_frame_is_rejected() {
        let bytes = frame(7, 1_000_000, 0.0, 0.0, 0.0);
        let err = decode_binary(&bytes[..19]).unwrap_err();
        assert!(matches!(err, DecodeError::BadLength(19)));
    }

    #[test]
    fn long_frame_is_rejected() {
        let mut bytes = frame(7, 1_000_000, 0.0, 0.0, 0.0);
        bytes.push(0);
        assert!(decode_binary(&bytes).is_err());
    }

    #[test]
    fn json_batch_decodes_all_valid_entries() {
        let message = r#"[
            {"idx": 1, "gap": 1000000, "x": 0.1, "y": 0.2, "z": 0.3},
            {"idx": 2, "gap": 250000, "x": -1.0, "y": 0.0, "z": 1.0}
        ]"#;
        let samples = decode_json_batch(message).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].stream_id, 1);
        assert!((samples[0].gap - 1.0).abs() < 1e-12);
        assert!((samples[1].gap - 0.25).abs() < 1e-12);
    }

    #[test]
    fn json_entry_missing_key_is_skipped_alone() {
        let message = r#"[
            {"idx": 1, "gap": 1000000, "x": 0.1, "y": 0.2, "z": 0.3},
            {"idx": 2, "gap": 1000000, "x": 0.1, "y": 0.2}
        ]"#;
        let samples = decode_json_batch(message).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].stream_id, 1);
    }

    #[test]
    fn non_array_message_fails_wholesale() {
        assert!(decode_json_batch("not json at all").is_err());
        assert!(decode_json_batch(r#"{"idx": 1}"#).is_err());
    }
}
