use serde::Serialize;

use crate::errors::{MalformedContainerError, SalvageResult};
use crate::mp4::mvhd::{u16_at, u32_at, u64_at};

/// Decoded track header fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackHeaderInfo {
    pub version: u8,
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub layer: u16,
    pub alternate_group: u16,
    /// 8.8 fixed point volume, raw
    pub volume: u16,
    /// 16.16 fixed point width, raw
    pub width: u32,
    /// 16.16 fixed point height, raw
    pub height: u32,
}

/// Parse the payload of a tkhd (track header) box
pub fn parse_tkhd(payload: &[u8]) -> SalvageResult<TrackHeaderInfo> {
    if payload.len() < 84 {
        return Err(MalformedContainerError::new(format!(
            "tkhd payload is {} bytes, expected at least 84",
            payload.len()
        ))
        .into());
    }

    let version = payload[0];
    if version == 1 {
        // Version 1: 64-bit times
        if payload.len() < 96 {
            return Err(MalformedContainerError::new(format!(
                "tkhd v1 payload is {} bytes, expected at least 96",
                payload.len()
            ))
            .into());
        }
        Ok(TrackHeaderInfo {
            version,
            creation_time: u64_at(payload, 4),
            modification_time: u64_at(payload, 12),
            track_id: u32_at(payload, 20),
            duration: u64_at(payload, 28),
            layer: u16_at(payload, 44),
            alternate_group: u16_at(payload, 46),
            volume: u16_at(payload, 48),
            width: u32_at(payload, 88),
            height: u32_at(payload, 92),
        })
    } else {
        // Version 0: 32-bit times
        Ok(TrackHeaderInfo {
            version,
            creation_time: u32_at(payload, 4) as u64,
            modification_time: u32_at(payload, 8) as u64,
            track_id: u32_at(payload, 12),
            duration: u32_at(payload, 20) as u64,
            layer: u16_at(payload, 32),
            alternate_group: u16_at(payload, 34),
            volume: u16_at(payload, 36),
            width: u32_at(payload, 76),
            height: u32_at(payload, 80),
        })
    }
}
