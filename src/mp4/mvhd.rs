use serde::Serialize;

use crate::errors::{MalformedContainerError, SalvageResult};

/// Decoded movie header fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieHeaderInfo {
    pub version: u8,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    /// 16.16 fixed point playback rate, raw
    pub preferred_rate: u32,
    /// 8.8 fixed point volume, raw
    pub preferred_volume: u16,
    pub next_track_id: u32,
}

/// Parse the payload of an mvhd (movie header) box
pub fn parse_mvhd(payload: &[u8]) -> SalvageResult<MovieHeaderInfo> {
    if payload.len() < 100 {
        return Err(MalformedContainerError::new(format!(
            "mvhd payload is {} bytes, expected at least 100",
            payload.len()
        ))
        .into());
    }

    let version = payload[0];
    if version == 1 {
        // Version 1: 64-bit times
        if payload.len() < 112 {
            return Err(MalformedContainerError::new(format!(
                "mvhd v1 payload is {} bytes, expected at least 112",
                payload.len()
            ))
            .into());
        }
        Ok(MovieHeaderInfo {
            version,
            creation_time: u64_at(payload, 4),
            modification_time: u64_at(payload, 12),
            timescale: u32_at(payload, 20),
            duration: u64_at(payload, 24),
            preferred_rate: u32_at(payload, 32),
            preferred_volume: u16_at(payload, 36),
            next_track_id: u32_at(payload, 108),
        })
    } else {
        // Version 0: 32-bit times
        Ok(MovieHeaderInfo {
            version,
            creation_time: u32_at(payload, 4) as u64,
            modification_time: u32_at(payload, 8) as u64,
            timescale: u32_at(payload, 12),
            duration: u32_at(payload, 16) as u64,
            preferred_rate: u32_at(payload, 20),
            preferred_volume: u16_at(payload, 24),
            next_track_id: u32_at(payload, 96),
        })
    }
}

pub(crate) fn u16_at(data: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([data[pos], data[pos + 1]])
}

pub(crate) fn u32_at(data: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

pub(crate) fn u64_at(data: &[u8], pos: usize) -> u64 {
    u64::from_be_bytes([
        data[pos],
        data[pos + 1],
        data[pos + 2],
        data[pos + 3],
        data[pos + 4],
        data[pos + 5],
        data[pos + 6],
        data[pos + 7],
    ])
}
