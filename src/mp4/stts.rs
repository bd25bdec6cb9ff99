use serde::Serialize;

use crate::errors::{MalformedContainerError, SalvageResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

/// Parse the payload of an stts (time to sample) box
///
/// Entries past the end of the payload are dropped.
pub fn parse_stts(payload: &[u8]) -> SalvageResult<Vec<SttsEntry>> {
    if payload.len() < 8 {
        return Err(MalformedContainerError::new(
            "stts payload too small: expected at least 8 bytes",
        )
        .into());
    }

    let entry_count = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let mut entries = Vec::new();

    for i in 0..entry_count {
        let entry_pos = 8 + (i as usize * 8);
        if entry_pos + 8 > payload.len() {
            break;
        }
        let sample_count = u32::from_be_bytes([
            payload[entry_pos],
            payload[entry_pos + 1],
            payload[entry_pos + 2],
            payload[entry_pos + 3],
        ]);
        let sample_delta = u32::from_be_bytes([
            payload[entry_pos + 4],
            payload[entry_pos + 5],
            payload[entry_pos + 6],
            payload[entry_pos + 7],
        ]);

        entries.push(SttsEntry {
            sample_count,
            sample_delta,
        });
    }

    Ok(entries)
}
