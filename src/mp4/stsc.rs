use serde::Serialize;

use crate::errors::{MalformedContainerError, SalvageResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleToChunkEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_id: u32,
}

/// Parse the payload of an stsc (sample to chunk) box
///
/// Entries that would read past the end of the payload are dropped rather
/// than treated as an error; unfinalized captures routinely declare more
/// entries than the box actually carries.
pub fn parse_stsc(payload: &[u8]) -> SalvageResult<Vec<SampleToChunkEntry>> {
    if payload.len() < 8 {
        return Err(MalformedContainerError::new(
            "stsc payload too small: expected at least 8 bytes",
        )
        .into());
    }

    let entry_count = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let mut entries = Vec::new();

    for i in 0..entry_count {
        let entry_pos = 8 + (i as usize * 12);
        if entry_pos + 12 > payload.len() {
            break;
        }
        let first_chunk = u32::from_be_bytes([
            payload[entry_pos],
            payload[entry_pos + 1],
            payload[entry_pos + 2],
            payload[entry_pos + 3],
        ]);
        let samples_per_chunk = u32::from_be_bytes([
            payload[entry_pos + 4],
            payload[entry_pos + 5],
            payload[entry_pos + 6],
            payload[entry_pos + 7],
        ]);
        let sample_description_id = u32::from_be_bytes([
            payload[entry_pos + 8],
            payload[entry_pos + 9],
            payload[entry_pos + 10],
            payload[entry_pos + 11],
        ]);

        entries.push(SampleToChunkEntry {
            first_chunk,
            samples_per_chunk,
            sample_description_id,
        });
    }

    Ok(entries)
}
