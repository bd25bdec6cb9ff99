use serde::Serialize;

use crate::errors::{MalformedContainerError, SalvageResult};

/// One entry of the sample description table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleDescriptionEntry {
    pub size: u32,
    /// Four-character sample data format, e.g. "avc1" or "mp4a"
    pub format: String,
    pub data_reference_index: u16,
}

/// Parse the payload of an stsd (sample description) box
///
/// Each entry is itself a sized record; only the common header fields are
/// decoded, the codec-specific remainder is skipped. Entries that do not
/// fully fit in the payload are dropped.
pub fn parse_stsd(payload: &[u8]) -> SalvageResult<Vec<SampleDescriptionEntry>> {
    if payload.len() < 8 {
        return Err(MalformedContainerError::new(
            "stsd payload too small: expected at least 8 bytes",
        )
        .into());
    }

    let entry_count = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let mut entries = Vec::new();
    let mut pos = 8usize;

    for _ in 0..entry_count {
        if pos + 16 > payload.len() {
            break;
        }
        let size = u32::from_be_bytes([
            payload[pos],
            payload[pos + 1],
            payload[pos + 2],
            payload[pos + 3],
        ]);
        let format = String::from_utf8_lossy(&payload[pos + 4..pos + 8]).into_owned();
        let data_reference_index = u16::from_be_bytes([payload[pos + 14], payload[pos + 15]]);
        entries.push(SampleDescriptionEntry {
            size,
            format,
            data_reference_index,
        });
        // an entry smaller than its own fixed header cannot be stepped over
        if size < 16 {
            break;
        }
        pos += size as usize;
    }

    Ok(entries)
}
