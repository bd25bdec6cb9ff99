use crate::errors::{MalformedContainerError, SalvageResult};

/// Parse the payload of an stss (sync sample) box
///
/// Entries past the end of the payload are dropped.
pub fn parse_stss(payload: &[u8]) -> SalvageResult<Vec<u32>> {
    if payload.len() < 8 {
        return Err(MalformedContainerError::new(
            "stss payload too small: expected at least 8 bytes",
        )
        .into());
    }

    let entry_count = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let mut sync_samples = Vec::new();

    for i in 0..entry_count {
        let entry_pos = 8 + (i as usize * 4);
        if entry_pos + 4 > payload.len() {
            break;
        }
        let sample_number = u32::from_be_bytes([
            payload[entry_pos],
            payload[entry_pos + 1],
            payload[entry_pos + 2],
            payload[entry_pos + 3],
        ]);
        sync_samples.push(sample_number);
    }

    Ok(sync_samples)
}
