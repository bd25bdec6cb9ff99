use crate::errors::{MalformedContainerError, SalvageResult};

/// Parse the payload of an stco (32-bit chunk offset) box
///
/// Offsets are widened to u64 so callers handle both width variants the same
/// way. Entries past the end of the payload are dropped.
pub fn parse_stco(payload: &[u8]) -> SalvageResult<Vec<u64>> {
    if payload.len() < 8 {
        return Err(MalformedContainerError::new(
            "stco payload too small: expected at least 8 bytes",
        )
        .into());
    }

    let entry_count = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let mut offsets = Vec::new();

    for i in 0..entry_count {
        let offset_pos = 8 + (i as usize * 4);
        if offset_pos + 4 > payload.len() {
            break;
        }
        let offset = u32::from_be_bytes([
            payload[offset_pos],
            payload[offset_pos + 1],
            payload[offset_pos + 2],
            payload[offset_pos + 3],
        ]) as u64;
        offsets.push(offset);
    }

    Ok(offsets)
}

/// Parse the payload of a co64 (64-bit chunk offset) box
pub fn parse_co64(payload: &[u8]) -> SalvageResult<Vec<u64>> {
    if payload.len() < 8 {
        return Err(MalformedContainerError::new(
            "co64 payload too small: expected at least 8 bytes",
        )
        .into());
    }

    let entry_count = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let mut offsets = Vec::new();

    for i in 0..entry_count {
        let offset_pos = 8 + (i as usize * 8);
        if offset_pos + 8 > payload.len() {
            break;
        }
        let offset = u64::from_be_bytes([
            payload[offset_pos],
            payload[offset_pos + 1],
            payload[offset_pos + 2],
            payload[offset_pos + 3],
            payload[offset_pos + 4],
            payload[offset_pos + 5],
            payload[offset_pos + 6],
            payload[offset_pos + 7],
        ]);
        offsets.push(offset);
    }

    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::{parse_co64, parse_stco};

    #[test]
    fn test_parse_stco() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&2u32.to_be_bytes());
        payload.extend_from_slice(&0x30u32.to_be_bytes());
        payload.extend_from_slice(&0x1234u32.to_be_bytes());
        assert_eq!(parse_stco(&payload).unwrap(), vec![0x30, 0x1234]);
    }

    #[test]
    fn test_parse_co64() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&0x1_0000_0000u64.to_be_bytes());
        assert_eq!(parse_co64(&payload).unwrap(), vec![0x1_0000_0000]);
    }

    #[test]
    fn test_overlong_declared_count_truncates() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&9u32.to_be_bytes());
        payload.extend_from_slice(&0x40u32.to_be_bytes());
        assert_eq!(parse_stco(&payload).unwrap(), vec![0x40]);
    }
}
