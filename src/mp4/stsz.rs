use crate::errors::{MalformedContainerError, SalvageResult};

/// Decoded stsz contents. A nonzero `default_size` means every sample shares
/// that size and the box carries no entry table; `sample_count` is the
/// declared count either way.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSizeTable {
    pub default_size: u32,
    pub sample_count: u32,
    pub sizes: Vec<u32>,
}

/// Parse the payload of an stsz (sample size) box
///
/// Per-entry sizes that would read past the end of the payload are dropped
/// rather than treated as an error. The uniform-size form is never expanded
/// into a table: the declared count comes from a header word a damaged
/// capture can set to anything, so nothing is allocated from it.
pub fn parse_stsz(payload: &[u8]) -> SalvageResult<SampleSizeTable> {
    if payload.len() < 12 {
        return Err(MalformedContainerError::new(
            "stsz payload too small: expected at least 12 bytes",
        )
        .into());
    }

    let default_size = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let sample_count = u32::from_be_bytes([payload[8], payload[9], payload[10], payload[11]]);

    if default_size != 0 {
        // All samples have the same size; no entry table follows
        return Ok(SampleSizeTable {
            default_size,
            sample_count,
            sizes: Vec::new(),
        });
    }

    // Individual sample sizes
    let mut sizes = Vec::new();
    for i in 0..sample_count {
        let size_pos = 12 + (i as usize * 4);
        if size_pos + 4 > payload.len() {
            break;
        }
        let size = u32::from_be_bytes([
            payload[size_pos],
            payload[size_pos + 1],
            payload[size_pos + 2],
            payload[size_pos + 3],
        ]);
        sizes.push(size);
    }

    Ok(SampleSizeTable {
        default_size: 0,
        sample_count,
        sizes,
    })
}

#[cfg(test)]
mod tests {
    use super::parse_stsz;

    fn stsz_payload(default_size: u32, declared: u32, sizes: &[u32]) -> Vec<u8> {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&default_size.to_be_bytes());
        payload.extend_from_slice(&declared.to_be_bytes());
        for size in sizes {
            payload.extend_from_slice(&size.to_be_bytes());
        }
        payload
    }

    #[test]
    fn test_per_entry_table() {
        let payload = stsz_payload(0, 3, &[100, 200, 300]);
        let table = parse_stsz(&payload).unwrap();
        assert_eq!(table.default_size, 0);
        assert_eq!(table.sample_count, 3);
        assert_eq!(table.sizes, vec![100, 200, 300]);
    }

    #[test]
    fn test_uniform_size_not_expanded() {
        let payload = stsz_payload(1024, 4, &[]);
        let table = parse_stsz(&payload).unwrap();
        assert_eq!(table.default_size, 1024);
        assert_eq!(table.sample_count, 4);
        assert!(table.sizes.is_empty());
    }

    #[test]
    fn test_overlong_declared_count_truncates() {
        // Declares 5 samples but carries bytes for 2
        let payload = stsz_payload(0, 5, &[7, 8]);
        let table = parse_stsz(&payload).unwrap();
        assert_eq!(table.sample_count, 5);
        assert_eq!(table.sizes, vec![7, 8]);
    }

    #[test]
    fn test_huge_uniform_count_allocates_nothing() {
        // A 12-byte box claiming fifty million uniform samples must not
        // turn the header word into an allocation
        let payload = stsz_payload(1536, 50_000_000, &[]);
        let table = parse_stsz(&payload).unwrap();
        assert_eq!(table.default_size, 1536);
        assert_eq!(table.sample_count, 50_000_000);
        assert!(table.sizes.is_empty());
    }

    #[test]
    fn test_payload_without_header_words_rejected() {
        assert!(parse_stsz(&[0u8; 11]).is_err());
    }
}
