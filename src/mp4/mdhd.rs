use serde::Serialize;

use crate::errors::{MalformedContainerError, SalvageResult};
use crate::mp4::mvhd::{u16_at, u32_at, u64_at};

/// Decoded media header fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaHeaderInfo {
    pub version: u8,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    /// Packed ISO 639-2 language code, raw
    pub language: u16,
    pub quality: u16,
}

/// Parse the payload of an mdhd (media header) box
pub fn parse_mdhd(payload: &[u8]) -> SalvageResult<MediaHeaderInfo> {
    if payload.len() < 24 {
        return Err(MalformedContainerError::new(format!(
            "mdhd payload is {} bytes, expected at least 24",
            payload.len()
        ))
        .into());
    }

    let version = payload[0];
    if version == 1 {
        // Version 1: 64-bit times
        if payload.len() < 36 {
            return Err(MalformedContainerError::new(format!(
                "mdhd v1 payload is {} bytes, expected at least 36",
                payload.len()
            ))
            .into());
        }
        Ok(MediaHeaderInfo {
            version,
            creation_time: u64_at(payload, 4),
            modification_time: u64_at(payload, 12),
            timescale: u32_at(payload, 20),
            duration: u64_at(payload, 24),
            language: u16_at(payload, 32),
            quality: u16_at(payload, 34),
        })
    } else {
        // Version 0: 32-bit times
        Ok(MediaHeaderInfo {
            version,
            creation_time: u32_at(payload, 4) as u64,
            modification_time: u32_at(payload, 8) as u64,
            timescale: u32_at(payload, 12),
            duration: u32_at(payload, 16) as u64,
            language: u16_at(payload, 20),
            quality: u16_at(payload, 22),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::parse_mdhd;

    #[test]
    fn test_parse_version_0() {
        let mut payload = vec![0u8; 24];
        payload[12..16].copy_from_slice(&30000u32.to_be_bytes());
        payload[16..20].copy_from_slice(&300300u32.to_be_bytes());
        payload[20..22].copy_from_slice(&0x55C4u16.to_be_bytes());
        let info = parse_mdhd(&payload).unwrap();
        assert_eq!(info.version, 0);
        assert_eq!(info.timescale, 30000);
        assert_eq!(info.duration, 300300);
        assert_eq!(info.language, 0x55C4);
    }

    #[test]
    fn test_parse_version_1() {
        let mut payload = vec![0u8; 36];
        payload[0] = 1;
        payload[20..24].copy_from_slice(&48000u32.to_be_bytes());
        payload[24..32].copy_from_slice(&0x2_0000_0000u64.to_be_bytes());
        let info = parse_mdhd(&payload).unwrap();
        assert_eq!(info.timescale, 48000);
        assert_eq!(info.duration, 0x2_0000_0000);
    }

    #[test]
    fn test_short_payload_rejected() {
        assert!(parse_mdhd(&[0u8; 12]).is_err());
    }
}
