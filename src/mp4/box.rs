use crate::errors::{MalformedContainerError, SalvageResult, TruncatedContainerError};
use std::io::Read;

use crate::bits::reader::{read_u32, read_u32_be, read_u64, read_u64_be};

/// Box header information
#[derive(Debug)]
pub struct BoxHeader {
    pub name: String,
    pub name_bytes: [u8; 4],
    /// Resolved size: 0 means the box extends to the end of its enclosing scope
    pub size: u64,
    pub header_size: u64,
}

/// Read a box header from an io source
pub fn read_box_header<R: Read>(r: &mut R) -> SalvageResult<BoxHeader> {
    let size32 = read_u32_be(r).map_err(|e| {
        TruncatedContainerError::new(format!("Failed to read box size: {}", e))
    })?;
    let mut name_buf = [0u8; 4];
    r.read_exact(&mut name_buf).map_err(|e| {
        TruncatedContainerError::new(format!("Failed to read box name: {}", e))
    })?;
    let mut size = size32 as u64;
    let mut header_size = 8u64;
    if size32 == 1 {
        size = read_u64_be(r).map_err(|e| {
            TruncatedContainerError::new(format!("Failed to read extended box size: {}", e))
        })?;
        header_size = 16;
    }
    if size != 0 && size < header_size {
        return Err(MalformedContainerError::new(format!(
            "Box '{}' declares size {} smaller than its {}-byte header",
            String::from_utf8_lossy(&name_buf),
            size,
            header_size
        ))
        .into());
    }
    Ok(BoxHeader {
        name: String::from_utf8_lossy(&name_buf).into_owned(),
        name_bytes: name_buf,
        size,
        header_size,
    })
}

/// Parse a box header from a byte slice advancing the cursor
pub fn parse_box_header(data: &[u8], pos: &mut usize) -> Option<(String, u64)> {
    if *pos + 8 > data.len() {
        return None;
    }
    let size = read_u32(data, pos)? as u64;
    let name = &data[*pos..*pos + 4];
    *pos += 4;
    let mut real_size = size;
    if size == 1 {
        if *pos + 8 > data.len() {
            return None;
        }
        real_size = read_u64(data, pos)?;
    }
    Some((String::from_utf8_lossy(name).into_owned(), real_size))
}

/// Write a box header to a vector
pub fn write_box_header(output: &mut Vec<u8>, name: &str, size: u32) {
    output.extend_from_slice(&size.to_be_bytes());
    output.extend_from_slice(name.as_bytes());
}

/// Write a box header in the 64-bit size form (32-bit field holds the sentinel 1)
pub fn write_box_header64(output: &mut Vec<u8>, name: &str, size: u64) {
    output.extend_from_slice(&1u32.to_be_bytes());
    output.extend_from_slice(name.as_bytes());
    output.extend_from_slice(&size.to_be_bytes());
}

/// Find a box and return the contained slice
pub fn find_box<'a>(data: &'a [u8], name: &str) -> Option<&'a [u8]> {
    let (_, start, end) = find_box_range(data, name)?;
    Some(&data[start..end])
}

/// Find a box and return the start and end indices of its payload
pub fn find_box_range(data: &[u8], name: &str) -> Option<(usize, usize, usize)> {
    let mut pos = 0usize;
    let mut iterations = 0; // Add safety counter

    while pos + 8 <= data.len() && iterations < 10000 {
        // Add iteration limit
        let start = pos;
        let (box_name, size) = parse_box_header(data, &mut pos)?;

        let payload_start = pos;
        let payload_end = if size == 0 {
            // Extends to the end of the enclosing scope
            data.len()
        } else {
            if (size as usize) < pos - start {
                // Invalid box size
                return None;
            }
            if size as usize > data.len() - start {
                return None;
            }
            start + size as usize
        };

        if box_name == name {
            return Some((start, payload_start, payload_end));
        }

        pos = payload_end;
        iterations += 1;

        // Additional safety: ensure we're making progress
        if pos <= start {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{
        find_box, find_box_range, read_box_header, write_box_header, write_box_header64,
    };
    use std::io::Cursor;

    #[test]
    fn test_header_round_trip_small_size() {
        let mut buf = Vec::new();
        write_box_header(&mut buf, "stsz", 0x2c);
        let header = read_box_header(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(header.name, "stsz");
        assert_eq!(header.name_bytes, *b"stsz");
        assert_eq!(header.size, 0x2c);
        assert_eq!(header.header_size, 8);
    }

    #[test]
    fn test_header_round_trip_64_bit_boundary() {
        let mut buf = Vec::new();
        write_box_header64(&mut buf, "mdat", 0xFFFF_FFFF);
        let header = read_box_header(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(header.name, "mdat");
        assert_eq!(header.size, 0xFFFF_FFFF);
        assert_eq!(header.header_size, 16);
    }

    #[test]
    fn test_header_size_zero_passes_through() {
        let mut buf = Vec::new();
        write_box_header(&mut buf, "mdat", 0);
        let header = read_box_header(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(header.size, 0);
        assert_eq!(header.header_size, 8);
    }

    #[test]
    fn test_header_smaller_than_itself_rejected() {
        let mut buf = Vec::new();
        write_box_header(&mut buf, "free", 4);
        assert!(read_box_header(&mut Cursor::new(&buf)).is_err());
    }

    #[test]
    fn test_find_box_skips_siblings() {
        let mut data = Vec::new();
        write_box_header(&mut data, "free", 12);
        data.extend_from_slice(&[0u8; 4]);
        write_box_header(&mut data, "stco", 10);
        data.extend_from_slice(&[0xAA, 0xBB]);
        assert_eq!(find_box(&data, "stco"), Some(&[0xAAu8, 0xBB][..]));
        assert_eq!(find_box_range(&data, "stco"), Some((12, 20, 22)));
        assert!(find_box(&data, "stsz").is_none());
    }
}
