//! Assembles the recovered file from the corrupted source and the
//! synthesized moov.

use std::io::{Read, Seek, SeekFrom, Write};

use log::{debug, info};

use crate::errors::{
    MalformedContainerError, NotTruncatedError, SalvageResult, TruncatedContainerError,
    UnexpectedBoxTypeError,
};
use crate::mp4::r#box::{read_box_header, write_box_header64};

pub const COPY_CHUNK_SIZE: usize = 65536;

/// Copy exactly `len` bytes between streams in bounded chunks
pub fn copy_chunked<R: Read, W: Write>(src: &mut R, dst: &mut W, len: u64) -> SalvageResult<()> {
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut remaining = len;
    while remaining > 0 {
        let want = remaining.min(COPY_CHUNK_SIZE as u64) as usize;
        src.read_exact(&mut buf[..want]).map_err(|e| {
            TruncatedContainerError::new(format!("Failed to read media payload: {}", e))
        })?;
        dst.write_all(&buf[..want])?;
        remaining -= want as u64;
    }
    Ok(())
}

/// Write the recovered file: ftyp copied verbatim, a corrected 64-bit mdat
/// header, the source media payload, then the synthesized moov
///
/// Both leading boxes are validated before anything is written. Returns the
/// number of bytes written.
pub fn merge_file<R: Read + Seek, W: Write>(
    src: &mut R,
    moov: &[u8],
    dst: &mut W,
) -> SalvageResult<u64> {
    let file_size = src.seek(SeekFrom::End(0))?;
    src.seek(SeekFrom::Start(0))?;

    let ftyp = read_box_header(src)?;
    if ftyp.name != "ftyp" {
        return Err(UnexpectedBoxTypeError::new(format!(
            "Expected ftyp box at the start of the file, found {}",
            ftyp.name
        ))
        .into());
    }
    if ftyp.size == 0 {
        return Err(MalformedContainerError::new(
            "ftyp box extends to the end of the file, leaving no room for media data",
        )
        .into());
    }
    if ftyp.size > file_size {
        return Err(TruncatedContainerError::new(format!(
            "ftyp box declares {} bytes but the file holds {}",
            ftyp.size, file_size
        ))
        .into());
    }

    src.seek(SeekFrom::Start(ftyp.size))?;
    let mdat = read_box_header(src)?;
    if mdat.name != "mdat" {
        return Err(UnexpectedBoxTypeError::new(format!(
            "Expected mdat box after ftyp, found {}",
            mdat.name
        ))
        .into());
    }
    if mdat.size != 0 {
        return Err(NotTruncatedError::new(format!(
            "mdat box declares {} bytes; the capture was finalized",
            mdat.size
        ))
        .into());
    }

    // everything between the stale mdat header and end of file is payload
    let payload_len = file_size - ftyp.size - mdat.header_size;
    debug!(
        "Merging {} payload bytes behind a {}-byte ftyp and a {}-byte moov",
        payload_len,
        ftyp.size,
        moov.len()
    );

    src.seek(SeekFrom::Start(0))?;
    copy_chunked(src, dst, ftyp.size)?;

    let mut mdat_header = Vec::with_capacity(16);
    write_box_header64(&mut mdat_header, "mdat", 16 + payload_len);
    dst.write_all(&mdat_header)?;

    src.seek(SeekFrom::Start(ftyp.size + mdat.header_size))?;
    copy_chunked(src, dst, payload_len)?;

    dst.write_all(moov)?;

    let total = ftyp.size + 16 + payload_len + moov.len() as u64;
    info!("Merged output: {} bytes", total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::merge_file;
    use crate::errors::SalvageError;
    use crate::mp4::r#box::{write_box_header, write_box_header64};
    use std::io::Cursor;

    fn fake_moov() -> Vec<u8> {
        let mut moov = Vec::new();
        write_box_header(&mut moov, "moov", 32);
        moov.extend_from_slice(&[0xAB; 24]);
        moov
    }

    fn ftyp() -> Vec<u8> {
        let mut buf = Vec::new();
        write_box_header(&mut buf, "ftyp", 24);
        buf.extend_from_slice(&[0x11; 16]);
        buf
    }

    #[test]
    fn test_merge_reserved_16_byte_header() {
        let mut src = ftyp();
        write_box_header64(&mut src, "mdat", 0);
        let payload: Vec<u8> = (0..100).map(|i| i as u8).collect();
        src.extend_from_slice(&payload);

        let moov = fake_moov();
        let mut out = Vec::new();
        let written = merge_file(&mut Cursor::new(&src), &moov, &mut out).unwrap();

        assert_eq!(written as usize, out.len());
        assert_eq!(out[..24], src[..24]);
        assert_eq!(out[24..28], [0, 0, 0, 1]);
        assert_eq!(&out[28..32], b"mdat");
        assert_eq!(
            u64::from_be_bytes(out[32..40].try_into().unwrap()),
            16 + 100
        );
        assert_eq!(out[40..140], payload[..]);
        assert_eq!(out[140..], moov[..]);
    }

    #[test]
    fn test_merge_unfinalized_8_byte_header() {
        let mut src = ftyp();
        write_box_header(&mut src, "mdat", 0);
        src.extend_from_slice(&[0x77; 50]);

        let mut out = Vec::new();
        merge_file(&mut Cursor::new(&src), &fake_moov(), &mut out).unwrap();

        assert_eq!(
            u64::from_be_bytes(out[32..40].try_into().unwrap()),
            16 + 50
        );
        assert_eq!(out[40..90], [0x77; 50]);
    }

    #[test]
    fn test_merge_finalized_capture_is_fatal() {
        let mut src = ftyp();
        write_box_header(&mut src, "mdat", 108);
        src.extend_from_slice(&[0x77; 100]);

        let mut out = Vec::new();
        let err = merge_file(&mut Cursor::new(&src), &fake_moov(), &mut out).unwrap_err();
        assert!(matches!(err, SalvageError::NotTruncated(_)));
        // nothing was written before the validation failed
        assert!(out.is_empty());
    }

    #[test]
    fn test_merge_requires_leading_ftyp() {
        let mut src = Vec::new();
        write_box_header(&mut src, "free", 16);
        src.extend_from_slice(&[0; 8]);

        let mut out = Vec::new();
        let err = merge_file(&mut Cursor::new(&src), &fake_moov(), &mut out).unwrap_err();
        assert!(matches!(err, SalvageError::UnexpectedBox(_)));
        assert!(err.to_string().contains("ftyp"));
    }
}
