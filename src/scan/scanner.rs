use std::io::{Read, Seek, SeekFrom};

use log::{debug, info};

use crate::errors::{SalvageResult, TruncatedContainerError};
use crate::mp4::walk::find_top_level_box;
use crate::scan::boundary::{ScanProfile, MARKER_WINDOW};

/// Location of the media-data payload within a capture file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MdatSpan {
    /// First payload byte, right after the box header
    pub payload_start: u64,
    /// One past the last payload byte
    pub payload_end: u64,
    /// 8, or 16 when the size field is the 64-bit extension sentinel
    pub header_size: u64,
    /// Resolved declared size; 0 for an unfinalized capture
    pub declared_size: u64,
}

impl MdatSpan {
    pub fn payload_len(&self) -> u64 {
        self.payload_end - self.payload_start
    }
}

/// One recovered frame: absolute file position and byte length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    pub offset: u64,
    pub size: u64,
}

/// The two per-stream record sequences, in scan order
#[derive(Debug, Default)]
pub struct RecoveredSamples {
    pub video: Vec<SampleRecord>,
    pub audio: Vec<SampleRecord>,
}

/// Locate the mdat box and resolve its payload span
///
/// An unfinalized capture reserves the 64-bit size form with a zero size;
/// its payload then runs to the physical end of the file.
pub fn locate_mdat_span<R: Read + Seek>(src: &mut R) -> SalvageResult<MdatSpan> {
    let file_size = src.seek(SeekFrom::End(0))?;
    let (offset, header) = find_top_level_box(src, "mdat")?.ok_or_else(|| {
        TruncatedContainerError::new("mdat box not found: no media payload to recover")
    })?;
    let payload_start = offset + header.header_size;
    let payload_end = if header.size == 0 {
        file_size
    } else {
        offset + header.size
    };
    Ok(MdatSpan {
        payload_start,
        payload_end,
        header_size: header.header_size,
        declared_size: header.size,
    })
}

/// Re-derive the per-stream sample records from the raw interleaved payload
///
/// At each cursor position a fixed lookahead window picks the stream: a
/// video access-unit marker starts a video run, anything else an audio run.
/// The cursor advances by exactly the measured run, and a run reaching the
/// payload end is truncated there and still recorded, so the records tile
/// the span with no gaps and no overlaps.
pub fn scan_media_data<R: Read + Seek>(
    src: &mut R,
    span: &MdatSpan,
    profile: &ScanProfile,
) -> SalvageResult<RecoveredSamples> {
    let mut recovered = RecoveredSamples::default();
    let mut cursor = span.payload_start;
    let end = span.payload_end;
    let mut window = [0u8; MARKER_WINDOW];

    info!(
        "Scanning {} bytes of media payload at offset {}",
        span.payload_len(),
        span.payload_start
    );

    while cursor < end {
        let have = ((end - cursor).min(MARKER_WINDOW as u64)) as usize;
        src.seek(SeekFrom::Start(cursor))?;
        src.read_exact(&mut window[..have])?;

        let is_video = profile.video.is_frame_start(&window[..have]);
        let strategy = if is_video {
            &profile.video
        } else {
            &profile.audio
        };
        let run = strategy.measure_run(src, cursor, end)?;
        debug!(
            "[{}] offset {}, {} bytes",
            strategy.stream_name(),
            cursor,
            run
        );
        let record = SampleRecord {
            offset: cursor,
            size: run,
        };
        if is_video {
            recovered.video.push(record);
        } else {
            recovered.audio.push(record);
        }
        cursor += run;
    }

    info!(
        "Recovered {} video and {} audio samples",
        recovered.video.len(),
        recovered.audio.len()
    );
    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::{locate_mdat_span, scan_media_data, MdatSpan, SampleRecord};
    use crate::mp4::r#box::{write_box_header, write_box_header64};
    use crate::scan::boundary::ScanProfile;
    use proptest::prelude::*;
    use std::io::Cursor;

    const AU_DELIMITER: [u8; 6] = [0x00, 0x00, 0x00, 0x02, 0x09, 0xF0];

    /// A video access unit: delimiter plus length-prefixed units with bodies
    /// that can never alias the delimiter or an audio lead byte
    fn video_access_unit(unit_bodies: &[usize]) -> Vec<u8> {
        let mut unit = AU_DELIMITER.to_vec();
        for &len in unit_bodies {
            unit.extend_from_slice(&(len as u32).to_be_bytes());
            unit.extend_from_slice(&vec![0x80; len]);
        }
        unit
    }

    /// An audio frame: a channel-pair lead byte then filler that can never
    /// alias the video marker
    fn audio_frame(len: usize) -> Vec<u8> {
        let mut frame = vec![0x21];
        frame.extend_from_slice(&vec![0x99; len - 1]);
        frame
    }

    fn unfinalized_capture(payload: &[u8]) -> Vec<u8> {
        let mut file = Vec::new();
        write_box_header(&mut file, "ftyp", 24);
        file.extend_from_slice(&[0u8; 16]);
        write_box_header64(&mut file, "mdat", 0);
        file.extend_from_slice(payload);
        file
    }

    #[test]
    fn test_locate_unfinalized_span() {
        let file = unfinalized_capture(&[0xAA; 100]);
        let span = locate_mdat_span(&mut Cursor::new(&file)).unwrap();
        assert_eq!(span.header_size, 16);
        assert_eq!(span.declared_size, 0);
        assert_eq!(span.payload_start, 40);
        assert_eq!(span.payload_end, file.len() as u64);
        assert_eq!(span.payload_len(), 100);
    }

    #[test]
    fn test_locate_finalized_span() {
        let mut file = Vec::new();
        write_box_header(&mut file, "ftyp", 24);
        file.extend_from_slice(&[0u8; 16]);
        write_box_header(&mut file, "mdat", 58);
        file.extend_from_slice(&[0xAA; 50]);

        let span = locate_mdat_span(&mut Cursor::new(&file)).unwrap();
        assert_eq!(span.header_size, 8);
        assert_eq!(span.declared_size, 58);
        assert_eq!(span.payload_start, 32);
        assert_eq!(span.payload_end, 82);
    }

    #[test]
    fn test_scan_alternating_runs_tile_the_span() {
        let mut payload = Vec::new();
        let mut expected_video = Vec::new();
        let mut expected_audio = Vec::new();
        for (units, audio_len) in [(vec![40usize], 20usize), (vec![12, 30], 9), (vec![7], 64)] {
            let unit = video_access_unit(&units);
            expected_video.push(unit.len() as u64);
            payload.extend_from_slice(&unit);
            let frame = audio_frame(audio_len);
            expected_audio.push(frame.len() as u64);
            payload.extend_from_slice(&frame);
        }
        let file = unfinalized_capture(&payload);

        let mut cursor = Cursor::new(&file);
        let span = locate_mdat_span(&mut cursor).unwrap();
        let recovered =
            scan_media_data(&mut cursor, &span, &ScanProfile::default()).unwrap();

        let video_sizes: Vec<u64> = recovered.video.iter().map(|r| r.size).collect();
        let audio_sizes: Vec<u64> = recovered.audio.iter().map(|r| r.size).collect();
        assert_eq!(video_sizes, expected_video);
        assert_eq!(audio_sizes, expected_audio);
        assert_tiling(&recovered.video, &recovered.audio, &span);
    }

    #[test]
    fn test_scan_truncated_final_video_run() {
        let mut payload = video_access_unit(&[16]);
        payload.extend_from_slice(&audio_frame(10));
        payload.extend_from_slice(&AU_DELIMITER);
        payload.extend_from_slice(&300u32.to_be_bytes());
        payload.extend_from_slice(&[0x80; 21]);
        let file = unfinalized_capture(&payload);

        let mut cursor = Cursor::new(&file);
        let span = locate_mdat_span(&mut cursor).unwrap();
        let recovered =
            scan_media_data(&mut cursor, &span, &ScanProfile::default()).unwrap();

        assert_eq!(recovered.video.len(), 2);
        assert_eq!(recovered.audio.len(), 1);
        let last = recovered.video.last().unwrap();
        assert_eq!(last.offset + last.size, span.payload_end);
        assert_tiling(&recovered.video, &recovered.audio, &span);
    }

    #[test]
    fn test_scan_short_tail_becomes_audio() {
        let mut payload = video_access_unit(&[8]);
        payload.extend_from_slice(&[0x21, 0x99, 0x99, 0x99, 0x99]);
        let file = unfinalized_capture(&payload);

        let mut cursor = Cursor::new(&file);
        let span = locate_mdat_span(&mut cursor).unwrap();
        let recovered =
            scan_media_data(&mut cursor, &span, &ScanProfile::default()).unwrap();

        assert_eq!(recovered.video.len(), 1);
        assert_eq!(recovered.audio.len(), 1);
        assert_eq!(recovered.audio[0].size, 5);
        assert_tiling(&recovered.video, &recovered.audio, &span);
    }

    fn assert_tiling(video: &[SampleRecord], audio: &[SampleRecord], span: &MdatSpan) {
        let mut all: Vec<SampleRecord> = video.iter().chain(audio.iter()).copied().collect();
        all.sort_by_key(|r| r.offset);
        let mut cursor = span.payload_start;
        for record in &all {
            assert_eq!(record.offset, cursor, "gap or overlap at {}", cursor);
            assert!(record.size > 0);
            cursor += record.size;
        }
        assert_eq!(cursor, span.payload_end);
    }

    proptest! {
        /// Any alternation of well-formed runs is recovered exactly
        #[test]
        fn prop_scan_covers_interleaved_payload(
            runs in prop::collection::vec((1usize..=3, 1usize..=48, 7usize..=64), 1..12)
        ) {
            let mut payload = Vec::new();
            let mut n_video = 0usize;
            let mut n_audio = 0usize;
            for (unit_count, unit_len, audio_len) in runs {
                payload.extend_from_slice(&video_access_unit(&vec![unit_len; unit_count]));
                n_video += 1;
                payload.extend_from_slice(&audio_frame(audio_len));
                n_audio += 1;
            }
            let file = unfinalized_capture(&payload);

            let mut cursor = Cursor::new(&file);
            let span = locate_mdat_span(&mut cursor).unwrap();
            let recovered =
                scan_media_data(&mut cursor, &span, &ScanProfile::default()).unwrap();

            prop_assert_eq!(recovered.video.len(), n_video);
            prop_assert_eq!(recovered.audio.len(), n_audio);
            let recovered_total: u64 = recovered
                .video
                .iter()
                .chain(recovered.audio.iter())
                .map(|r| r.size)
                .sum();
            prop_assert_eq!(recovered_total, span.payload_len());
        }
    }
}
