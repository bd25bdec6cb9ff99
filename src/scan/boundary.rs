use std::io::{Read, Seek, SeekFrom};

use crate::errors::SalvageResult;

/// Byte source the scanner can reposition while probing for boundaries
pub trait SeekableSource: Read + Seek {}

impl<T: Read + Seek> SeekableSource for T {}

/// Lookahead window the boundary tests inspect
pub const MARKER_WINDOW: usize = 6;

/// True when a window opens a video access unit: a length-prefixed
/// access-unit delimiter NAL, i.e. big-endian length 2 followed by the
/// bytes 0x09 0xF0.
fn access_unit_delimiter(window: &[u8]) -> bool {
    window.len() >= MARKER_WINDOW
        && u32::from_be_bytes([window[0], window[1], window[2], window[3]]) == 2
        && window[4] == 0x09
        && window[5] == 0xF0
}

/// Per-stream frame boundary detection strategy
///
/// The interleaved payload carries no index, so frame extents are inferred
/// from content. Each strategy answers two questions: does a frame of this
/// stream start at the cursor, and how far does it run. Both are heuristics
/// tuned to one encoder's output, kept behind this trait so another device
/// generation can swap in different marker patterns.
pub trait FrameBoundary {
    fn stream_name(&self) -> &'static str;

    /// Whether the window at the cursor opens a frame of this stream
    fn is_frame_start(&self, window: &[u8]) -> bool;

    /// Measure one frame starting at `start`, never running past `end`
    fn measure_run(
        &self,
        src: &mut dyn SeekableSource,
        start: u64,
        end: u64,
    ) -> SalvageResult<u64>;
}

/// Video stream strategy: length-prefixed AVC access units
///
/// An access unit opens with the delimiter NAL and continues through
/// consecutive length-prefixed NAL units. The unit ends where the next
/// 4 bytes start with a raw-AAC channel-pair lead byte (0x20 or 0x21)
/// instead of a plausible length prefix. Consecutive access units with no
/// audio between them therefore merge into a single run; that is a known
/// property of this detector, not a defect to correct.
#[derive(Debug, Clone, Copy)]
pub struct AvcAccessUnitBoundary;

impl FrameBoundary for AvcAccessUnitBoundary {
    fn stream_name(&self) -> &'static str {
        "video"
    }

    fn is_frame_start(&self, window: &[u8]) -> bool {
        access_unit_delimiter(window)
    }

    fn measure_run(
        &self,
        src: &mut dyn SeekableSource,
        start: u64,
        end: u64,
    ) -> SalvageResult<u64> {
        let mut run = MARKER_WINDOW as u64;
        let mut probe = [0u8; 4];
        loop {
            if start + run + 4 > end {
                // no room left for another length prefix
                return Ok(end - start);
            }
            src.seek(SeekFrom::Start(start + run))?;
            src.read_exact(&mut probe)?;
            if probe[0] & 0xFE == 0x20 {
                return Ok(run);
            }
            run += u32::from_be_bytes(probe) as u64 + 4;
            if run >= end - start {
                return Ok(end - start);
            }
        }
    }
}

/// Audio stream strategy: raw AAC frames with no length field
///
/// Anything that does not open a video access unit is audio. The run is
/// measured by rescanning one byte at a time for the next video marker;
/// everything between two access units becomes one record, even if the
/// encoder emitted it as several short frames. There is no independent
/// check that the run is one coherent frame.
#[derive(Debug, Clone, Copy)]
pub struct AacFrameBoundary;

impl FrameBoundary for AacFrameBoundary {
    fn stream_name(&self) -> &'static str {
        "audio"
    }

    fn is_frame_start(&self, window: &[u8]) -> bool {
        !access_unit_delimiter(window)
    }

    fn measure_run(
        &self,
        src: &mut dyn SeekableSource,
        start: u64,
        end: u64,
    ) -> SalvageResult<u64> {
        let mut run = MARKER_WINDOW as u64;
        let mut window = [0u8; MARKER_WINDOW];
        loop {
            if start + run + MARKER_WINDOW as u64 > end {
                // no marker can fit in the remainder, consume it whole
                return Ok(end - start);
            }
            src.seek(SeekFrom::Start(start + run))?;
            src.read_exact(&mut window)?;
            if access_unit_delimiter(&window) {
                return Ok(run);
            }
            run += 1;
        }
    }
}

/// The boundary strategy pair for one device generation
pub struct ScanProfile {
    pub video: Box<dyn FrameBoundary>,
    pub audio: Box<dyn FrameBoundary>,
}

impl ScanProfile {
    /// Strategies matching the Insta360 ONE X encoder conventions
    pub fn insta360_one_x() -> Self {
        ScanProfile {
            video: Box::new(AvcAccessUnitBoundary),
            audio: Box::new(AacFrameBoundary),
        }
    }
}

impl Default for ScanProfile {
    fn default() -> Self {
        Self::insta360_one_x()
    }
}

#[cfg(test)]
mod tests {
    use super::{AacFrameBoundary, AvcAccessUnitBoundary, FrameBoundary};
    use std::io::Cursor;

    const AU_DELIMITER: [u8; 6] = [0x00, 0x00, 0x00, 0x02, 0x09, 0xF0];

    fn video_unit(body: &[u8]) -> Vec<u8> {
        let mut unit = (body.len() as u32).to_be_bytes().to_vec();
        unit.extend_from_slice(body);
        unit
    }

    #[test]
    fn test_video_run_spans_nal_units_until_audio_lead() {
        let mut payload = AU_DELIMITER.to_vec();
        payload.extend_from_slice(&video_unit(&[0x80; 20]));
        payload.extend_from_slice(&video_unit(&[0x90; 9]));
        let video_len = payload.len() as u64;
        payload.extend_from_slice(&[0x21, 0x88, 0x99, 0xAA, 0xBB, 0xCC]);

        let run = AvcAccessUnitBoundary
            .measure_run(&mut Cursor::new(&payload), 0, payload.len() as u64)
            .unwrap();
        assert_eq!(run, video_len);
    }

    #[test]
    fn test_video_run_clamped_at_payload_end() {
        let mut payload = AU_DELIMITER.to_vec();
        // declared unit length reaches far past the available bytes
        payload.extend_from_slice(&500u32.to_be_bytes());
        payload.extend_from_slice(&[0x80; 4]);

        let run = AvcAccessUnitBoundary
            .measure_run(&mut Cursor::new(&payload), 0, payload.len() as u64)
            .unwrap();
        assert_eq!(run, payload.len() as u64);
    }

    #[test]
    fn test_video_marker_requires_full_window() {
        assert!(AvcAccessUnitBoundary.is_frame_start(&AU_DELIMITER));
        assert!(!AvcAccessUnitBoundary.is_frame_start(&AU_DELIMITER[..5]));
        assert!(!AvcAccessUnitBoundary.is_frame_start(&[0x00, 0x00, 0x00, 0x02, 0x09, 0xF1]));
    }

    #[test]
    fn test_audio_accepts_what_video_rejects() {
        assert!(AacFrameBoundary.is_frame_start(&[0x21, 0x99, 0x99, 0x99, 0x99, 0x99]));
        assert!(AacFrameBoundary.is_frame_start(&[0x21, 0x99]));
        assert!(!AacFrameBoundary.is_frame_start(&AU_DELIMITER));
    }

    #[test]
    fn test_audio_run_ends_at_next_video_marker() {
        let mut payload = vec![0x21, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87];
        let audio_len = payload.len() as u64;
        payload.extend_from_slice(&AU_DELIMITER);
        payload.extend_from_slice(&[0x80; 10]);

        let run = AacFrameBoundary
            .measure_run(&mut Cursor::new(&payload), 0, payload.len() as u64)
            .unwrap();
        assert_eq!(run, audio_len);
    }

    #[test]
    fn test_audio_run_consumes_tail_without_marker() {
        let payload = [0x21, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88];
        let run = AacFrameBoundary
            .measure_run(&mut Cursor::new(&payload), 0, payload.len() as u64)
            .unwrap();
        assert_eq!(run, payload.len() as u64);
    }

    #[test]
    fn test_audio_run_shorter_than_window() {
        let payload = [0x21, 0x81, 0x82];
        let run = AacFrameBoundary
            .measure_run(&mut Cursor::new(&payload), 0, payload.len() as u64)
            .unwrap();
        assert_eq!(run, 3);
    }
}
