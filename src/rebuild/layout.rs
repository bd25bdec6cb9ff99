use serde::{Deserialize, Serialize};

/// Externally supplied timing constants for the two streams
///
/// Every duration field the synthesizer writes derives from these plus the
/// recovered sample counts; nothing is inferred from sample content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationParameters {
    /// Ticks per video sample in the video track timescale
    pub video_sample_duration: u32,
    /// Ticks per audio sample in the audio track timescale
    pub audio_sample_duration: u32,
    pub movie_timescale: u32,
    pub video_timescale: u32,
    pub audio_timescale: u32,
}

impl DurationParameters {
    /// Timing constants of the Insta360 ONE X encoder (29.97 fps video,
    /// 1024-sample AAC frames at 48 kHz)
    pub fn insta360_one_x() -> Self {
        DurationParameters {
            video_sample_duration: 1001,
            audio_sample_duration: 1024,
            movie_timescale: 48000,
            video_timescale: 30000,
            audio_timescale: 48000,
        }
    }
}

impl Default for DurationParameters {
    fn default() -> Self {
        Self::insta360_one_x()
    }
}

/// Media duration of a track in its own timescale
pub fn media_duration(sample_count: u64, sample_duration: u32) -> u64 {
    sample_count * sample_duration as u64
}

/// Rescale a duration between timescales with truncating division
pub fn rescale_duration(value: u64, target_timescale: u32, source_timescale: u32) -> u64 {
    value * target_timescale as u64 / source_timescale as u64
}

/// How the synthesizer treats a track's sample-to-chunk box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SampleToChunkPolicy {
    /// Copy the reference table unchanged; the recovered capture is assumed
    /// to share the reference's chunking granularity
    Copy { expected_size: u64 },
    /// Replace the table with the single entry (1, 1, 1): recovery stores
    /// every sample in its own chunk
    RewriteSingleEntry,
}

/// Structural template of one track inside the reference moov
///
/// Box sizes here are device/firmware constants. A parsed reference box
/// whose size disagrees with its constant is a fatal layout violation, not
/// something to patch over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackLayout {
    pub tkhd_size: u64,
    pub elst_size: u64,
    /// Byte offset of the duration slot inside the elst payload
    pub elst_duration_offset: usize,
    pub mdhd_size: u64,
    pub hdlr_size: u64,
    /// "vmhd" for the video track, "smhd" for the audio track
    pub media_info_header: String,
    pub media_info_header_size: u64,
    pub dinf_size: u64,
    pub stsd_size: u64,
    pub stts_size: u64,
    pub sample_to_chunk: SampleToChunkPolicy,
    /// Fixed keyframe interval for the rebuilt sync-sample table, if the
    /// track has one
    pub sync_sample_interval: Option<u32>,
}

/// Structural template of the reference moov
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoovLayout {
    pub mvhd_size: u64,
    pub video: TrackLayout,
    pub audio: TrackLayout,
}

impl MoovLayout {
    /// Layout constants of Insta360 ONE X firmware captures
    pub fn insta360_one_x() -> Self {
        MoovLayout {
            mvhd_size: 108,
            video: TrackLayout {
                tkhd_size: 92,
                elst_size: 28,
                elst_duration_offset: 8,
                mdhd_size: 32,
                hdlr_size: 45,
                media_info_header: "vmhd".to_string(),
                media_info_header_size: 20,
                dinf_size: 36,
                stsd_size: 171,
                stts_size: 24,
                sample_to_chunk: SampleToChunkPolicy::Copy { expected_size: 28 },
                sync_sample_interval: Some(150),
            },
            audio: TrackLayout {
                tkhd_size: 92,
                elst_size: 40,
                elst_duration_offset: 12,
                mdhd_size: 32,
                hdlr_size: 45,
                media_info_header: "smhd".to_string(),
                media_info_header_size: 16,
                dinf_size: 36,
                stsd_size: 103,
                stts_size: 24,
                sample_to_chunk: SampleToChunkPolicy::RewriteSingleEntry,
                sync_sample_interval: None,
            },
        }
    }
}

impl Default for MoovLayout {
    fn default() -> Self {
        Self::insta360_one_x()
    }
}

#[cfg(test)]
mod tests {
    use super::{media_duration, rescale_duration, DurationParameters, MoovLayout};

    #[test]
    fn test_track_duration_rescaling_truncates() {
        let media = media_duration(100, 1001);
        assert_eq!(media, 100100);
        assert_eq!(rescale_duration(media, 1000, 30000), 3336);
    }

    #[test]
    fn test_stock_parameters() {
        let durations = DurationParameters::default();
        assert_eq!(durations.video_sample_duration, 1001);
        assert_eq!(durations.audio_sample_duration, 1024);
        assert_eq!(durations.movie_timescale, 48000);

        let layout = MoovLayout::default();
        assert_eq!(layout.mvhd_size, 108);
        assert_eq!(layout.video.media_info_header, "vmhd");
        assert_eq!(layout.audio.elst_duration_offset, 12);
        assert_eq!(layout.video.sync_sample_interval, Some(150));
    }

    #[test]
    fn test_layout_round_trips_through_json() {
        let layout = MoovLayout::default();
        let json = serde_json::to_string(&layout).unwrap();
        let back: MoovLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layout);
    }
}
