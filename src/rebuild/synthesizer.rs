//! Rebuilds a finalized moov box from a reference file's metadata and the
//! sample records recovered from a truncated capture.
//!
//! The reference moov is walked in the fixed order the camera firmware
//! writes it: header boxes are copied with their duration fields patched,
//! the sample tables are rebuilt from the recovered records, and every
//! enclosing box size is recomputed from the serialized children.

use log::{debug, info};

use crate::errors::{
    LayoutAssumptionError, MalformedContainerError, SalvageResult, UnexpectedBoxTypeError,
};
use crate::mp4::r#box::{parse_box_header, write_box_header};
use crate::rebuild::layout::{
    media_duration, rescale_duration, DurationParameters, MoovLayout, SampleToChunkPolicy,
    TrackLayout,
};
use crate::scan::SampleRecord;

/// One parsed child box of the reference moov
struct RefBox<'a> {
    name: String,
    /// The whole box including its header
    raw: &'a [u8],
    payload: &'a [u8],
}

/// Sequential reader over the children of a container box payload
struct BoxCursor<'a> {
    data: &'a [u8],
    pos: usize,
    /// Name of the enclosing box, for error messages
    scope: &'static str,
}

impl<'a> BoxCursor<'a> {
    fn new(data: &'a [u8], scope: &'static str) -> Self {
        BoxCursor { data, pos: 0, scope }
    }

    fn next_box(&mut self) -> SalvageResult<RefBox<'a>> {
        let start = self.pos;
        let (name, size) = parse_box_header(self.data, &mut self.pos).ok_or_else(|| {
            MalformedContainerError::new(format!(
                "Box header at offset {} does not fit in the {} box payload",
                start, self.scope
            ))
        })?;
        let header_size = self.pos - start;
        let size = if size == 0 {
            (self.data.len() - start) as u64
        } else {
            size
        };
        if size < header_size as u64 || size > (self.data.len() - start) as u64 {
            return Err(MalformedContainerError::new(format!(
                "Box '{}' at offset {} spans {} bytes but the {} box ends after {}",
                name,
                start,
                size,
                self.scope,
                self.data.len()
            ))
            .into());
        }
        let end = start + size as usize;
        self.pos = end;
        Ok(RefBox {
            name,
            raw: &self.data[start..end],
            payload: &self.data[start + header_size..end],
        })
    }

    /// Next box, which must have the given name
    fn expect_box(&mut self, name: &str) -> SalvageResult<RefBox<'a>> {
        let found = self.next_box()?;
        if found.name != name {
            return Err(UnexpectedBoxTypeError::new(format!(
                "Expected {} box in {}, found {}",
                name, self.scope, found.name
            ))
            .into());
        }
        Ok(found)
    }

    /// Everything not yet consumed
    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

/// A fixed-layout reference box whose size disagrees with the configured
/// constant cannot be patched safely
fn check_size(found: &RefBox<'_>, expected: u64) -> SalvageResult<()> {
    if found.raw.len() as u64 != expected {
        return Err(LayoutAssumptionError::new(format!(
            "{} box is {} bytes, layout expects {}",
            found.name,
            found.raw.len(),
            expected
        ))
        .into());
    }
    Ok(())
}

/// Version and flags word of a full box
fn version_flags(b: &RefBox<'_>) -> SalvageResult<[u8; 4]> {
    if b.payload.len() < 4 {
        return Err(MalformedContainerError::new(format!(
            "{} box payload is too short for a version/flags word",
            b.name
        ))
        .into());
    }
    Ok([b.payload[0], b.payload[1], b.payload[2], b.payload[3]])
}

/// Narrow a computed value to the 32-bit slot it is written into
fn u32_field(value: u64, what: &str) -> SalvageResult<u32> {
    if value > u32::MAX as u64 {
        return Err(LayoutAssumptionError::new(format!(
            "{} {} does not fit in a 32-bit field",
            what, value
        ))
        .into());
    }
    Ok(value as u32)
}

/// Copy of a box with the given 32-bit payload fields overwritten
fn patched_copy(b: &RefBox<'_>, fields: &[(usize, u32)]) -> SalvageResult<Vec<u8>> {
    let header_len = b.raw.len() - b.payload.len();
    let mut out = b.raw.to_vec();
    for &(payload_offset, value) in fields {
        if payload_offset + 4 > b.payload.len() {
            return Err(LayoutAssumptionError::new(format!(
                "{} box payload has no room for a 32-bit field at offset {}",
                b.name, payload_offset
            ))
            .into());
        }
        out[header_len + payload_offset..header_len + payload_offset + 4]
            .copy_from_slice(&value.to_be_bytes());
    }
    Ok(out)
}

/// Wrap serialized children in a container box with a recomputed size
fn wrap_container(name: &str, children: &[&[u8]]) -> SalvageResult<Vec<u8>> {
    let payload_len: u64 = children.iter().map(|c| c.len() as u64).sum();
    let mut out = Vec::with_capacity(8 + payload_len as usize);
    write_box_header(
        &mut out,
        name,
        u32_field(8 + payload_len, &format!("{} box size", name))?,
    );
    for child in children {
        out.extend_from_slice(child);
    }
    Ok(out)
}

/// Per-track duration values, ready to write into 32-bit header slots
struct TrackTiming {
    sample_duration: u32,
    media_duration: u32,
    track_duration: u32,
}

/// Time-to-sample box with a single run covering every recovered sample
fn build_stts(vf: [u8; 4], sample_count: u32, sample_duration: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    write_box_header(&mut out, "stts", 24);
    out.extend_from_slice(&vf);
    out.extend_from_slice(&1u32.to_be_bytes());
    out.extend_from_slice(&sample_count.to_be_bytes());
    out.extend_from_slice(&sample_duration.to_be_bytes());
    out
}

/// Sync-sample box marking every interval-th sample, 1-based
fn build_stss(vf: [u8; 4], sample_count: u32, interval: u32) -> SalvageResult<Vec<u8>> {
    if interval == 0 {
        return Err(LayoutAssumptionError::new("Sync-sample interval must be nonzero").into());
    }
    let entries = if sample_count == 0 {
        0
    } else {
        (sample_count - 1) / interval + 1
    };
    let size = 16 + 4 * entries as u64;
    let mut out = Vec::with_capacity(size as usize);
    write_box_header(&mut out, "stss", u32_field(size, "stss box size")?);
    out.extend_from_slice(&vf);
    out.extend_from_slice(&entries.to_be_bytes());
    for i in 0..entries {
        out.extend_from_slice(&(1 + i * interval).to_be_bytes());
    }
    Ok(out)
}

/// Sample-to-chunk box with the single entry (1, 1, 1): every sample is
/// its own chunk
fn build_single_entry_stsc(vf: [u8; 4]) -> Vec<u8> {
    let mut out = Vec::with_capacity(28);
    write_box_header(&mut out, "stsc", 28);
    out.extend_from_slice(&vf);
    for value in [1u32, 1, 1, 1] {
        out.extend_from_slice(&value.to_be_bytes());
    }
    out
}

/// Sample-size box with per-sample sizes and default size 0
fn build_stsz(vf: [u8; 4], samples: &[SampleRecord]) -> SalvageResult<Vec<u8>> {
    let size = 20 + 4 * samples.len() as u64;
    let mut out = Vec::with_capacity(size as usize);
    write_box_header(&mut out, "stsz", u32_field(size, "stsz box size")?);
    out.extend_from_slice(&vf);
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&u32_field(samples.len() as u64, "sample count")?.to_be_bytes());
    for record in samples {
        out.extend_from_slice(&u32_field(record.size, "sample size")?.to_be_bytes());
    }
    Ok(out)
}

/// Chunk-offset box in the reference's numeric width
fn build_chunk_offsets(
    name: &str,
    vf: [u8; 4],
    samples: &[SampleRecord],
) -> SalvageResult<Vec<u8>> {
    let wide = name == "co64";
    let record_width: u64 = if wide { 8 } else { 4 };
    let size = 16 + record_width * samples.len() as u64;
    let mut out = Vec::with_capacity(size as usize);
    write_box_header(&mut out, name, u32_field(size, "chunk-offset box size")?);
    out.extend_from_slice(&vf);
    out.extend_from_slice(&u32_field(samples.len() as u64, "chunk count")?.to_be_bytes());
    for record in samples {
        if wide {
            out.extend_from_slice(&record.offset.to_be_bytes());
        } else {
            out.extend_from_slice(&u32_field(record.offset, "chunk offset")?.to_be_bytes());
        }
    }
    Ok(out)
}

fn rebuild_stbl(
    stbl: &RefBox<'_>,
    track: &TrackLayout,
    samples: &[SampleRecord],
    timing: &TrackTiming,
) -> SalvageResult<Vec<u8>> {
    let mut cursor = BoxCursor::new(stbl.payload, "stbl");

    let stsd = cursor.expect_box("stsd")?;
    check_size(&stsd, track.stsd_size)?;

    let stts = cursor.expect_box("stts")?;
    check_size(&stts, track.stts_size)?;
    let sample_count = u32_field(samples.len() as u64, "sample count")?;
    let new_stts = build_stts(version_flags(&stts)?, sample_count, timing.sample_duration);

    let new_stss = match track.sync_sample_interval {
        Some(interval) => {
            let stss = cursor.expect_box("stss")?;
            Some(build_stss(version_flags(&stss)?, sample_count, interval)?)
        }
        None => None,
    };

    let stsc = cursor.expect_box("stsc")?;
    let new_stsc = match &track.sample_to_chunk {
        SampleToChunkPolicy::Copy { expected_size } => {
            check_size(&stsc, *expected_size)?;
            stsc.raw.to_vec()
        }
        SampleToChunkPolicy::RewriteSingleEntry => build_single_entry_stsc(version_flags(&stsc)?),
    };

    let stsz = cursor.expect_box("stsz")?;
    let new_stsz = build_stsz(version_flags(&stsz)?, samples)?;

    let offsets = cursor.next_box()?;
    if offsets.name != "stco" && offsets.name != "co64" {
        return Err(UnexpectedBoxTypeError::new(format!(
            "Expected stco or co64 box in stbl, found {}",
            offsets.name
        ))
        .into());
    }
    let new_offsets = build_chunk_offsets(&offsets.name, version_flags(&offsets)?, samples)?;

    // sample-group boxes after the chunk table ride along unchanged
    let mut parts: Vec<&[u8]> = vec![stsd.raw, &new_stts];
    if let Some(stss) = &new_stss {
        parts.push(stss);
    }
    parts.push(&new_stsc);
    parts.push(&new_stsz);
    parts.push(&new_offsets);
    parts.push(cursor.rest());
    wrap_container("stbl", &parts)
}

fn rebuild_minf(
    minf: &RefBox<'_>,
    track: &TrackLayout,
    samples: &[SampleRecord],
    timing: &TrackTiming,
) -> SalvageResult<Vec<u8>> {
    let mut cursor = BoxCursor::new(minf.payload, "minf");

    let header = cursor.expect_box(&track.media_info_header)?;
    check_size(&header, track.media_info_header_size)?;

    let dinf = cursor.expect_box("dinf")?;
    check_size(&dinf, track.dinf_size)?;

    let stbl = cursor.expect_box("stbl")?;
    let new_stbl = rebuild_stbl(&stbl, track, samples, timing)?;

    wrap_container("minf", &[header.raw, dinf.raw, &new_stbl, cursor.rest()])
}

fn rebuild_mdia(
    mdia: &RefBox<'_>,
    track: &TrackLayout,
    samples: &[SampleRecord],
    timing: &TrackTiming,
) -> SalvageResult<Vec<u8>> {
    let mut cursor = BoxCursor::new(mdia.payload, "mdia");

    let mdhd = cursor.expect_box("mdhd")?;
    check_size(&mdhd, track.mdhd_size)?;
    let new_mdhd = patched_copy(&mdhd, &[(16, timing.media_duration)])?;

    let hdlr = cursor.expect_box("hdlr")?;
    check_size(&hdlr, track.hdlr_size)?;

    let minf = cursor.expect_box("minf")?;
    let new_minf = rebuild_minf(&minf, track, samples, timing)?;

    wrap_container("mdia", &[&new_mdhd, hdlr.raw, &new_minf, cursor.rest()])
}

fn rebuild_trak(
    trak: &RefBox<'_>,
    track: &TrackLayout,
    samples: &[SampleRecord],
    timing: &TrackTiming,
) -> SalvageResult<Vec<u8>> {
    let mut cursor = BoxCursor::new(trak.payload, "trak");

    // version 0 headers: the duration slots sit at fixed payload offsets
    let tkhd = cursor.expect_box("tkhd")?;
    check_size(&tkhd, track.tkhd_size)?;
    let new_tkhd = patched_copy(&tkhd, &[(20, timing.track_duration)])?;

    let edts = cursor.expect_box("edts")?;
    let mut edts_cursor = BoxCursor::new(edts.payload, "edts");
    let elst = edts_cursor.expect_box("elst")?;
    check_size(&elst, track.elst_size)?;
    let new_elst = patched_copy(&elst, &[(track.elst_duration_offset, timing.track_duration)])?;
    let new_edts = wrap_container("edts", &[&new_elst, edts_cursor.rest()])?;

    let mdia = cursor.expect_box("mdia")?;
    let new_mdia = rebuild_mdia(&mdia, track, samples, timing)?;

    wrap_container("trak", &[&new_tkhd, &new_edts, &new_mdia, cursor.rest()])
}

/// Build a complete moov box for the recovered capture
///
/// `reference_moov` is the whole moov box of the finalized reference file,
/// header included. Duration fields are derived from the recovered sample
/// counts and `durations`; `layout` pins the box sizes the reference is
/// required to have.
pub fn synthesize_moov(
    reference_moov: &[u8],
    video: &[SampleRecord],
    audio: &[SampleRecord],
    durations: &DurationParameters,
    layout: &MoovLayout,
) -> SalvageResult<Vec<u8>> {
    if durations.video_timescale == 0 || durations.audio_timescale == 0 {
        return Err(LayoutAssumptionError::new("Configured track timescales must be nonzero").into());
    }

    let mut pos = 0usize;
    let (name, size) = parse_box_header(reference_moov, &mut pos).ok_or_else(|| {
        MalformedContainerError::new("Reference moov is too short to hold a box header")
    })?;
    if name != "moov" {
        return Err(
            UnexpectedBoxTypeError::new(format!("Expected moov box, found {}", name)).into(),
        );
    }
    let end = if size == 0 {
        reference_moov.len()
    } else {
        if size < pos as u64 || size > reference_moov.len() as u64 {
            return Err(MalformedContainerError::new(format!(
                "moov box declares {} bytes but {} were provided",
                size,
                reference_moov.len()
            ))
            .into());
        }
        size as usize
    };
    let mut cursor = BoxCursor::new(&reference_moov[pos..end], "moov");

    let video_media = media_duration(video.len() as u64, durations.video_sample_duration);
    let audio_media = media_duration(audio.len() as u64, durations.audio_sample_duration);
    let video_track =
        rescale_duration(video_media, durations.movie_timescale, durations.video_timescale);
    let audio_track =
        rescale_duration(audio_media, durations.movie_timescale, durations.audio_timescale);
    let movie = video_track.max(audio_track);
    debug!(
        "Durations: video {} media / {} movie ticks, audio {} media / {} movie ticks, movie {}",
        video_media, video_track, audio_media, audio_track, movie
    );

    let video_timing = TrackTiming {
        sample_duration: durations.video_sample_duration,
        media_duration: u32_field(video_media, "video media duration")?,
        track_duration: u32_field(video_track, "video track duration")?,
    };
    let audio_timing = TrackTiming {
        sample_duration: durations.audio_sample_duration,
        media_duration: u32_field(audio_media, "audio media duration")?,
        track_duration: u32_field(audio_track, "audio track duration")?,
    };

    let mvhd = cursor.expect_box("mvhd")?;
    check_size(&mvhd, layout.mvhd_size)?;
    let new_mvhd = patched_copy(
        &mvhd,
        &[
            (12, durations.movie_timescale),
            (16, u32_field(movie, "movie duration")?),
        ],
    )?;

    let video_trak = cursor.expect_box("trak")?;
    let new_video_trak = rebuild_trak(&video_trak, &layout.video, video, &video_timing)?;

    let audio_trak = cursor.expect_box("trak")?;
    let new_audio_trak = rebuild_trak(&audio_trak, &layout.audio, audio, &audio_timing)?;

    // udta and any other trailing children carry over unchanged
    let out = wrap_container(
        "moov",
        &[&new_mvhd, &new_video_trak, &new_audio_trak, cursor.rest()],
    )?;
    info!(
        "Synthesized moov box: {} bytes, {} video and {} audio samples",
        out.len(),
        video.len(),
        audio.len()
    );
    Ok(out)
}
