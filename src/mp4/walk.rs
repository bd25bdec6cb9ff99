use std::io::{Read, Seek, SeekFrom};

use log::warn;
use serde::Serialize;

use crate::errors::{SalvageResult, TruncatedContainerError};
use crate::mp4::mdhd::{parse_mdhd, MediaHeaderInfo};
use crate::mp4::mvhd::{parse_mvhd, u32_at, MovieHeaderInfo};
use crate::mp4::r#box::{read_box_header, BoxHeader};
use crate::mp4::stco::{parse_co64, parse_stco};
use crate::mp4::stsc::{parse_stsc, SampleToChunkEntry};
use crate::mp4::stsd::{parse_stsd, SampleDescriptionEntry};
use crate::mp4::stss::parse_stss;
use crate::mp4::stsz::parse_stsz;
use crate::mp4::stts::{parse_stts, SttsEntry};
use crate::mp4::tkhd::{parse_tkhd, TrackHeaderInfo};

/// Box types whose payload is a sequence of child boxes
pub const CONTAINER_BOXES: [&str; 7] = ["moov", "trak", "edts", "mdia", "minf", "dinf", "stbl"];

/// Leaf payloads are sampled up to this many bytes for the structural dump;
/// long tables decode to a partial prefix under the decoders' early-stop
/// policy.
const DETAIL_READ_LIMIT: u64 = 128;

/// One box encountered during a structural walk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxRecord {
    pub offset: u64,
    /// Resolved size including the header
    pub size: u64,
    pub header_size: u64,
    pub name: String,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<BoxDetail>,
}

/// Decoded fields for known leaf box types
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BoxDetail {
    MovieHeader(MovieHeaderInfo),
    TrackHeader(TrackHeaderInfo),
    MediaHeader(MediaHeaderInfo),
    SampleDescriptions {
        entry_count: u32,
        entries: Vec<SampleDescriptionEntry>,
    },
    TimeToSample {
        entry_count: u32,
        entries: Vec<SttsEntry>,
    },
    SyncSamples {
        entry_count: u32,
        samples: Vec<u32>,
    },
    SampleToChunk {
        entry_count: u32,
        entries: Vec<SampleToChunkEntry>,
    },
    SampleSizes {
        default_size: u32,
        entry_count: u32,
        sizes: Vec<u32>,
    },
    ChunkOffsets {
        entry_count: u32,
        offsets: Vec<u64>,
    },
}

/// Walk the whole box tree of a container file
///
/// Yields one record per box in encounter order, recursing into the known
/// container types. Read-only: the source is only seeked and read.
pub fn walk_boxes<R: Read + Seek>(src: &mut R) -> SalvageResult<Vec<BoxRecord>> {
    let file_size = src.seek(SeekFrom::End(0))?;
    let mut records = Vec::new();
    scan_range(src, 0, file_size, 0, &mut records)?;
    Ok(records)
}

fn scan_range<R: Read + Seek>(
    src: &mut R,
    start: u64,
    end: u64,
    depth: usize,
    records: &mut Vec<BoxRecord>,
) -> SalvageResult<()> {
    let mut offset = start;
    while offset < end {
        if offset + 8 > end {
            return Err(TruncatedContainerError::new(format!(
                "box header at offset {} does not fit in the {} bytes left of its scope",
                offset,
                end - offset
            ))
            .into());
        }
        src.seek(SeekFrom::Start(offset))?;
        let header = read_box_header(src)?;
        let size = if header.size == 0 {
            // extends to the end of the enclosing scope
            end - offset
        } else {
            header.size
        };
        if size < header.header_size || size > end - offset {
            return Err(TruncatedContainerError::new(format!(
                "box '{}' at offset {} spans {} bytes but its scope ends after {}",
                header.name,
                offset,
                size,
                end - offset
            ))
            .into());
        }

        let is_container = CONTAINER_BOXES.contains(&header.name.as_str());
        let detail = if is_container {
            None
        } else {
            read_detail(src, &header, offset, size)?
        };
        records.push(BoxRecord {
            offset,
            size,
            header_size: header.header_size,
            name: header.name.clone(),
            depth,
            detail,
        });

        if is_container {
            scan_range(src, offset + header.header_size, offset + size, depth + 1, records)?;
        }
        offset += size;
    }
    Ok(())
}

const DETAIL_BOXES: [&str; 10] = [
    "mvhd", "tkhd", "mdhd", "stsd", "stts", "stss", "stsc", "stsz", "stco", "co64",
];

fn read_detail<R: Read + Seek>(
    src: &mut R,
    header: &BoxHeader,
    offset: u64,
    size: u64,
) -> SalvageResult<Option<BoxDetail>> {
    if !DETAIL_BOXES.contains(&header.name.as_str()) {
        return Ok(None);
    }

    let payload_len = size - header.header_size;
    let sampled = payload_len.min(DETAIL_READ_LIMIT) as usize;
    let mut payload = vec![0u8; sampled];
    src.read_exact(&mut payload)?;

    match decode_detail(&header.name, &payload) {
        Ok(detail) => Ok(detail),
        Err(e) => {
            warn!(
                "Could not decode {} payload at offset {}: {}",
                header.name, offset, e
            );
            Ok(None)
        }
    }
}

fn decode_detail(name: &str, payload: &[u8]) -> SalvageResult<Option<BoxDetail>> {
    let detail = match name {
        "mvhd" => BoxDetail::MovieHeader(parse_mvhd(payload)?),
        "tkhd" => BoxDetail::TrackHeader(parse_tkhd(payload)?),
        "mdhd" => BoxDetail::MediaHeader(parse_mdhd(payload)?),
        "stsd" => {
            let entries = parse_stsd(payload)?;
            BoxDetail::SampleDescriptions {
                entry_count: u32_at(payload, 4),
                entries,
            }
        }
        "stts" => {
            let entries = parse_stts(payload)?;
            BoxDetail::TimeToSample {
                entry_count: u32_at(payload, 4),
                entries,
            }
        }
        "stss" => {
            let samples = parse_stss(payload)?;
            BoxDetail::SyncSamples {
                entry_count: u32_at(payload, 4),
                samples,
            }
        }
        "stsc" => {
            let entries = parse_stsc(payload)?;
            BoxDetail::SampleToChunk {
                entry_count: u32_at(payload, 4),
                entries,
            }
        }
        "stsz" => {
            let table = parse_stsz(payload)?;
            BoxDetail::SampleSizes {
                default_size: table.default_size,
                entry_count: table.sample_count,
                sizes: table.sizes,
            }
        }
        "stco" => {
            let offsets = parse_stco(payload)?;
            BoxDetail::ChunkOffsets {
                entry_count: u32_at(payload, 4),
                offsets,
            }
        }
        "co64" => {
            let offsets = parse_co64(payload)?;
            BoxDetail::ChunkOffsets {
                entry_count: u32_at(payload, 4),
                offsets,
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(detail))
}

/// Scan sibling boxes from the start of the file for the first one with the
/// given name, returning its offset and header
pub fn find_top_level_box<R: Read + Seek>(
    src: &mut R,
    name: &str,
) -> SalvageResult<Option<(u64, BoxHeader)>> {
    let file_size = src.seek(SeekFrom::End(0))?;
    let mut offset = 0u64;
    while offset + 8 <= file_size {
        src.seek(SeekFrom::Start(offset))?;
        let header = read_box_header(src)?;
        if header.name == name {
            return Ok(Some((offset, header)));
        }
        let skip = if header.size == 0 {
            file_size - offset
        } else {
            header.size
        };
        if skip > file_size - offset {
            // the sibling overruns the file, nothing findable past it
            return Ok(None);
        }
        offset += skip;
    }
    Ok(None)
}
