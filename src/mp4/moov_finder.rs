use std::io::{Read, Seek, SeekFrom};

use log::info;

use crate::errors::{SalvageResult, TruncatedContainerError};
use crate::mp4::walk::find_top_level_box;

/// Location of a moov box within a file
#[derive(Debug, Clone)]
pub struct MoovBoxInfo {
    pub position: u64,
    pub size: u64,
}

/// Find the moov box by walking the top-level box sequence
///
/// Returns position and resolved size of the moov box.
pub fn find_moov_box<R: Read + Seek>(src: &mut R) -> SalvageResult<MoovBoxInfo> {
    let file_size = src.seek(SeekFrom::End(0))?;
    let (position, header) = find_top_level_box(src, "moov")?.ok_or_else(|| {
        TruncatedContainerError::new(
            "moov box not found: the file was never finalized or its metadata was lost",
        )
    })?;
    let size = if header.size == 0 {
        file_size - position
    } else {
        header.size
    };
    if size > file_size - position {
        return Err(TruncatedContainerError::new(format!(
            "moov box at offset {} declares {} bytes but the file ends after {}",
            position,
            size,
            file_size - position
        ))
        .into());
    }
    info!("Found moov box at offset {} ({} bytes)", position, size);
    Ok(MoovBoxInfo { position, size })
}

/// Find the moov box and read it whole, header included
///
/// The returned buffer is the structural template the synthesizer patches;
/// it replaces the intermediate file the recovery flow previously required.
pub fn find_and_read_moov_box<R: Read + Seek>(src: &mut R) -> SalvageResult<Vec<u8>> {
    let moov_info = find_moov_box(src)?;
    src.seek(SeekFrom::Start(moov_info.position))?;
    let mut moov = vec![0u8; moov_info.size as usize];
    src.read_exact(&mut moov)?;
    Ok(moov)
}
