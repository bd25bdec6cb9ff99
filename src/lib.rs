pub mod bits;

pub mod mp4;
pub use mp4::{find_and_read_moov_box, find_moov_box, walk_boxes, BoxDetail, BoxRecord, MoovBoxInfo};

pub mod scan;
pub use scan::{
    locate_mdat_span, scan_media_data, AacFrameBoundary, AvcAccessUnitBoundary, FrameBoundary,
    MdatSpan, RecoveredSamples, SampleRecord, ScanProfile,
};

pub mod rebuild;
pub use rebuild::{synthesize_moov, DurationParameters, MoovLayout, SampleToChunkPolicy};

pub mod merge;
pub use merge::merge_file;

pub mod recover;
pub use recover::{
    extract_audio, inspect_file, recover, DeviceProfile, ExtractReport, RecoverOptions,
    RecoverReport,
};

pub mod errors;
pub use errors::{SalvageError, SalvageResult};
