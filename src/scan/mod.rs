pub mod boundary;
pub mod scanner;

pub use boundary::{AacFrameBoundary, AvcAccessUnitBoundary, FrameBoundary, ScanProfile};
pub use scanner::{locate_mdat_span, scan_media_data, MdatSpan, RecoveredSamples, SampleRecord};
