pub mod r#box;
pub use r#box::{
    find_box, find_box_range, parse_box_header, read_box_header, write_box_header,
    write_box_header64, BoxHeader,
};
pub mod walk;
pub use walk::{find_top_level_box, walk_boxes, BoxDetail, BoxRecord};
pub mod moov_finder;
pub use moov_finder::{find_and_read_moov_box, find_moov_box, MoovBoxInfo};
pub mod mvhd;
pub use mvhd::{parse_mvhd, MovieHeaderInfo};
pub mod tkhd;
pub use tkhd::{parse_tkhd, TrackHeaderInfo};
pub mod mdhd;
pub use mdhd::{parse_mdhd, MediaHeaderInfo};
pub mod stsd;
pub use stsd::{parse_stsd, SampleDescriptionEntry};
pub mod stco;
pub use stco::{parse_co64, parse_stco};
pub mod stsz;
pub use stsz::{parse_stsz, SampleSizeTable};
pub mod stsc;
pub use stsc::{parse_stsc, SampleToChunkEntry};
pub mod stts;
pub use stts::{parse_stts, SttsEntry};
pub mod stss;
pub use stss::parse_stss;
