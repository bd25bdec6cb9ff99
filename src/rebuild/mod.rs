pub mod layout;
pub use layout::{
    media_duration, rescale_duration, DurationParameters, MoovLayout, SampleToChunkPolicy,
    TrackLayout,
};
pub mod synthesizer;
pub use synthesizer::synthesize_moov;
