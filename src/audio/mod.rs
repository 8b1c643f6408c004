pub mod decode;
pub mod dsp;
pub mod stitch;
pub mod wav;

pub use stitch::AudioStitcher;
