pub mod alphabet;
pub mod bridge;
pub mod constants;
pub mod dsp;
pub mod encoder;
pub mod modem;
pub mod sample_format;
pub mod segmenter;
pub mod simulation;
pub mod tracing_init;

pub use modem::{DecodeParams, EncodeParams, MorseModem, Parameters, Spectrogram, Statistics};
pub use sample_format::SampleFormat;
