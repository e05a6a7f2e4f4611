//! DSP building blocks for the decode pipeline

pub mod filter;
pub mod goertzel;
pub mod resampler;
pub mod stfft;

pub use filter::{Filter, FilterType};
pub use goertzel::GoertzelRunningFir;
pub use resampler::{ResampleError, Resampler};
pub use stfft::Stfft;
