//! Audio sample formats
//!
//! Capture and playback buffers are raw bytes in one of the supported
//! PCM formats; the pipeline works on float32 in [-1, 1]. Conversions
//! use the natural scale of each format: divide by 128 for 8-bit and by
//! 32768 for 16-bit, with unsigned formats shifted by the midpoint.

/// Data format of the audio samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    #[default]
    Undefined,
    U8,
    I8,
    U16,
    I16,
    F32,
}

impl SampleFormat {
    /// Size of one sample in bytes. `Undefined` has no size.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Undefined => 0,
            SampleFormat::U8 | SampleFormat::I8 => 1,
            SampleFormat::U16 | SampleFormat::I16 => 2,
            SampleFormat::F32 => 4,
        }
    }
}

/// Convert raw capture bytes into float32 samples.
///
/// `bytes.len()` must be a multiple of the sample size; the caller
/// enforces that as part of the capture contract.
pub fn bytes_to_f32(format: SampleFormat, bytes: &[u8], dst: &mut Vec<f32>) {
    dst.clear();
    match format {
        SampleFormat::Undefined => {}
        SampleFormat::U8 => {
            dst.extend(bytes.iter().map(|&b| (b as i16 - 128) as f32 / 128.0));
        }
        SampleFormat::I8 => {
            dst.extend(bytes.iter().map(|&b| (b as i8) as f32 / 128.0));
        }
        SampleFormat::U16 => {
            dst.extend(bytes.chunks_exact(2).map(|c| {
                let v = u16::from_ne_bytes([c[0], c[1]]);
                (v as i32 - 32768) as f32 / 32768.0
            }));
        }
        SampleFormat::I16 => {
            dst.extend(bytes.chunks_exact(2).map(|c| {
                i16::from_ne_bytes([c[0], c[1]]) as f32 / 32768.0
            }));
        }
        SampleFormat::F32 => {
            dst.extend(bytes.chunks_exact(4).map(|c| {
                f32::from_ne_bytes([c[0], c[1], c[2], c[3]])
            }));
        }
    }
}

/// Convert float32 samples into raw playback bytes.
pub fn f32_to_bytes(format: SampleFormat, samples: &[f32], dst: &mut Vec<u8>) {
    dst.clear();
    match format {
        SampleFormat::Undefined => {}
        SampleFormat::U8 => {
            dst.extend(samples.iter().map(|&s| (128.0 * (s + 1.0)) as u8));
        }
        SampleFormat::I8 => {
            dst.extend(samples.iter().map(|&s| (128.0 * s) as i8 as u8));
        }
        SampleFormat::U16 => {
            for &s in samples {
                let v = (32768.0 * (s + 1.0)) as u16;
                dst.extend_from_slice(&v.to_ne_bytes());
            }
        }
        SampleFormat::I16 => {
            for &s in samples {
                dst.extend_from_slice(&f32_to_i16(s).to_ne_bytes());
            }
        }
        SampleFormat::F32 => {
            for &s in samples {
                dst.extend_from_slice(&s.to_ne_bytes());
            }
        }
    }
}

/// Scale a float sample to 16-bit PCM, saturating at the rails.
pub fn f32_to_i16(sample: f32) -> i16 {
    (32768.0 * sample).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
