pub const BASE_SAMPLE_RATE: f32 = 8_000.0;
pub const DEFAULT_SAMPLES_PER_FRAME: usize = 512;
pub const MAX_SAMPLES_PER_FRAME: usize = 2048;
pub const MAX_WINDOW_TO_ANALYZE_S: f32 = 3.0;
pub const MAX_TX_LENGTH: usize = 256;

/// Pitch estimation search band defaults (Hz).
pub const DEFAULT_FREQUENCY_MIN_HZ: f32 = 200.0;
pub const DEFAULT_FREQUENCY_MAX_HZ: f32 = 1200.0;

/// A pitch estimate moving more than this between frames is treated as a
/// new transmission.
pub const PITCH_JUMP_HZ: f32 = 100.0;

/// Consecutive empty capture pulls before the controller drops back to
/// idle (inactivity window for the resampler reset rule).
pub const IDLE_CALLS_TO_RESET: u32 = 50;

/// Duration of one dot in milliseconds at the given speed.
///
/// From the "PARIS" standard: one word is 50 dot units, so
/// 1 WPM = 1.2 s per dot.
pub fn dot_len_ms(speed_wpm: f32) -> f32 {
    60_000.0 / (50.0 * speed_wpm)
}
