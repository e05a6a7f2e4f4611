//! General-ratio windowed-sinc resampler
//!
//! Band-limited interpolation with a Blackman-windowed sinc kernel of
//! half-width [`KERNEL_HALF_WIDTH`]. The kernel is tabulated per
//! fractional phase and linearly interpolated between phases; a
//! `2 * KERNEL_HALF_WIDTH` input-side history is carried across calls so
//! the output is bit-for-bit deterministic for a given call sequence.
//!
//! `ratio` is output samples per input sample (`< 1` when converting a
//! capture rate down to the base rate).

use snafu::Snafu;

/// Sinc kernel half-width in input samples.
pub const KERNEL_HALF_WIDTH: usize = 32;

const PHASE_COUNT: usize = 256;

#[derive(Debug, Snafu)]
pub enum ResampleError {
    /// The sinc kernel needs more than its own width of fresh input.
    #[snafu(display("resample input too short: {provided} samples (minimum {minimum})"))]
    InputTooShort { provided: usize, minimum: usize },
}

pub struct Resampler {
    history: Vec<f32>,
    frac_pos: f64,
    total_input: usize,

    table: Vec<f32>,
    table_ratio: f64,

    work: Vec<f32>,
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Resampler {
    pub fn new() -> Self {
        Resampler {
            history: vec![0.0; 2 * KERNEL_HALF_WIDTH],
            frac_pos: KERNEL_HALF_WIDTH as f64,
            total_input: 0,
            table: Vec::new(),
            table_ratio: 0.0,
            work: Vec::new(),
        }
    }

    /// Total input samples consumed since construction or the last
    /// `reset`. Drives the controller's periodic idle reset.
    pub fn total_input_samples(&self) -> usize {
        self.total_input
    }

    /// Drop carried history and position state.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.frac_pos = KERNEL_HALF_WIDTH as f64;
        self.total_input = 0;
    }

    /// How many fresh input samples are needed so that the next
    /// `resample` call yields at least `n_out` output samples.
    pub fn required_input(&self, ratio: f64, n_out: usize) -> usize {
        let w = KERNEL_HALF_WIDTH as f64;
        let last_pos = self.frac_pos + (n_out as f64 - 1.0) / ratio;
        let needed_len = (last_pos + w + 1.0).ceil() as usize;
        needed_len
            .saturating_sub(2 * KERNEL_HALF_WIDTH)
            .max(2 * KERNEL_HALF_WIDTH + 1)
    }

    /// Resample `input` at `ratio`, writing into `output` and returning
    /// the number of samples produced. At steady state this produces
    /// about `input.len() * ratio` samples per call.
    pub fn resample(
        &mut self,
        ratio: f64,
        input: &[f32],
        output: &mut [f32],
    ) -> Result<usize, ResampleError> {
        let w = KERNEL_HALF_WIDTH;
        if input.len() <= 2 * w {
            return Err(ResampleError::InputTooShort {
                provided: input.len(),
                minimum: 2 * w + 1,
            });
        }

        if ratio != self.table_ratio {
            self.build_table(ratio);
        }

        self.work.clear();
        self.work.extend_from_slice(&self.history);
        self.work.extend_from_slice(input);
        let len = self.work.len();

        let step = 1.0 / ratio;
        let mut n_out = 0;
        loop {
            let ip = self.frac_pos.floor() as usize;
            if ip + w >= len || n_out >= output.len() {
                break;
            }

            let frac = self.frac_pos - ip as f64;
            let phase = frac * PHASE_COUNT as f64;
            let p0 = phase.floor() as usize;
            let t = (phase - p0 as f64) as f32;

            let taps0 = &self.table[p0 * 2 * w..(p0 + 1) * 2 * w];
            let taps1 = &self.table[(p0 + 1) * 2 * w..(p0 + 2) * 2 * w];
            let window = &self.work[ip + 1 - w..ip + 1 + w];

            let mut acc0 = 0.0f32;
            let mut acc1 = 0.0f32;
            for ((&x, &t0), &t1) in window.iter().zip(taps0).zip(taps1) {
                acc0 += x * t0;
                acc1 += x * t1;
            }

            output[n_out] = acc0 + t * (acc1 - acc0);
            n_out += 1;
            self.frac_pos += step;
        }

        // carry the kernel width of trailing input into the next call
        let consumed = len - 2 * w;
        self.history.copy_from_slice(&self.work[consumed..]);
        self.frac_pos -= consumed as f64;
        // only reachable when the caller's output buffer cut the run
        // short; keeps the kernel window in bounds on the next call
        if self.frac_pos < w as f64 {
            self.frac_pos = w as f64;
        }
        self.total_input += input.len();

        Ok(n_out)
    }

    fn build_table(&mut self, ratio: f64) {
        let w = KERNEL_HALF_WIDTH;
        let cutoff = 0.95 * ratio.min(1.0);

        self.table.clear();
        self.table.reserve((PHASE_COUNT + 2) * 2 * w);
        for p in 0..PHASE_COUNT + 2 {
            let frac = p as f64 / PHASE_COUNT as f64;
            let mut taps = [0.0f64; 2 * KERNEL_HALF_WIDTH];
            let mut sum = 0.0f64;
            for (j, tap) in taps.iter_mut().enumerate() {
                // distance from the interpolation point, in input samples
                let d = j as f64 + 1.0 - w as f64 - frac;
                *tap = cutoff * sinc(cutoff * d) * blackman(d / w as f64);
                sum += *tap;
            }
            // unity DC gain per phase
            for tap in &taps {
                self.table.push((tap / sum) as f32);
            }
        }
        self.table_ratio = ratio;
    }
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-9 {
        1.0
    } else {
        let px = std::f64::consts::PI * x;
        px.sin() / px
    }
}

fn blackman(x: f64) -> f64 {
    if x.abs() >= 1.0 {
        return 0.0;
    }
    let px = std::f64::consts::PI * x;
    0.42 + 0.5 * px.cos() + 0.08 * (2.0 * px).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_too_short_input_fails() {
        let mut resampler = Resampler::new();
        let input = vec![0.0; 2 * KERNEL_HALF_WIDTH];
        let mut output = vec![0.0; 128];
        assert!(resampler.resample(0.5, &input, &mut output).is_err());
    }

    #[test]
    fn test_output_count_near_ratio() {
        let mut resampler = Resampler::new();
        let input = sine(440.0, 44100.0, 4410);
        let mut output = vec![0.0; 4096];

        let ratio = 8000.0 / 44100.0;
        let n = resampler.resample(ratio, &input, &mut output).unwrap();
        let expected = (input.len() as f64 * ratio) as usize;
        assert!(
            (n as i64 - expected as i64).unsigned_abs() as usize <= KERNEL_HALF_WIDTH,
            "n = {n}, expected about {expected}"
        );
    }

    #[test]
    fn test_determinism() {
        let input = sine(700.0, 11025.0, 2048);
        let run = || {
            let mut resampler = Resampler::new();
            let mut output = vec![0.0; 4096];
            let n = resampler
                .resample(8000.0 / 11025.0, &input, &mut output)
                .unwrap();
            output.truncate(n);
            output
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_preserves_tone_frequency() {
        // resample a 440 Hz tone from 44.1 kHz to 8 kHz and count zero
        // crossings to confirm the pitch survived
        let mut resampler = Resampler::new();
        let input = sine(440.0, 44100.0, 44100);
        let mut output = vec![0.0; 16384];
        let n = resampler
            .resample(8000.0 / 44100.0, &input, &mut output)
            .unwrap();
        let output = &output[KERNEL_HALF_WIDTH..n];

        let mut crossings = 0;
        for pair in output.windows(2) {
            if pair[0] < 0.0 && pair[1] >= 0.0 {
                crossings += 1;
            }
        }
        let seconds = output.len() as f32 / 8000.0;
        let measured = crossings as f32 / seconds;
        assert!((measured - 440.0).abs() < 5.0, "measured {measured} Hz");
    }

    #[test]
    fn test_required_input_is_sufficient() {
        let resampler = Resampler::new();
        let ratio = 8000.0 / 44100.0;
        let n_in = resampler.required_input(ratio, 512);

        let mut fresh = Resampler::new();
        let input = vec![0.25f32; n_in];
        let mut output = vec![0.0; 2 * 512 + n_in];
        let n = fresh.resample(ratio, &input, &mut output).unwrap();
        assert!(n >= 512, "produced {n}");
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut resampler = Resampler::new();
        let input = sine(440.0, 44100.0, 4410);
        let mut output = vec![0.0; 4096];
        resampler
            .resample(8000.0 / 44100.0, &input, &mut output)
            .unwrap();
        assert!(resampler.total_input_samples() > 0);

        resampler.reset();
        assert_eq!(resampler.total_input_samples(), 0);

        let mut out_a = vec![0.0; 4096];
        let n_a = resampler
            .resample(8000.0 / 44100.0, &input, &mut out_a)
            .unwrap();

        let mut fresh = Resampler::new();
        let mut out_b = vec![0.0; 4096];
        let n_b = fresh.resample(8000.0 / 44100.0, &input, &mut out_b).unwrap();

        assert_eq!(n_a, n_b);
        assert_eq!(out_a, out_b);
    }
}
