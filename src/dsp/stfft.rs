//! Short-time FFT over a sliding history
//!
//! Keeps a circular history of the base-rate signal and computes a
//! Hamming-windowed power spectrum every `fft_step` samples into a
//! spectrogram ring. Pitch estimation sums bin power over the newer
//! half of the ring, so the estimate tracks roughly the most recent
//! 1.5 s while rejecting momentary peaks.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub struct Stfft {
    sample_rate: f32,
    hamming: Vec<f32>,

    history: Vec<f32>,
    history_head: usize,

    needed_samples: usize,
    fft_step: usize,

    spectrogram: Vec<Vec<f32>>,
    spectrogram_head: usize,

    fft: Arc<dyn Fft<f32>>,
    fft_buffer: Vec<Complex<f32>>,
}

impl Stfft {
    pub fn new(sample_rate: f32, fft_size: usize, fft_step: usize, history_s: f32) -> Self {
        let hamming: Vec<f32> = (0..fft_size)
            .map(|i| {
                0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / fft_size as f32).cos()
            })
            .collect();

        let history_samples = (history_s * sample_rate) as usize;
        let history_steps = 1 + (history_samples - fft_size) / fft_step;

        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        Stfft {
            sample_rate,
            hamming,
            history: vec![0.0; history_samples],
            history_head: 0,
            needed_samples: fft_step,
            fft_step,
            spectrogram: vec![vec![0.0; fft_size]; history_steps],
            spectrogram_head: 0,
            fft,
            fft_buffer: vec![Complex::default(); fft_size],
        }
    }

    /// Append samples to the history; each time `fft_step` new samples
    /// have accumulated, compute one spectrogram frame.
    pub fn process(&mut self, samples: &[f32]) {
        let nw = self.hamming.len();
        let nh = self.history.len();
        let ns = self.spectrogram.len();

        for &sample in samples {
            self.history[self.history_head] = sample;
            self.history_head += 1;
            if self.history_head >= nh {
                self.history_head = 0;
            }

            self.needed_samples -= 1;
            if self.needed_samples == 0 {
                let idx = (self.history_head + nh - nw) % nh;
                self.compute_frame(idx);
                self.spectrogram_head += 1;
                if self.spectrogram_head >= ns {
                    self.spectrogram_head = 0;
                }
                self.needed_samples = self.fft_step;
            }
        }
    }

    /// Strongest frequency in `[f_min_hz, f_max_hz]`, summed over the
    /// newer half of the spectrogram ring. Ties keep the lowest
    /// frequency. Resolution is `sample_rate / fft_size` Hz.
    pub fn pitch(&self, f_min_hz: f32, f_max_hz: f32) -> f32 {
        let n = self.hamming.len();
        let ns = self.spectrogram.len();
        let df = self.sample_rate / n as f32;

        let mut max_signal = 0.0f32;
        let mut best_pitch = 0.0f32;

        for j in 0..n / 2 {
            let f = j as f32 * df;
            if f < f_min_hz || f > f_max_hz {
                continue;
            }

            let mut cur_signal = 0.0f32;
            let mut ih = (self.spectrogram_head + ns / 2) % ns;
            for _ in 0..ns / 2 {
                cur_signal += self.spectrogram[ih][j];
                ih += 1;
                if ih >= ns {
                    ih = 0;
                }
            }

            if cur_signal > max_signal {
                max_signal = cur_signal;
                best_pitch = f;
            }
        }

        best_pitch
    }

    /// Snapshot of the spectrogram ring in chronological order.
    pub fn spectrogram(&self) -> Vec<Vec<f32>> {
        let ns = self.spectrogram.len();
        let mut out = Vec::with_capacity(ns);
        let mut ih = self.spectrogram_head;
        for _ in 0..ns {
            out.push(self.spectrogram[ih].clone());
            ih += 1;
            if ih >= ns {
                ih = 0;
            }
        }
        out
    }

    fn compute_frame(&mut self, start: usize) {
        let n = self.hamming.len();
        let nh = self.history.len();

        let mut idx = start;
        for i in 0..n {
            self.fft_buffer[i] = Complex::new(self.hamming[i] * self.history[idx], 0.0);
            idx += 1;
            if idx >= nh {
                idx = 0;
            }
        }

        self.fft.process(&mut self.fft_buffer);

        let dst = &mut self.spectrogram[self.spectrogram_head];
        for (d, c) in dst.iter_mut().zip(&self.fft_buffer) {
            *d = c.re * c.re + c.im * c.im;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_sine(stfft: &mut Stfft, freq: f32, sample_rate: f32, n: usize) {
        let samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect();
        for chunk in samples.chunks(512) {
            stfft.process(chunk);
        }
    }

    #[test]
    fn test_pitch_of_pure_tone() {
        let mut stfft = Stfft::new(8000.0, 1024, 512, 3.0);
        feed_sine(&mut stfft, 550.0, 8000.0, 3 * 8000);

        let pitch = stfft.pitch(200.0, 1200.0);
        // bin resolution is 8000/1024 = 7.8125 Hz
        assert!((pitch - 550.0).abs() < 8.0, "pitch = {pitch}");
    }

    #[test]
    fn test_pitch_respects_band() {
        let mut stfft = Stfft::new(8000.0, 1024, 512, 3.0);
        feed_sine(&mut stfft, 1500.0, 8000.0, 3 * 8000);

        // the tone lies outside the search band, nothing to report
        let pitch = stfft.pitch(200.0, 1200.0);
        assert_eq!(pitch, 0.0);
    }

    #[test]
    fn test_spectrogram_snapshot_is_stable() {
        let mut stfft = Stfft::new(8000.0, 1024, 512, 3.0);
        feed_sine(&mut stfft, 700.0, 8000.0, 4 * 8000);

        let a = stfft.spectrogram();
        let b = stfft.spectrogram();
        assert_eq!(a.len(), b.len());
        assert_eq!(a.len(), 1 + (24000 - 1024) / 512);
        assert_eq!(a[0].len(), 1024);
        assert_eq!(a, b);
    }

    #[test]
    fn test_silence_has_no_pitch() {
        let mut stfft = Stfft::new(8000.0, 1024, 512, 3.0);
        stfft.process(&vec![0.0; 8000]);
        assert_eq!(stfft.pitch(200.0, 1200.0), 0.0);
    }
}
