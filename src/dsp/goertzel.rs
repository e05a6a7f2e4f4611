//! Running Goertzel narrow-band energy extractor
//!
//! For every new input sample (once the window is primed) this computes
//! the squared magnitude of the Goertzel filter over the most recent
//! Hamming-windowed `window_samples` history at the requested frequency,
//! and appends it to a circular envelope. The target frequency may
//! drift from frame to frame, so the coefficient is recomputed at the
//! start of every `process` call; the rings survive frequency changes
//! and are only dropped by an explicit `clear`.

pub struct GoertzelRunningFir {
    sample_rate: f32,
    coeff: f32,
    cos_w: f32,
    sin_w: f32,

    hamming: Vec<f32>,

    history: Vec<f32>,
    history_head: usize,

    filtered: Vec<f32>,
    filtered_head: usize,

    processed_samples: usize,
}

impl GoertzelRunningFir {
    pub fn new(sample_rate: f32, window_samples: usize, history_s: f32) -> Self {
        let hamming: Vec<f32> = (0..window_samples)
            .map(|i| {
                0.54 - 0.46
                    * (2.0 * std::f32::consts::PI * i as f32 / window_samples as f32).cos()
            })
            .collect();

        let history_samples = (history_s * sample_rate) as usize;

        GoertzelRunningFir {
            sample_rate,
            coeff: 0.0,
            cos_w: 0.0,
            sin_w: 0.0,
            hamming,
            history: vec![0.0; history_samples],
            history_head: 0,
            filtered: vec![0.0; history_samples - window_samples],
            filtered_head: 0,
            processed_samples: 0,
        }
    }

    pub fn process(&mut self, samples: &[f32], frequency_hz: f32) {
        let nw = self.hamming.len();
        let nh = self.history.len();
        let nf = self.filtered.len();

        let w = 2.0 * std::f32::consts::PI * frequency_hz / self.sample_rate;
        self.cos_w = w.cos();
        self.sin_w = w.sin();
        self.coeff = 2.0 * self.cos_w;

        for &sample in samples {
            self.history[self.history_head] = sample;
            self.history_head += 1;
            if self.history_head >= nh {
                self.history_head = 0;
            }

            self.processed_samples += 1;
            if self.processed_samples >= nw {
                let start = (self.history_head + nh - nw) % nh;
                self.filtered[self.filtered_head] = self.filter(start);
                self.filtered_head += 1;
                if self.filtered_head >= nf {
                    self.filtered_head = 0;
                }
            }
        }
    }

    /// Chronologically ordered copy of the envelope ring.
    pub fn filtered(&self) -> Vec<f32> {
        let nf = self.filtered.len();
        let mut out = Vec::with_capacity(nf);
        let mut j = self.filtered_head;
        for _ in 0..nf {
            out.push(self.filtered[j]);
            j += 1;
            if j >= nf {
                j = 0;
            }
        }
        out
    }

    /// Running minimum over a half-width-`w` window of the ordered
    /// envelope. Reserved for envelope denoising.
    pub fn filtered_min(&self, w: usize) -> Vec<f32> {
        let nf = self.filtered.len();
        let mut out = Vec::with_capacity(nf);
        let mut j = self.filtered_head;
        for i in 0..nf {
            let back = i.min(w);
            let ahead = (nf - i).min(w);
            let mut j2 = (j + nf - back) % nf;
            let mut f = self.filtered[j2];
            for _ in 0..back + ahead {
                f = f.min(self.filtered[j2]);
                j2 += 1;
                if j2 >= nf {
                    j2 = 0;
                }
            }
            out.push(f);

            j += 1;
            if j >= nf {
                j = 0;
            }
        }
        out
    }

    /// Zero both rings. Invoked by the controller on a pitch jump.
    pub fn clear(&mut self) {
        self.history.fill(0.0);
        self.filtered.fill(0.0);
    }

    fn filter(&self, start: usize) -> f32 {
        let nh = self.history.len();
        let coeff = self.coeff as f64;

        let mut sprev = 0.0f64;
        let mut sprev2 = 0.0f64;

        let mut idx = start;
        for &h in &self.hamming {
            let s = (h * self.history[idx]) as f64 + coeff * sprev - sprev2;
            idx += 1;
            if idx >= nh {
                idx = 0;
            }
            sprev2 = sprev;
            sprev = s;
        }

        let real = sprev * self.cos_w as f64 - sprev2;
        let imag = -sprev * self.sin_w as f64;

        (real * real + imag * imag) as f32
    }
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
    fn test_envelope_tracks_target_frequency() {
        let mut goertzel = GoertzelRunningFir::new(8000.0, 256, 3.0);
        goertzel.process(&sine(550.0, 8000.0, 8000), 550.0);

        let envelope = goertzel.filtered();
        assert_eq!(envelope.len(), 24000 - 256);

        // recent samples carry energy, the un-written tail is still zero
        let recent = envelope[envelope.len() - 1];
        assert!(recent > 0.0);
    }

    #[test]
    fn test_off_frequency_energy_is_low() {
        let signal = sine(550.0, 8000.0, 8000);

        let mut on_target = GoertzelRunningFir::new(8000.0, 256, 3.0);
        on_target.process(&signal, 550.0);
        let mut off_target = GoertzelRunningFir::new(8000.0, 256, 3.0);
        off_target.process(&signal, 1100.0);

        let on = *on_target.filtered().last().unwrap();
        let off = *off_target.filtered().last().unwrap();
        assert!(on > 100.0 * off, "on = {on}, off = {off}");
    }

    #[test]
    fn test_clear_zeroes_envelope() {
        let mut goertzel = GoertzelRunningFir::new(8000.0, 256, 3.0);
        goertzel.process(&sine(550.0, 8000.0, 8000), 550.0);
        goertzel.clear();
        assert!(goertzel.filtered().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_filtered_min_is_a_lower_envelope() {
        let mut goertzel = GoertzelRunningFir::new(8000.0, 256, 3.0);
        goertzel.process(&sine(550.0, 8000.0, 8000), 550.0);

        let plain = goertzel.filtered();
        let lower = goertzel.filtered_min(40);
        assert_eq!(plain.len(), lower.len());
        for (p, m) in plain.iter().zip(&lower) {
            assert!(m <= p);
        }
    }

    #[test]
    fn test_snapshot_length_is_call_history_independent() {
        let mut a = GoertzelRunningFir::new(8000.0, 256, 3.0);
        a.process(&sine(550.0, 8000.0, 512), 550.0);
        let mut b = GoertzelRunningFir::new(8000.0, 256, 3.0);
        for chunk in sine(550.0, 8000.0, 4 * 8000).chunks(512) {
            b.process(chunk, 550.0);
        }
        assert_eq!(a.filtered().len(), b.filtered().len());
    }
}
