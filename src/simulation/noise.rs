//! Channel impairments for decoder robustness tests
//!
//! Additive Gaussian noise, receiver-style band-pass shaping and slow
//! QSB fading, applied to synthesized waveforms before they are fed
//! back into the decoder.

use std::f32::consts::PI;

use biquad::*;
use rand_distr::{Distribution, Normal};

/// RMS power of a signal.
pub fn rms_power(signal: &[f32]) -> f32 {
    let sum_squares: f32 = signal.iter().map(|&x| x * x).sum();
    (sum_squares / signal.len() as f32).sqrt()
}

/// Gaussian white noise with standard deviation `sigma`.
pub fn generate_white_noise(num_samples: usize, sigma: f32) -> Vec<f32> {
    let mut rng = rand::rng();
    let normal = Normal::new(0.0, sigma).unwrap();
    (0..num_samples).map(|_| normal.sample(&mut rng)).collect()
}

/// Add `waveform` into `samples` at `start_index`, scaled so its RMS
/// power sits `snr_db` above the RMS power of `samples`.
pub fn mix_waveform(samples: &mut [f32], waveform: &[f32], start_index: usize, snr_db: f32) {
    assert!(
        waveform.len() <= samples.len(),
        "Waveform must not be longer than samples"
    );

    let noise_rms = rms_power(samples).max(1e-9);
    let signal_rms = rms_power(waveform).max(1e-9);
    let snr_linear = 10.0_f32.powf(snr_db / 20.0);
    let scaling_factor = noise_rms * snr_linear / signal_rms;

    for (i, &wave_sample) in waveform.iter().enumerate() {
        let target_index = start_index + i;
        if target_index >= samples.len() {
            break;
        }
        samples[target_index] += wave_sample * scaling_factor;
    }
}

/// Slow amplitude fading between 0.5 and 1.0 at `qsb_freq` Hz.
pub fn apply_qsb(samples: &[f32], sample_rate: u32, qsb_freq: f32) -> Vec<f32> {
    samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let phase = 2.0 * PI * qsb_freq * (i as f32 / sample_rate as f32);
            s * 0.5 * (1.0 + phase.sin())
        })
        .collect()
}

/// Band-pass the signal between `low_cutoff` and `high_cutoff` Hz.
pub fn apply_bandpass_filter(
    samples: &[f32],
    sample_rate: u32,
    low_cutoff: f32,
    high_cutoff: f32,
) -> Vec<f32> {
    let low_pass = biquad::Coefficients::<f32>::from_params(
        Type::LowPass,
        sample_rate.hz(),
        high_cutoff.hz(),
        Q_BUTTERWORTH_F32,
    )
    .unwrap();

    let high_pass = biquad::Coefficients::<f32>::from_params(
        Type::HighPass,
        sample_rate.hz(),
        low_cutoff.hz(),
        Q_BUTTERWORTH_F32,
    )
    .unwrap();

    let mut low_filter = DirectForm2Transposed::<f32>::new(low_pass);
    let mut high_filter = DirectForm2Transposed::<f32>::new(high_pass);

    samples
        .iter()
        .map(|&x| high_filter.run(low_filter.run(x)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_noise_statistics() {
        let noise = generate_white_noise(100_000, 0.1);
        let rms = rms_power(&noise);
        assert!((rms - 0.1).abs() < 0.01, "rms = {rms}");
    }

    #[test]
    fn test_mix_waveform_respects_snr() {
        let mut noise = generate_white_noise(8000, 0.05);
        let noise_rms = rms_power(&noise);
        let tone: Vec<f32> = (0..4000)
            .map(|i| (2.0 * PI * 550.0 * i as f32 / 8000.0).sin())
            .collect();

        mix_waveform(&mut noise, &tone, 0, 20.0);

        // 20 dB over the noise floor dominates the mixture
        let mixed_rms = rms_power(&noise[..4000]);
        assert!(mixed_rms > 5.0 * noise_rms);
    }

    #[test]
    fn test_qsb_bounds_amplitude() {
        let samples = vec![1.0f32; 8000];
        let faded = apply_qsb(&samples, 8000, 0.2);
        assert!(faded.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }

    #[test]
    fn test_bandpass_removes_out_of_band_energy() {
        let low_tone: Vec<f32> = (0..16000)
            .map(|i| (2.0 * PI * 50.0 * i as f32 / 8000.0).sin())
            .collect();
        let filtered = apply_bandpass_filter(&low_tone, 8000, 300.0, 2700.0);
        assert!(rms_power(&filtered[8000..]) < 0.1 * rms_power(&low_tone));
    }
}
