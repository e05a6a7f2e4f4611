//! Pre-filters for the capture path
//!
//! A first-order high-pass strips sub-200 Hz rumble from the base-rate
//! stream before analysis; a first-order low-pass guards the
//! integer-ratio decimation path against aliasing. Coefficients use the
//! pole-zero forms `g = cos(w)/(1 + sin(w))` (first order) and the
//! bilinear-transform Butterworth form (second order), run through a
//! direct-form-1 biquad.

use std::f32::consts::PI;

use biquad::{Biquad, Coefficients, DirectForm1};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    None,
    FirstOrderHighPass,
    FirstOrderLowPass,
    SecondOrderButterworthHighPass,
}

pub struct Filter {
    stage: Option<DirectForm1<f32>>,
}

impl Filter {
    pub fn new(kind: FilterType, cutoff_hz: f32, sample_rate: f32) -> Self {
        let coefficients = match kind {
            FilterType::None => None,
            FilterType::FirstOrderHighPass => {
                let w = 2.0 * PI * cutoff_hz / sample_rate;
                let g = w.cos() / (1.0 + w.sin());
                Some(Coefficients {
                    b0: (1.0 + g) / 2.0,
                    b1: -(1.0 + g) / 2.0,
                    b2: 0.0,
                    a1: -g,
                    a2: 0.0,
                })
            }
            FilterType::FirstOrderLowPass => {
                let w = 2.0 * PI * cutoff_hz / sample_rate;
                let g = w.cos() / (1.0 + w.sin());
                Some(Coefficients {
                    b0: (1.0 - g) / 2.0,
                    b1: (1.0 - g) / 2.0,
                    b2: 0.0,
                    a1: -g,
                    a2: 0.0,
                })
            }
            FilterType::SecondOrderButterworthHighPass => {
                let c = (PI * cutoff_hz / sample_rate).tan();
                let sqrt2 = std::f32::consts::SQRT_2;
                let b0 = 1.0 / (1.0 + sqrt2 * c + c * c);
                Some(Coefficients {
                    b0,
                    b1: -2.0 * b0,
                    b2: b0,
                    a1: 2.0 * b0 * (c * c - 1.0),
                    a2: b0 * (1.0 - sqrt2 * c + c * c),
                })
            }
        };

        Filter {
            stage: coefficients.map(DirectForm1::<f32>::new),
        }
    }

    /// Filter a block of samples in place.
    pub fn process(&mut self, samples: &mut [f32]) {
        if let Some(stage) = self.stage.as_mut() {
            for s in samples.iter_mut() {
                *s = stage.run(*s);
            }
        }
    }
}
