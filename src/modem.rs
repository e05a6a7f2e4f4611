//! The modem controller
//!
//! Owns the configuration and every DSP block, drives the decode
//! pipeline one fixed-size frame at a time, and synthesizes armed
//! transmissions. Capture and playback are reached only through the
//! caller-provided byte callbacks, so the controller is agnostic of the
//! audio backend.
//!
//! Decode data flow: capture bytes → float32 → resample to the base
//! rate → high-pass → STFFT (pitch) → Goertzel envelope → downsample →
//! segmenter grid search → cursor emission into the Rx buffer.

use std::time::Instant;

use tracing::debug;

use crate::alphabet;
use crate::constants::{
    BASE_SAMPLE_RATE, DEFAULT_FREQUENCY_MAX_HZ, DEFAULT_FREQUENCY_MIN_HZ,
    DEFAULT_SAMPLES_PER_FRAME, IDLE_CALLS_TO_RESET, MAX_SAMPLES_PER_FRAME,
    MAX_TX_LENGTH, MAX_WINDOW_TO_ANALYZE_S, PITCH_JUMP_HZ,
};
use crate::dsp::{Filter, FilterType, GoertzelRunningFir, Resampler, Stfft};
use crate::encoder;
use crate::sample_format::{self, SampleFormat};
use crate::segmenter::{Interval, IntervalKind, Segmenter};

/// Spectrogram snapshot: rows oldest → newest, each row one power
/// spectrum.
pub type Spectrogram = Vec<Vec<f32>>;

/// Immutable modem configuration.
#[derive(Debug, Clone, Copy)]
pub struct Parameters {
    pub sample_rate_inp: f32,
    pub sample_rate_out: f32,
    pub samples_per_frame: usize,
    pub sample_format_inp: SampleFormat,
    pub sample_format_out: SampleFormat,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            sample_rate_inp: BASE_SAMPLE_RATE,
            sample_rate_out: BASE_SAMPLE_RATE,
            samples_per_frame: DEFAULT_SAMPLES_PER_FRAME,
            sample_format_inp: SampleFormat::F32,
            sample_format_out: SampleFormat::F32,
        }
    }
}

/// Mutable decode parameters; take effect on the next frame.
#[derive(Debug, Clone, Copy)]
pub struct DecodeParams {
    /// Carrier pitch in Hz; non-positive means estimate per frame.
    pub frequency_hz: f32,
    /// Sender speed in WPM; non-positive means estimate per frame.
    pub speed_wpm: f32,
    /// Pitch estimation search band.
    pub frequency_min_hz: f32,
    pub frequency_max_hz: f32,
    /// Apply the high-pass/low-pass pre-filters.
    pub apply_filters: bool,
}

impl Default for DecodeParams {
    fn default() -> Self {
        DecodeParams {
            frequency_hz: -1.0,
            speed_wpm: -1.0,
            frequency_min_hz: DEFAULT_FREQUENCY_MIN_HZ,
            frequency_max_hz: DEFAULT_FREQUENCY_MAX_HZ,
            apply_filters: true,
        }
    }
}

/// Mutable encode parameters.
#[derive(Debug, Clone, Copy)]
pub struct EncodeParams {
    /// Output amplitude in [0, 1].
    pub volume: f32,
    pub frequency_hz: f32,
    pub speed_characters_wpm: f32,
    /// Farnsworth spacing speed; at most the character speed.
    pub speed_farnsworth_wpm: f32,
}

impl Default for EncodeParams {
    fn default() -> Self {
        EncodeParams {
            volume: 0.5,
            frequency_hz: 550.0,
            speed_characters_wpm: 25.0,
            speed_farnsworth_wpm: 25.0,
        }
    }
}

/// Rolling per-frame statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    pub time_resample_ms: f32,
    pub time_pitch_detection_ms: f32,
    pub time_goertzel_ms: f32,
    pub time_frame_analysis_ms: f32,
    pub estimated_pitch_hz: f32,
    pub estimated_speed_wpm: f32,
    pub signal_threshold: f32,
}

pub struct MorseModem {
    sample_rate_inp: f32,
    sample_rate_out: f32,
    samples_per_frame: usize,
    sample_size_inp: usize,
    sample_size_out: usize,
    sample_format_inp: SampleFormat,
    sample_format_out: SampleFormat,

    samples_needed: isize,
    frames_processed: usize,

    has_tx_data: bool,
    receiving: bool,
    idle_calls: u32,
    last_decode_result: bool,

    params_decode: DecodeParams,
    params_encode: EncodeParams,

    stats: Statistics,

    last_interval: Interval,
    cur_letter: String,

    waveform: Vec<f32>,
    waveform_resampled: Vec<f32>,
    waveform_tmp: Vec<u8>,
    output_tmp: Vec<u8>,

    rx_data: Vec<u8>,
    tx_data: Vec<u8>,
    signal_f: Vec<f32>,
    tx_waveform_i16: Vec<i16>,

    segmenter: Segmenter,
    stfft: Stfft,
    filter_high_pass: Filter,
    filter_low_pass: Filter,
    resampler: Resampler,
    goertzel: GoertzelRunningFir,
}

impl MorseModem {
    pub fn new(parameters: Parameters) -> Self {
        let samples_per_frame = parameters.samples_per_frame.min(MAX_SAMPLES_PER_FRAME);

        // smallest powers of two covering 100 ms and 20 ms of base-rate
        // signal: FFT size and Goertzel window respectively
        let mut fft_size = 1usize;
        while (fft_size as f32) < BASE_SAMPLE_RATE / 10.0 {
            fft_size *= 2;
        }
        let mut goertzel_window = 1usize;
        while (goertzel_window as f32) < BASE_SAMPLE_RATE / 50.0 {
            goertzel_window *= 2;
        }

        let sample_size_inp = parameters.sample_format_inp.bytes_per_sample();
        let sample_size_out = parameters.sample_format_out.bytes_per_sample();

        let factor = (parameters.sample_rate_inp / BASE_SAMPLE_RATE).max(1.0);
        let staging_samples = 2 * MAX_SAMPLES_PER_FRAME + 128;
        let capture_samples = (staging_samples as f32 * factor).ceil() as usize;

        MorseModem {
            sample_rate_inp: parameters.sample_rate_inp,
            sample_rate_out: parameters.sample_rate_out,
            samples_per_frame,
            sample_size_inp,
            sample_size_out,
            sample_format_inp: parameters.sample_format_inp,
            sample_format_out: parameters.sample_format_out,

            samples_needed: samples_per_frame as isize,
            frames_processed: 0,

            has_tx_data: false,
            receiving: false,
            idle_calls: 0,
            last_decode_result: false,

            params_decode: DecodeParams::default(),
            params_encode: EncodeParams::default(),

            stats: Statistics::default(),

            last_interval: Interval::default(),
            cur_letter: String::new(),

            waveform: vec![0.0; staging_samples],
            waveform_resampled: Vec::with_capacity(capture_samples),
            waveform_tmp: vec![0; capture_samples * sample_size_inp.max(1)],
            output_tmp: Vec::new(),

            rx_data: Vec::with_capacity(1024),
            tx_data: Vec::new(),
            signal_f: Vec::new(),
            tx_waveform_i16: Vec::new(),

            segmenter: Segmenter::new(),
            stfft: Stfft::new(
                BASE_SAMPLE_RATE,
                fft_size,
                samples_per_frame,
                MAX_WINDOW_TO_ANALYZE_S,
            ),
            filter_high_pass: Filter::new(
                FilterType::FirstOrderHighPass,
                200.0,
                BASE_SAMPLE_RATE,
            ),
            filter_low_pass: Filter::new(
                FilterType::FirstOrderLowPass,
                2000.0,
                parameters.sample_rate_inp,
            ),
            resampler: Resampler::new(),
            goertzel: GoertzelRunningFir::new(
                BASE_SAMPLE_RATE,
                goertzel_window,
                MAX_WINDOW_TO_ANALYZE_S,
            ),
        }
    }

    /// Arm a transmission. Oversized input is truncated; arming with
    /// empty input clears any pending transmission.
    pub fn init(&mut self, data: &[u8]) -> bool {
        let mut n = data.len();
        if n > MAX_TX_LENGTH {
            eprintln!("Truncating transmission from {} to {} bytes", n, MAX_TX_LENGTH);
            n = MAX_TX_LENGTH;
        }

        self.has_tx_data = false;
        self.tx_data.clear();
        self.tx_data.extend_from_slice(&data[..n]);

        if n > 0 {
            self.has_tx_data = true;
        }

        true
    }

    pub fn set_parameters_decode(&mut self, parameters: DecodeParams) -> bool {
        if parameters.frequency_min_hz <= 0.0
            || parameters.frequency_max_hz <= parameters.frequency_min_hz
        {
            eprintln!(
                "Invalid frequency range: {} - {} Hz",
                parameters.frequency_min_hz, parameters.frequency_max_hz
            );
            return false;
        }

        self.params_decode = parameters;

        true
    }

    pub fn set_parameters_encode(&mut self, parameters: EncodeParams) -> bool {
        if !(0.0..=1.0).contains(&parameters.volume) {
            eprintln!("Invalid volume: {}", parameters.volume);
            return false;
        }

        if parameters.speed_characters_wpm <= 0.0
            || parameters.speed_farnsworth_wpm <= 0.0
            || parameters.speed_farnsworth_wpm > parameters.speed_characters_wpm
        {
            eprintln!(
                "Invalid speeds: {} WPM characters, {} WPM Farnsworth",
                parameters.speed_characters_wpm, parameters.speed_farnsworth_wpm
            );
            return false;
        }

        self.params_encode = parameters;

        true
    }

    /// Generate the waveform for the armed transmission and hand it to
    /// the output callback in one call.
    pub fn encode<F>(&mut self, mut output: F) -> bool
    where
        F: FnMut(&[u8]),
    {
        if !self.has_tx_data {
            return false;
        }

        if self.sample_format_out == SampleFormat::Undefined {
            eprintln!("Cannot encode: output sample format is undefined");
            return false;
        }

        self.has_tx_data = false;

        let dot_ch = encoder::dot_samples(
            self.sample_rate_out,
            self.params_encode.speed_characters_wpm,
        );
        let dot_fw = encoder::dot_samples(
            self.sample_rate_out,
            self.params_encode.speed_farnsworth_wpm,
        );

        let elements = encoder::text_to_elements(&self.tx_data);
        let waveform = encoder::synthesize(
            &elements,
            self.params_encode.volume,
            self.params_encode.frequency_hz,
            dot_ch,
            dot_fw,
            self.sample_rate_out,
        );

        // 16-bit copy is always kept for consumers of the tx waveform
        self.tx_waveform_i16 = waveform.iter().map(|&s| sample_format::f32_to_i16(s)).collect();

        sample_format::f32_to_bytes(self.sample_format_out, &waveform, &mut self.output_tmp);
        output(&self.output_tmp);

        true
    }

    /// Pull capture data and decode. Returns true iff at least one
    /// frame was processed. Stops when the callback has no data, when a
    /// transmission is pending, or when a frame fails.
    pub fn decode<F>(&mut self, mut input: F) -> bool
    where
        F: FnMut(&mut [u8]) -> usize,
    {
        let mut result = false;
        let frame = self.samples_per_frame;

        if self.sample_format_inp == SampleFormat::Undefined {
            self.last_decode_result = false;
            return false;
        }

        while !self.has_tx_data {
            let t_start = Instant::now();

            if self.samples_needed < frame as isize {
                self.samples_needed += frame as isize;
            }
            let samples_needed = self.samples_needed.max(0) as usize;

            // bytes to request, accounting for the resampling factor
            let factor = self.sample_rate_inp / BASE_SAMPLE_RATE;
            let mut n_bytes_needed = samples_needed * self.sample_size_inp;

            let mut resample_simple = false;
            if self.sample_rate_inp != BASE_SAMPLE_RATE {
                if self.sample_rate_inp as u32 % BASE_SAMPLE_RATE as u32 == 0 {
                    n_bytes_needed = (n_bytes_needed as f32 * factor) as usize;
                    resample_simple = true;
                } else {
                    let n_in = self
                        .resampler
                        .required_input(1.0 / factor as f64, samples_needed);
                    n_bytes_needed = n_in * self.sample_size_inp;
                }
            }

            let n_bytes_recorded = input(&mut self.waveform_tmp[..n_bytes_needed]);

            if n_bytes_recorded == 0 {
                self.idle_calls += 1;
                if self.idle_calls >= IDLE_CALLS_TO_RESET {
                    self.receiving = false;
                }
                break;
            }
            let was_receiving = self.receiving;
            self.receiving = true;
            self.idle_calls = 0;

            if n_bytes_recorded % self.sample_size_inp != 0 {
                eprintln!(
                    "Capture failure: provided bytes ({}) are not a multiple of the sample size ({})",
                    n_bytes_recorded, self.sample_size_inp
                );
                self.samples_needed = frame as isize;
                break;
            }

            if n_bytes_recorded > n_bytes_needed {
                eprintln!(
                    "Capture failure: more samples were provided ({}) than requested ({})",
                    n_bytes_recorded / self.sample_size_inp,
                    n_bytes_needed / self.sample_size_inp
                );
                self.samples_needed = frame as isize;
                break;
            }

            if n_bytes_recorded < n_bytes_needed {
                eprintln!(
                    "Capture failure: fewer samples were provided ({}) than requested ({})",
                    n_bytes_recorded / self.sample_size_inp,
                    n_bytes_needed / self.sample_size_inp
                );
                self.samples_needed = frame as isize;
                break;
            }

            sample_format::bytes_to_f32(
                self.sample_format_inp,
                &self.waveform_tmp[..n_bytes_recorded],
                &mut self.waveform_resampled,
            );
            let mut n_samples_recorded = self.waveform_resampled.len();
            if n_samples_recorded == 0 {
                break;
            }

            // residual base-rate samples from the previous iteration sit
            // at the front of the staging buffer
            let offset = if self.samples_needed > frame as isize {
                2 * frame - self.samples_needed as usize
            } else {
                0
            };

            if self.sample_rate_inp != BASE_SAMPLE_RATE {
                if resample_simple {
                    if self.params_decode.apply_filters {
                        self.filter_low_pass.process(&mut self.waveform_resampled);
                    }

                    let ds = factor as usize;
                    let mut n_resampled = 0;
                    let mut i = 0;
                    while i < n_samples_recorded {
                        self.waveform[offset + n_resampled] = self.waveform_resampled[i];
                        n_resampled += 1;
                        i += ds;
                    }
                    n_samples_recorded = offset + n_resampled;
                } else {
                    // coming out of an idle stretch with a minute or
                    // more of accumulated input: drop stale history
                    if !was_receiving
                        && self.resampler.total_input_samples() as f32
                            > 60.0 * factor * BASE_SAMPLE_RATE
                    {
                        self.resampler.reset();
                    }

                    let n_resampled = match self.resampler.resample(
                        1.0 / factor as f64,
                        &self.waveform_resampled[..n_samples_recorded],
                        &mut self.waveform[offset..],
                    ) {
                        Ok(n) => n,
                        Err(err) => {
                            eprintln!("Failed to resample capture data: {err}");
                            self.samples_needed = frame as isize;
                            break;
                        }
                    };
                    n_samples_recorded = offset + n_resampled;
                }
            } else {
                self.waveform[offset..offset + n_samples_recorded]
                    .copy_from_slice(&self.waveform_resampled);
            }

            if n_samples_recorded >= frame {
                self.stats.time_resample_ms = t_start.elapsed().as_secs_f32() * 1000.0;

                while n_samples_recorded >= frame {
                    self.decode_frame();
                    result = true;

                    let n_extra = n_samples_recorded - frame;
                    self.waveform.copy_within(frame..frame + n_extra, 0);
                    self.samples_needed = frame as isize - n_extra as isize;
                    n_samples_recorded -= frame;
                }
            } else {
                self.samples_needed = (frame - n_samples_recorded) as isize;
                break;
            }
        }

        self.last_decode_result = result;

        result
    }

    /// Run the decode pipeline over one staged frame.
    fn decode_frame(&mut self) {
        let mut t_start = Instant::now();
        let frame = self.samples_per_frame;

        if self.params_decode.apply_filters {
            self.filter_high_pass.process(&mut self.waveform[..frame]);
        }
        self.stfft.process(&self.waveform[..frame]);

        let mut frequency_hz = self.params_decode.frequency_hz;
        let speed_wpm = self.params_decode.speed_wpm;

        if frequency_hz <= 0.0 {
            frequency_hz = self.stfft.pitch(
                self.params_decode.frequency_min_hz,
                self.params_decode.frequency_max_hz,
            );
        }

        // a pitch jump is a new transmission: drop the envelope and
        // start a new line. The very first estimate is not a jump.
        if self.stats.estimated_pitch_hz > 0.0
            && (frequency_hz - self.stats.estimated_pitch_hz).abs() > PITCH_JUMP_HZ
        {
            self.goertzel.clear();
            self.rx_data.push(b'\n');
        }

        self.stats.time_pitch_detection_ms = t_start.elapsed().as_secs_f32() * 1000.0;
        self.stats.estimated_pitch_hz = frequency_hz;

        t_start = Instant::now();

        self.goertzel.process(&self.waveform[..frame], frequency_hz);
        let mut filtered = self.goertzel.filtered();

        let mut n_samples = filtered.len();
        let mut window_samples = (MAX_WINDOW_TO_ANALYZE_S * BASE_SAMPLE_RATE) as usize;
        let n_frames_in_window = window_samples / frame;

        let mut n_downsample = 1usize;
        while n_samples % 2 == 0
            && window_samples > (500.0 * MAX_WINDOW_TO_ANALYZE_S) as usize
        {
            n_downsample *= 2;
            n_samples /= 2;
            window_samples /= 2;
        }

        let mut mean = 0.0f64;
        for i in 0..n_samples {
            let mut sum = 0.0f32;
            for j in 0..n_downsample {
                sum += filtered[i * n_downsample + j];
            }
            sum /= n_downsample as f32;
            filtered[i] = sum;
            mean += filtered[i] as f64;
        }
        mean /= n_samples as f64;
        filtered.truncate(n_samples);

        self.stats.time_goertzel_ms = t_start.elapsed().as_secs_f32() * 1000.0;

        t_start = Instant::now();

        let best = self.segmenter.analyze(
            &filtered,
            mean,
            n_downsample,
            speed_wpm,
            self.stats.estimated_speed_wpm,
            self.stats.signal_threshold,
        );

        self.stats.time_frame_analysis_ms = t_start.elapsed().as_secs_f32() * 1000.0;
        self.stats.estimated_speed_wpm = (5 + best.speed_idx) as f32;
        self.stats.signal_threshold = 0.01 * best.level_idx as f32;

        debug!(
            frame = self.frames_processed,
            pitch_hz = frequency_hz,
            speed_wpm = self.stats.estimated_speed_wpm,
            cost = best.cost,
            "frame analyzed"
        );

        // walk the emission cursor over the newest frame's worth of
        // envelope, anchored at the middle of the analysis window so
        // each letter sees equal past and future context
        let intervals = self.segmenter.intervals(best.speed_idx, best.level_idx);
        let cursor_base = (n_frames_in_window / 2) * frame / n_downsample;

        let mut j = 0;
        for i in 0..frame / n_downsample {
            let s = (cursor_base + i) as i32;
            while j + 1 < intervals.len() && s >= intervals[j].end {
                j += 1;
            }
            let interval = intervals[j];

            if self.last_interval.on != interval.on {
                if interval.on {
                    self.cur_letter
                        .push(if interval.kind == IntervalKind::Dash { '1' } else { '0' });
                } else {
                    match interval.kind {
                        IntervalKind::OpenGap
                        | IntervalKind::LetterGap
                        | IntervalKind::WordGap => {
                            let ch = alphabet::decode(&self.cur_letter).unwrap_or('?');
                            self.rx_data.push(ch as u8);
                            self.cur_letter.clear();

                            // a word boundary: either a clean 7-unit
                            // gap, or open silence running past the
                            // classification range
                            if interval.kind != IntervalKind::LetterGap {
                                self.rx_data.push(b' ');
                            }
                        }
                        _ => {}
                    }
                }
                self.last_interval = interval;
            }
        }

        self.signal_f = filtered;
        self.frames_processed += 1;
    }

    // instance state

    pub fn has_tx_data(&self) -> bool {
        self.has_tx_data
    }

    pub fn last_decode_result(&self) -> bool {
        self.last_decode_result
    }

    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    pub fn sample_size_bytes_inp(&self) -> usize {
        self.sample_size_inp
    }

    pub fn sample_size_bytes_out(&self) -> usize {
        self.sample_size_out
    }

    pub fn sample_rate_inp(&self) -> f32 {
        self.sample_rate_inp
    }

    pub fn sample_rate_out(&self) -> f32 {
        self.sample_rate_out
    }

    pub fn sample_format_inp(&self) -> SampleFormat {
        self.sample_format_inp
    }

    pub fn sample_format_out(&self) -> SampleFormat {
        self.sample_format_out
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    pub fn spectrogram(&self) -> Spectrogram {
        self.stfft.spectrogram()
    }

    pub fn rx_data(&self) -> &[u8] {
        &self.rx_data
    }

    /// Move the decoded bytes out; the internal buffer starts empty
    /// again.
    pub fn take_rx_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.rx_data)
    }

    /// Move the most recent analysis envelope out.
    pub fn take_signal_f(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.signal_f)
    }

    /// Move the 16-bit copy of the last generated waveform out.
    pub fn take_tx_waveform_i16(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.tx_waveform_i16)
    }
}
