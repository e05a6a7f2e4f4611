//! Decode a Morse-code transmission from a WAV recording

use std::env;
use std::process::exit;

use hound::{SampleFormat as WavSampleFormat, WavReader};

use rustymorse::constants::{BASE_SAMPLE_RATE, DEFAULT_SAMPLES_PER_FRAME};
use rustymorse::{DecodeParams, MorseModem, Parameters, SampleFormat};

fn main() {
    rustymorse::tracing_init::init_tracing();

    let args: Vec<String> = env::args().collect();
    eprintln!("Usage: {} audio.wav [-fN] [-wN]", args[0]);
    eprintln!("    -fN - frequency of the sound in Hz, N in [200, 1200], (default: auto)");
    eprintln!("    -wN - speed of the transmission in words-per-minute, N in [5, 55], (default: auto)");
    eprintln!();

    if args.len() < 2 {
        exit(-1);
    }

    let mut wav_path = None;
    let mut frequency_hz = -1.0f32;
    let mut speed_wpm = -1.0f32;

    for arg in &args[1..] {
        if arg == "-h" {
            exit(0);
        } else if let Some(f) = arg.strip_prefix("-f") {
            frequency_hz = f.parse().unwrap_or(-1.0);
        } else if let Some(w) = arg.strip_prefix("-w") {
            speed_wpm = w.parse().unwrap_or(-1.0);
        } else {
            wav_path = Some(arg.clone());
        }
    }

    if frequency_hz > 0.0
        && !(100.0..=BASE_SAMPLE_RATE / 2.0 + 1.0).contains(&frequency_hz)
    {
        eprintln!("Invalid frequency");
        exit(-1);
    }

    if speed_wpm > 0.0 && !(5.0..=140.0).contains(&speed_wpm) {
        eprintln!("Invalid speed");
        exit(-1);
    }

    let Some(wav_path) = wav_path else {
        exit(-1);
    };

    let mut reader = match WavReader::open(&wav_path) {
        Ok(reader) => reader,
        Err(err) => {
            eprintln!("Failed to open WAV file: {}", err);
            exit(-4);
        }
    };

    let spec = reader.spec();

    if spec.channels != 1 {
        eprintln!("Only mono WAV files are supported");
        exit(-5);
    }

    println!("[+] Number of channels: {}", spec.channels);
    println!("[+] Sample rate: {}", spec.sample_rate);
    println!("[+] Bits per sample: {}", spec.bits_per_sample);
    println!("[+] Total samples: {}", reader.len());

    // raw sample bytes followed by 3 seconds of silence to flush the
    // analysis window past the end of the recording
    let silence_samples = 3 * spec.sample_rate as usize;
    let (sample_format, sample_size, mut samples) =
        match (spec.sample_format, spec.bits_per_sample) {
            (WavSampleFormat::Int, 16) => {
                let mut bytes = Vec::with_capacity(2 * (reader.len() as usize + silence_samples));
                for sample in reader.samples::<i16>() {
                    match sample {
                        Ok(s) => bytes.extend_from_slice(&s.to_ne_bytes()),
                        Err(err) => {
                            eprintln!("Failed to read WAV samples: {}", err);
                            exit(-4);
                        }
                    }
                }
                (SampleFormat::I16, 2, bytes)
            }
            (WavSampleFormat::Float, 32) => {
                let mut bytes = Vec::with_capacity(4 * (reader.len() as usize + silence_samples));
                for sample in reader.samples::<f32>() {
                    match sample {
                        Ok(s) => bytes.extend_from_slice(&s.to_ne_bytes()),
                        Err(err) => {
                            eprintln!("Failed to read WAV samples: {}", err);
                            exit(-4);
                        }
                    }
                }
                (SampleFormat::F32, 4, bytes)
            }
            _ => {
                eprintln!("Unsupported WAV format");
                exit(-6);
            }
        };
    samples.extend(std::iter::repeat(0u8).take(silence_samples * sample_size));

    println!("[+] Decoding:");
    println!();

    let mut modem = MorseModem::new(Parameters {
        sample_rate_inp: spec.sample_rate as f32,
        sample_rate_out: spec.sample_rate as f32,
        samples_per_frame: DEFAULT_SAMPLES_PER_FRAME,
        sample_format_inp: sample_format,
        sample_format_out: sample_format,
    });

    modem.set_parameters_decode(DecodeParams {
        frequency_hz,
        speed_wpm,
        ..DecodeParams::default()
    });

    let mut cursor = 0usize;
    modem.decode(|buffer: &mut [u8]| {
        let remaining = samples.len() - cursor;
        if remaining < buffer.len() {
            return 0;
        }
        buffer.copy_from_slice(&samples[cursor..cursor + buffer.len()]);
        cursor += buffer.len();
        buffer.len()
    });

    let rx_data = modem.take_rx_data();
    println!("{}", String::from_utf8_lossy(&rx_data));

    println!();
    println!("[+] Done");
}
