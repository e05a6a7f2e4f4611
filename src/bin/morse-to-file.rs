//! Generate a Morse-code WAV file from a text message read on stdin

use std::env;
use std::io::BufRead;
use std::process::exit;

use hound::{SampleFormat as WavSampleFormat, WavSpec, WavWriter};

use rustymorse::constants::{BASE_SAMPLE_RATE, DEFAULT_SAMPLES_PER_FRAME, MAX_TX_LENGTH};
use rustymorse::{EncodeParams, MorseModem, Parameters, SampleFormat};

fn main() {
    rustymorse::tracing_init::init_tracing();

    let args: Vec<String> = env::args().collect();
    eprintln!("Usage: {} [output.wav] [-vN] [-sN]", args[0]);
    eprintln!("    -vN - output volume, N in (0, 100], (default: 50)");
    eprintln!(
        "    -sN - output sample rate, N in [4000, 96000], (default: {})",
        BASE_SAMPLE_RATE as u32
    );
    eprintln!();

    let mut output_path = String::from("morse.wav");
    let mut volume = 50i32;
    let mut sample_rate_out = BASE_SAMPLE_RATE;

    for arg in &args[1..] {
        if arg == "-h" {
            exit(0);
        } else if let Some(v) = arg.strip_prefix("-v") {
            volume = v.parse().unwrap_or(-1);
        } else if let Some(s) = arg.strip_prefix("-s") {
            sample_rate_out = s.parse().unwrap_or(-1.0);
        } else {
            output_path = arg.clone();
        }
    }

    if volume <= 0 || volume > 100 {
        eprintln!("Invalid volume");
        exit(-1);
    }

    if !(4000.0..=96000.0).contains(&sample_rate_out) {
        eprintln!("Invalid sample rate: {}", sample_rate_out);
        exit(-1);
    }

    eprintln!("Enter a text message:");

    let mut message = String::new();
    if std::io::stdin().lock().read_line(&mut message).is_err() {
        eprintln!("Failed to read the message");
        exit(-1);
    }
    let message = message.trim_end_matches(['\r', '\n']);

    if message.is_empty() {
        eprintln!("Invalid message: size = 0");
        exit(-2);
    }

    if message.len() > MAX_TX_LENGTH {
        eprintln!("Invalid message: size > {}", MAX_TX_LENGTH);
        exit(-3);
    }

    eprintln!("Generating waveform for message '{}' ...", message);

    let mut modem = MorseModem::new(Parameters {
        sample_rate_inp: BASE_SAMPLE_RATE,
        sample_rate_out,
        samples_per_frame: DEFAULT_SAMPLES_PER_FRAME,
        sample_format_inp: SampleFormat::F32,
        sample_format_out: SampleFormat::I16,
    });

    modem.set_parameters_encode(EncodeParams {
        volume: 0.01 * volume as f32,
        ..EncodeParams::default()
    });
    modem.init(message.as_bytes());

    let mut n_bytes = 0usize;
    if !modem.encode(|bytes| n_bytes = bytes.len()) {
        eprintln!("Failed to generate waveform!");
        exit(-4);
    }

    eprintln!("Output size = {} bytes", n_bytes);

    let waveform = modem.take_tx_waveform_i16();

    let spec = WavSpec {
        channels: 1,
        sample_rate: sample_rate_out as u32,
        bits_per_sample: 16,
        sample_format: WavSampleFormat::Int,
    };

    eprintln!("Writing WAV data to {} ...", output_path);

    let mut writer = match WavWriter::create(&output_path, spec) {
        Ok(writer) => writer,
        Err(err) => {
            eprintln!("Failed to create WAV file: {}", err);
            exit(-4);
        }
    };

    for &sample in &waveform {
        if writer.write_sample(sample).is_err() {
            eprintln!("Failed to write WAV data");
            exit(-4);
        }
    }

    if writer.finalize().is_err() {
        eprintln!("Failed to finalize WAV file");
        exit(-4);
    }

    eprintln!("WAV frames written = {}", waveform.len());
}
