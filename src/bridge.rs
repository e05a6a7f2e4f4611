//! Double-buffered state hand-off between the core and a consumer
//!
//! The core thread and the consumer (UI or audio driver) never share
//! live buffers. Each side keeps a private snapshot; publishing moves
//! the flagged fields into the shared snapshot under a mutex, and the
//! other side moves them out the same way. The mutex is held only for
//! those pointer-level moves, never during DSP work, so neither side
//! can stall the other.

use std::sync::Mutex;

use crate::modem::{DecodeParams, EncodeParams, Spectrogram, Statistics};

/// A message queued by the consumer for transmission.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub data: Vec<u8>,
    pub parameters: Option<EncodeParams>,
}

/// Core → consumer snapshot. Only fields with their flag set are
/// meaningful.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub update: bool,

    pub new_stats: bool,
    pub new_spectrogram: bool,
    pub new_tx_waveform: bool,
    pub new_rx_data: bool,
    pub new_signal: bool,

    pub stats: Statistics,
    pub spectrogram: Spectrogram,
    pub tx_waveform: Vec<i16>,
    pub rx_data: Vec<u8>,
    pub signal: Vec<f32>,
}

impl State {
    /// Move every flagged field into `dst` and clear this side's
    /// flags. Cheap: vectors move, nothing is copied.
    pub fn apply(&mut self, dst: &mut State) {
        if !self.update {
            return;
        }

        if self.new_stats {
            dst.update = true;
            dst.new_stats = true;
            dst.stats = self.stats;
        }

        if self.new_spectrogram {
            dst.update = true;
            dst.new_spectrogram = true;
            dst.spectrogram = std::mem::take(&mut self.spectrogram);
        }

        if self.new_tx_waveform {
            dst.update = true;
            dst.new_tx_waveform = true;
            dst.tx_waveform = std::mem::take(&mut self.tx_waveform);
        }

        if self.new_rx_data {
            dst.update = true;
            dst.new_rx_data = true;
            dst.rx_data = std::mem::take(&mut self.rx_data);
        }

        if self.new_signal {
            dst.update = true;
            dst.new_signal = true;
            dst.signal = std::mem::take(&mut self.signal);
        }

        self.clear_flags();
    }

    fn clear_flags(&mut self) {
        self.update = false;
        self.new_stats = false;
        self.new_spectrogram = false;
        self.new_tx_waveform = false;
        self.new_rx_data = false;
        self.new_signal = false;
    }
}

/// Consumer → core snapshot.
#[derive(Debug, Clone, Default)]
pub struct Input {
    pub update: bool,

    pub new_parameters_decode: bool,
    pub new_message: bool,

    pub parameters_decode: Option<DecodeParams>,
    pub message: Message,
}

impl Input {
    pub fn apply(&mut self, dst: &mut Input) {
        if !self.update {
            return;
        }

        if self.new_parameters_decode {
            dst.update = true;
            dst.new_parameters_decode = true;
            dst.parameters_decode = self.parameters_decode.take();
        }

        if self.new_message {
            dst.update = true;
            dst.new_message = true;
            dst.message = std::mem::take(&mut self.message);
        }

        self.update = false;
        self.new_parameters_decode = false;
        self.new_message = false;
    }
}

#[derive(Default)]
struct Shared {
    state: State,
    input: Input,
}

/// The shared middle of the double buffer. Both threads hold a
/// reference (typically through `Arc`).
#[derive(Default)]
pub struct Bridge {
    shared: Mutex<Shared>,
}

impl Bridge {
    pub fn new() -> Self {
        Bridge::default()
    }

    /// Core side: swap the freshly produced state into the shared
    /// snapshot.
    pub fn publish_state(&self, state: &mut State) {
        let mut shared = self.shared.lock().unwrap();
        state.apply(&mut shared.state);
    }

    /// Consumer side: move pending state out of the shared snapshot.
    /// Returns true if anything new arrived.
    pub fn fetch_state(&self, dst: &mut State) -> bool {
        let mut shared = self.shared.lock().unwrap();
        let fresh = shared.state.update;
        shared.state.apply(dst);
        fresh
    }

    /// Consumer side: queue commands for the core.
    pub fn publish_input(&self, input: &mut Input) {
        let mut shared = self.shared.lock().unwrap();
        input.apply(&mut shared.input);
    }

    /// Core side: move pending commands out. Returns true if anything
    /// new arrived.
    pub fn fetch_input(&self, dst: &mut Input) -> bool {
        let mut shared = self.shared.lock().unwrap();
        let fresh = shared.input.update;
        shared.input.apply(dst);
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_state_moves_through() {
        let bridge = Bridge::new();

        let mut produced = State {
            update: true,
            new_rx_data: true,
            rx_data: b"SOS".to_vec(),
            ..State::default()
        };
        bridge.publish_state(&mut produced);

        // producer side is drained by the move
        assert!(!produced.update);
        assert!(produced.rx_data.is_empty());

        let mut received = State::default();
        assert!(bridge.fetch_state(&mut received));
        assert!(received.new_rx_data);
        assert_eq!(received.rx_data, b"SOS");
    }

    #[test]
    fn test_fetch_without_publish_is_empty() {
        let bridge = Bridge::new();
        let mut received = State::default();
        assert!(!bridge.fetch_state(&mut received));
    }

    #[test]
    fn test_unflagged_fields_stay_put() {
        let bridge = Bridge::new();

        let mut produced = State {
            update: true,
            new_stats: true,
            stats: Statistics {
                estimated_pitch_hz: 550.0,
                ..Statistics::default()
            },
            rx_data: b"NOT FLAGGED".to_vec(),
            ..State::default()
        };
        bridge.publish_state(&mut produced);

        let mut received = State::default();
        bridge.fetch_state(&mut received);
        assert!(received.new_stats);
        assert_eq!(received.stats.estimated_pitch_hz, 550.0);
        assert!(!received.new_rx_data);
        assert!(received.rx_data.is_empty());
    }

    #[test]
    fn test_input_roundtrip_across_threads() {
        let bridge = Arc::new(Bridge::new());

        let consumer = {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || {
                let mut input = Input {
                    update: true,
                    new_message: true,
                    message: Message {
                        data: b"CQ CQ".to_vec(),
                        parameters: None,
                    },
                    ..Input::default()
                };
                bridge.publish_input(&mut input);
            })
        };
        consumer.join().unwrap();

        let mut core_side = Input::default();
        assert!(bridge.fetch_input(&mut core_side));
        assert!(core_side.new_message);
        assert_eq!(core_side.message.data, b"CQ CQ");
    }

    #[test]
    fn test_consumer_may_skip_snapshots() {
        let bridge = Bridge::new();

        for round in 0..3u8 {
            let mut produced = State {
                update: true,
                new_rx_data: true,
                rx_data: vec![b'A' + round],
                ..State::default()
            };
            bridge.publish_state(&mut produced);
        }

        // only the latest snapshot survives the overwrites
        let mut received = State::default();
        bridge.fetch_state(&mut received);
        assert_eq!(received.rx_data, vec![b'C']);
    }
}
