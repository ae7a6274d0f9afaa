//! Bass plucked-string voice (C2), driven through the arrangement filter (C5).

use crate::event::NoteEvent;
use crate::params::Params;
use crate::synth::karplus_strong::{self, PluckedEngine};

struct BassEngine;

impl PluckedEngine for BassEngine {
    fn base_decay(&self, frequency: f32) -> f32 {
        let compensation = if frequency < 50.0 {
            0.992
        } else if frequency < 100.0 {
            0.996
        } else {
            1.0
        };
        0.997 * compensation
    }

    fn nonlinearity(&self, y: f32) -> (f32, f32) {
        let abs_y = y.abs();
        // Low-tension sag above 0.2 (inverse of the guitar's stiffening).
        let mut adjusted = if abs_y > 0.2 {
            y * (1.0 - (abs_y - 0.2) * 0.015)
        } else {
            y
        };
        if adjusted.abs() > 0.6 {
            adjusted = adjusted.tanh();
        }
        (adjusted, 1.0)
    }
}

/// Renders a single bass note into a buffer of `n_samples`.
pub fn render_voice(
    event: &NoteEvent,
    n_samples: usize,
    params: &Params,
    seed: u64,
) -> crate::error::Result<Vec<f32>> {
    let frequency = event.frequency();
    let velocity = event.velocity as f32 / 127.0;
    let engine = BassEngine;
    let release_at = Some(event.duration_samples() as usize);
    karplus_strong::render(
        &engine,
        frequency,
        n_samples,
        velocity,
        params.brightness,
        release_at,
        event.sustained,
        seed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Instrument;

    #[test]
    fn bass_note_renders() {
        let event = NoteEvent {
            start_sample: 0,
            end_sample: 24_000,
            pitch: 40,
            velocity: 90,
            sustained: false,
        };
        let params = Params::defaults_for(Instrument::Bass);
        let buf = render_voice(&event, 48_000, &params, 3).unwrap();
        assert_eq!(buf.len(), 48_000);
        assert!(buf.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn low_frequency_decay_uses_steeper_compensation() {
        let engine = BassEngine;
        assert!(engine.base_decay(40.0) < engine.base_decay(150.0));
    }
}
