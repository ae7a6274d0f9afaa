//! Guitar plucked-string voice (C2).

use crate::event::NoteEvent;
use crate::params::Params;
use crate::synth::karplus_strong::{self, PluckedEngine};

struct GuitarEngine {
    coupling: f32,
}

impl PluckedEngine for GuitarEngine {
    fn base_decay(&self, frequency: f32) -> f32 {
        let freq_compensation = -((frequency / 1000.0).min(1.0)) * 0.001 - self.coupling * 0.002;
        0.9990 + freq_compensation
    }

    fn nonlinearity(&self, y: f32) -> (f32, f32) {
        let abs_y = y.abs();
        // Tension stiffening above 0.3
        let stiffened = if abs_y > 0.3 {
            y * (1.0 + (abs_y - 0.3) * 0.02)
        } else {
            y
        };
        // Dynamic damping proportional to instantaneous amplitude.
        let damping = 1.0 - abs_y * 0.01;
        (stiffened, damping)
    }
}

/// Renders a single guitar note into a buffer of `n_samples`.
pub fn render_voice(
    event: &NoteEvent,
    n_samples: usize,
    params: &Params,
    seed: u64,
) -> crate::error::Result<Vec<f32>> {
    let frequency = event.frequency();
    let velocity = (event.velocity as f32 / 127.0).powf(1.0);
    let engine = GuitarEngine {
        coupling: params.coupling,
    };
    let release_at = Some(event.duration_samples() as usize);
    let mut buf = karplus_strong::render(
        &engine,
        frequency,
        n_samples,
        velocity,
        params.brightness,
        release_at,
        event.sustained,
        seed,
    )?;

    // Low end attenuated rather than silenced: an earlier source variant
    // zeroed notes below 150 Hz outright, a later one settled on 0.25 gain.
    if frequency < 150.0 {
        for sample in buf.iter_mut() {
            *sample *= 0.25;
        }
    }

    Ok(buf)
}
