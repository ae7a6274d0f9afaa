//! Struck-string piano voice (C3): hammer excitation, detuned multi-string
//! coupling, and a soundboard resonator.

use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::event::{NoteEvent, SAMPLE_RATE};
use crate::params::Params;

const DAMPER_SAMPLES: usize = (SAMPLE_RATE as f32 * 0.2) as usize;

/// Register-dependent base decay. The exact break points aren't given by
/// name in the parameter table (only the three decay values are), so the
/// split follows conventional piano register boundaries: below the cello
/// C (~65 Hz) is treated as "low", below treble C (~523 Hz) as "mid", and
/// everything above as "high" — see DESIGN.md.
fn register_decay(frequency: f32) -> f32 {
    if frequency < 130.0 {
        0.9998
    } else if frequency < 520.0 {
        0.9997
    } else {
        0.9995
    }
}

fn hammer_shape(t: f32) -> f32 {
    let raised = (1.0 - (std::f32::consts::PI * t).cos()) / 2.0;
    raised * (1.0 - 0.3 * raised)
}

/// Renders one detuned string: hammer excitation plus strike-point
/// reflection, then the same two-point-lowpass feedback recurrence as
/// section 4.2, with piano's own alpha/decay law.
fn render_string(
    frequency: f32,
    n_samples: usize,
    velocity: f32,
    rng: &mut rand::rngs::StdRng,
) -> Vec<f32> {
    let delay_len = (SAMPLE_RATE as f32 / frequency).round().max(2.0) as usize;
    let mut y = vec![0.0f32; n_samples.max(delay_len + 1)];

    let contact_samples = ((0.004 - frequency / 2_000_000.0) * SAMPLE_RATE as f32)
        .max(1.0) as usize;
    let strike_delay = (delay_len / 8).max(1);
    let hammer_velocity = velocity.powf(1.5);

    for i in 0..contact_samples.min(delay_len) {
        let t = i as f32 / contact_samples as f32;
        let noise: f32 = rng.random_range(-0.02..0.02);
        let pulse = hammer_shape(t) * hammer_velocity + noise;
        y[i] += pulse;
        let reflected_idx = i + strike_delay;
        if reflected_idx < delay_len {
            y[reflected_idx] -= pulse;
        }
    }

    let alpha = 0.6 + (frequency / 4186.0) * 0.35;
    let decay = register_decay(frequency).clamp(0.985, 0.9995);

    for i in delay_len..y.len() {
        let raw = alpha * y[i - delay_len] + (1.0 - alpha) * y[i - delay_len - 1];
        y[i] = raw * decay;
    }

    y.truncate(n_samples);
    y
}

/// Second-order soundboard resonator at `0.93 * frequency`, mixed 0.7 dry /
/// 0.3 wet into the string signal.
fn soundboard_mix(dry: &[f32], frequency: f32) -> Vec<f32> {
    let r = 0.98f32;
    let omega = 2.0 * std::f32::consts::PI * 0.93 * frequency / SAMPLE_RATE as f32;
    let cos_w = omega.cos();

    let mut y_prev1 = 0.0f32;
    let mut y_prev2 = 0.0f32;
    let mut out = Vec::with_capacity(dry.len());
    for &x in dry {
        let y = x + 2.0 * r * cos_w * y_prev1 - r * r * y_prev2;
        out.push(0.7 * x + 0.3 * y);
        y_prev2 = y_prev1;
        y_prev1 = y;
    }
    out
}

fn string_count(pitch: u8) -> usize {
    if pitch < 30 {
        1
    } else if pitch < 50 {
        2
    } else {
        3
    }
}

fn apply_damper(y: &mut [f32], release_at: usize) {
    if release_at >= y.len() {
        return;
    }
    let fade_end = (release_at + DAMPER_SAMPLES).min(y.len());
    for (n, sample) in y[release_at..fade_end].iter_mut().enumerate() {
        let t = n as f32 / DAMPER_SAMPLES as f32;
        *sample *= (-5.0 * t).exp();
    }
    for sample in &mut y[fade_end..] {
        *sample = 0.0;
    }
}

/// Renders a single piano note into a buffer of `n_samples`.
pub fn render_voice(
    event: &NoteEvent,
    n_samples: usize,
    _params: &Params,
    seed: u64,
) -> Result<Vec<f32>> {
    let frequency = event.frequency();
    let velocity = event.velocity as f32 / 127.0;
    let n = string_count(event.pitch);

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut mixed = vec![0.0f32; n_samples];
    for k in 0..n {
        let detune_cents = if n == 1 {
            0.0
        } else {
            (k as f32 - (n as f32 - 1.0) / 2.0) * 0.5
        };
        let detuned_freq = frequency * 2.0_f32.powf(detune_cents / 1200.0);
        let string = render_string(detuned_freq, n_samples, velocity, &mut rng);
        for (m, s) in mixed.iter_mut().zip(string.iter()) {
            *m += s / n as f32;
        }
    }

    let mut resonated = soundboard_mix(&mixed, frequency);

    if !event.sustained {
        apply_damper(&mut resonated, event.duration_samples() as usize);
    }

    Ok(resonated)
}
