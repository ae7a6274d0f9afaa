//! Shared Karplus-Strong feedback loop (C2 core).
//!
//! Guitar and bass are both plucked strings that differ only in their decay
//! law and their amplitude non-linearity; this module owns the delay line,
//! excitation, feedback recurrence, and release envelope, and takes the
//! per-engine decay/non-linearity as a callback — the same "buffer +
//! position + decay + brightness" shape as a conventional Karplus-Strong
//! delay line, generalized so guitar and bass can each supply their own
//! physics.

use rand::{Rng, SeedableRng};

use crate::error::{PhonoError, Result};
use crate::event::SAMPLE_RATE;

/// Per-engine decay law: given the fundamental frequency and the shared
/// `brightness`/`coupling` parameters, returns the base decay coefficient
/// before the dynamic damping non-linearity is folded in.
pub trait PluckedEngine {
    fn base_decay(&self, frequency: f32) -> f32;
    /// Applies the engine's amplitude non-linearity to a feedback sample,
    /// returning the adjusted sample and the per-sample dynamic damping
    /// multiplier to fold into decay.
    fn nonlinearity(&self, y: f32) -> (f32, f32);
}

const RELEASE_SAMPLES: usize = (SAMPLE_RATE as f32 * 0.15) as usize;

/// Renders `n_samples` of a plucked string at `frequency`, with note-off
/// (if any) at `release_at_sample`, into a freshly allocated buffer.
///
/// `velocity` is in `[0, 1]`; `brightness` is in `[0, 1]`; `seed` makes the
/// excitation noise reproducible.
pub fn render(
    engine: &dyn PluckedEngine,
    frequency: f32,
    n_samples: usize,
    velocity: f32,
    brightness: f32,
    release_at_sample: Option<usize>,
    sustained: bool,
    seed: u64,
) -> Result<Vec<f32>> {
    if frequency < 30.0 || frequency > SAMPLE_RATE as f32 / 2.0 {
        return Err(PhonoError::Render(format!(
            "invalid pitch frequency {:.1} Hz",
            frequency
        )));
    }

    let delay_len = (SAMPLE_RATE as f32 / frequency).round().max(2.0) as usize;
    let mut y = vec![0.0f32; n_samples.max(delay_len + 1)];
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    excite(&mut y, delay_len, velocity, brightness, &mut rng);

    let base_decay = engine.base_decay(frequency).clamp(0.985, 0.9995);
    let alpha = 0.5 + brightness * 0.35;

    for i in delay_len..y.len() {
        let raw = alpha * y[i - delay_len] + (1.0 - alpha) * y[i - delay_len - 1];
        let (adjusted, damping) = engine.nonlinearity(raw);
        y[i] = adjusted * base_decay * damping;
    }

    if let Some(release_at) = release_at_sample {
        if !sustained {
            apply_release(&mut y, release_at);
        }
    }

    y.truncate(n_samples);
    Ok(y)
}

/// Fills the delay line with a shaped triangular pulse plus low-amplitude
/// noise, windowed by a trapezoidal envelope, and smoothed by a one-pole
/// lowpass controlled by `brightness`.
fn excite(
    y: &mut [f32],
    delay_len: usize,
    velocity: f32,
    brightness: f32,
    rng: &mut rand::rngs::StdRng,
) {
    let rise = (delay_len / 4).max(1);
    let fall = (delay_len / 4).max(1);
    let mut prev = 0.0f32;
    for i in 0..delay_len.min(y.len()) {
        let window = trapezoid(i, delay_len, rise, fall);
        let triangle = 1.0 - (2.0 * i as f32 / delay_len as f32 - 1.0).abs();
        let noise: f32 = rng.random_range(-0.05..0.05);
        let raw = (triangle + noise) * window * velocity;
        let smoothed = brightness * raw + (1.0 - brightness) * prev * 0.2;
        y[i] = smoothed;
        prev = smoothed;
    }
}

fn trapezoid(i: usize, length: usize, rise: usize, fall: usize) -> f32 {
    if i < rise {
        i as f32 / rise as f32
    } else if i >= length.saturating_sub(fall) {
        let remaining = length - i;
        remaining as f32 / fall as f32
    } else {
        1.0
    }
}

fn apply_release(y: &mut [f32], release_at: usize) {
    if release_at >= y.len() {
        return;
    }
    let fade_end = (release_at + RELEASE_SAMPLES).min(y.len());
    let fade_len = (fade_end - release_at).max(1);
    for (n, sample) in y[release_at..fade_end].iter_mut().enumerate() {
        let gain = 1.0 - n as f32 / fade_len as f32;
        *sample *= gain;
    }
    for sample in &mut y[fade_end..] {
        *sample = 0.0;
    }
}
