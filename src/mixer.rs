//! Multi-Track Mixer (C8): energy-aware ducking, frequency-band splitting,
//! the balance law, and the master bus.

use crate::event::SAMPLE_RATE;
use crate::fx::biquad::{Cascade, FilterKind};
use crate::fx::limiter::{peak_normalize, soft_knee_compress};
use crate::params::Params;

const ONE_SECOND: usize = SAMPLE_RATE as usize;
const GAUSSIAN_SIGMA_SECONDS: f32 = 0.1;

fn zero_pad_to(buffers: &mut [Vec<f32>]) {
    let max_len = buffers.iter().map(|b| b.len()).max().unwrap_or(0);
    for buffer in buffers.iter_mut() {
        buffer.resize(max_len, 0.0);
    }
}

/// Per-sample short-time energy: a 1-second moving average of `x^2`,
/// normalized by the buffer's own maximum so it reads as a `[0, 1]`
/// "how busy is this voice right now" signal.
fn short_time_energy(buffer: &[f32]) -> Vec<f32> {
    let n = buffer.len();
    let mut energy = vec![0.0f32; n];
    let mut running_sum = 0.0f32;
    for i in 0..n {
        running_sum += buffer[i] * buffer[i];
        if i >= ONE_SECOND {
            running_sum -= buffer[i - ONE_SECOND] * buffer[i - ONE_SECOND];
        }
        let window = (i + 1).min(ONE_SECOND) as f32;
        energy[i] = running_sum / window;
    }
    let max = energy.iter().fold(0.0f32, |m, &x| m.max(x));
    if max > 0.0 {
        for e in energy.iter_mut() {
            *e /= max;
        }
    }
    energy
}

fn gaussian_smooth(signal: &[f32], sigma_seconds: f32) -> Vec<f32> {
    let sigma_samples = (sigma_seconds * SAMPLE_RATE as f32).max(1.0);
    let radius = (sigma_samples * 3.0).ceil() as isize;
    let mut kernel = Vec::with_capacity((radius * 2 + 1) as usize);
    let mut kernel_sum = 0.0f32;
    for k in -radius..=radius {
        let w = (-0.5 * (k as f32 / sigma_samples).powi(2)).exp();
        kernel.push(w);
        kernel_sum += w;
    }
    for w in kernel.iter_mut() {
        *w /= kernel_sum;
    }

    let n = signal.len() as isize;
    (0..n)
        .map(|i| {
            let mut acc = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let offset = k as isize - radius;
                let idx = i + offset;
                if idx >= 0 && idx < n {
                    acc += signal[idx as usize] * w;
                }
            }
            acc
        })
        .collect()
}

fn apply_ducking(bass: &mut [f32], ducking: &[f32]) {
    for (sample, &gain) in bass.iter_mut().zip(ducking.iter()) {
        *sample *= gain;
    }
}

/// Mixes a `GuitarBass` two-voice render.
pub fn mix_guitar_bass(mut guitar: Vec<f32>, mut bass: Vec<f32>, params: &Params) -> Vec<f32> {
    let sr = SAMPLE_RATE as f32;
    let mut voices = [guitar, bass];
    zero_pad_to(&mut voices);
    let [mut guitar, mut bass] = voices;

    let guitar_energy = short_time_energy(&guitar);
    let ducking_raw: Vec<f32> = guitar_energy.iter().map(|&g| 1.0 - 0.3 * g).collect();
    let ducking = gaussian_smooth(&ducking_raw, GAUSSIAN_SIGMA_SECONDS);
    apply_ducking(&mut bass, &ducking);

    Cascade::butterworth(FilterKind::HighPass, 200.0, 2, sr).process_buffer(&mut guitar);
    Cascade::butterworth(FilterKind::LowPass, 250.0, 4, sr).process_buffer(&mut bass);

    let (guitar_w, bass_w) = guitar_bass_balance(params.pluck_position);

    let n = guitar.len();
    let mut mix = vec![0.0f32; n];
    for i in 0..n {
        mix[i] = guitar[i] * guitar_w + bass[i] * bass_w;
    }

    master_bus(&mut mix);
    mix
}

/// Mixes a `FullBand` three-voice render, in `(guitar, bass, drums)` order
/// per the ordering guarantee in spec section 5.
pub fn mix_full_band(
    mut guitar: Vec<f32>,
    mut bass: Vec<f32>,
    mut drums: Vec<f32>,
    params: &Params,
) -> Vec<f32> {
    let sr = SAMPLE_RATE as f32;
    let mut voices = [guitar, bass, drums];
    zero_pad_to(&mut voices);
    [guitar, bass, drums] = voices;

    let guitar_energy = short_time_energy(&guitar);
    let drums_energy = short_time_energy(&drums);
    let ducking_raw: Vec<f32> = guitar_energy
        .iter()
        .zip(drums_energy.iter())
        .map(|(&g, &d)| 1.0 - 0.25 * (g + d) / 2.0)
        .collect();
    let ducking = gaussian_smooth(&ducking_raw, GAUSSIAN_SIGMA_SECONDS);
    apply_ducking(&mut bass, &ducking);

    Cascade::butterworth(FilterKind::LowPass, 250.0, 4, sr).process_buffer(&mut bass);
    band_pass_guitar(&mut guitar, sr);
    Cascade::butterworth(FilterKind::HighPass, 100.0, 2, sr).process_buffer(&mut drums);

    let (guitar_w, bass_w, drums_w) = full_band_balance(params.pluck_position);

    let n = guitar.len();
    let mut mix = vec![0.0f32; n];
    for i in 0..n {
        mix[i] = guitar[i] * guitar_w + bass[i] * bass_w + drums[i] * drums_w;
    }

    master_bus(&mut mix);
    mix
}

fn band_pass_guitar(buffer: &mut Vec<f32>, sr: f32) {
    Cascade::butterworth(FilterKind::HighPass, 200.0, 2, sr).process_buffer(buffer);
    Cascade::butterworth(FilterKind::LowPass, 8000.0, 2, sr).process_buffer(buffer);
}

/// FullBand balance law (spec section 4.8): base weights `(0.40, 0.32,
/// 0.28)`, shifted around the neutral point `pluck_pos = 1.5`.
fn full_band_balance(pluck_pos: f32) -> (f32, f32, f32) {
    let (mut guitar, mut bass, mut drums) = (0.40, 0.32, 0.28);
    if pluck_pos < 1.5 {
        let t = (1.5 - pluck_pos) / 0.7;
        guitar *= 1.0 + t * 0.3;
        bass *= 1.0 - t * 0.2;
        drums *= 1.0 - t * 0.2;
    } else if pluck_pos > 1.5 {
        let t = (pluck_pos - 1.5) / 1.0;
        guitar *= 1.0 - t * 0.3;
        bass *= 1.0 + t * 0.2;
        drums *= 1.0 + t * 0.2;
    }
    let sum = guitar + bass + drums;
    (guitar / sum, bass / sum, drums / sum)
}

/// GuitarBass balance: analogous to `full_band_balance`, shifting a neutral
/// 55/45 split around the midpoint of GuitarBass's `pluck_pos` range
/// (`[0.3, 3.0]` -> midpoint 1.65); see DESIGN.md.
fn guitar_bass_balance(pluck_pos: f32) -> (f32, f32) {
    let neutral = 1.65;
    let (mut guitar, mut bass) = (0.55, 0.45);
    if pluck_pos < neutral {
        let t = (neutral - pluck_pos) / (neutral - 0.3);
        guitar *= 1.0 + t * 0.3;
        bass *= 1.0 - t * 0.2;
    } else if pluck_pos > neutral {
        let t = (pluck_pos - neutral) / (3.0 - neutral);
        guitar *= 1.0 - t * 0.3;
        bass *= 1.0 + t * 0.2;
    }
    let sum = guitar + bass;
    (guitar / sum, bass / sum)
}

fn master_bus(mix: &mut [f32]) {
    soft_knee_compress(mix, 0.7, 3.0);
    peak_normalize(mix, 0.96);
}
