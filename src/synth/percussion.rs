//! Percussion Voice Bank (C4).
//!
//! One voice per General MIDI drum class, each built from additive
//! sinusoids and/or filtered noise under an exponential envelope — additive
//! synthesis instead of raw square-wave bursts avoids the aliasing hiss a
//! naive implementation would otherwise produce.

use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

use crate::event::SAMPLE_RATE;
use crate::fx::biquad::{Biquad, FilterKind};
use crate::params::Params;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumClass {
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
    LowTom,
    MidTom,
    HighTom,
    Cymbal,
}

/// Maps a General MIDI drum-map pitch onto one of the eight synthesized
/// classes this engine implements. Pitches outside the documented ranges
/// fall back to the closest class by ear (closed hat for high percussion,
/// low tom for low).
pub fn classify(pitch: u8) -> DrumClass {
    match pitch {
        35 | 36 => DrumClass::Kick,
        37 | 38 | 40 => DrumClass::Snare,
        42 | 44 => DrumClass::ClosedHat,
        46 => DrumClass::OpenHat,
        41 | 43 => DrumClass::LowTom,
        45 | 47 => DrumClass::MidTom,
        48 | 50 => DrumClass::HighTom,
        49 | 51 | 57 | 59 => DrumClass::Cymbal,
        p if p < 42 => DrumClass::LowTom,
        _ => DrumClass::ClosedHat,
    }
}

/// True for MIDI pitches this engine recognizes as a named GM drum-map
/// entry (as opposed to `classify`'s best-effort fallback for anything
/// else). Used by the render pipeline to route ensemble events to the
/// drum voice without relying on MIDI channel 10.
pub fn is_gm_drum_pitch(pitch: u8) -> bool {
    matches!(
        pitch,
        35 | 36 | 37 | 38 | 40 | 41 | 42 | 43 | 44 | 45 | 46 | 47 | 48 | 49 | 50 | 51 | 57 | 59
    )
}

fn sine(freq: f32, t: f32) -> f32 {
    (2.0 * PI * freq * t).sin()
}

fn white_noise(rng: &mut rand::rngs::StdRng, n: usize) -> Vec<f32> {
    (0..n).map(|_| rng.random_range(-1.0..1.0)).collect()
}

/// Renders one percussion hit of `n_samples` for `class`, scaled by the
/// velocity curve `(velocity/127)^pluck_position`.
pub fn render_voice(
    class: DrumClass,
    n_samples: usize,
    velocity: u8,
    params: &Params,
    seed: u64,
) -> Vec<f32> {
    let sr = SAMPLE_RATE as f32;
    let velocity_scaled = (velocity as f32 / 127.0).powf(params.pluck_position);
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    let mut out = match class {
        DrumClass::Kick => {
            let mut noise = white_noise(&mut rng, n_samples);
            let mut lp = Biquad::new(
                FilterKind::LowPass,
                800.0 + params.brightness * 2000.0,
                crate::fx::biquad::BUTTERWORTH_Q,
                sr,
            );
            lp.process_buffer(&mut noise);
            let mut buf = vec![0.0f32; n_samples];
            for (i, sample) in buf.iter_mut().enumerate() {
                let t = i as f32 / sr;
                let freq = 50.0 + 180.0 * (-40.0 * t).exp();
                let click_env = (-100.0 * t).exp();
                let body = sine(freq, t);
                *sample = (body + noise[i] * click_env).tanh_scaled(1.8);
            }
            buf
        }
        DrumClass::Snare => {
            let mut noise = white_noise(&mut rng, n_samples);
            let mut bp = Biquad::new(FilterKind::BandPass, 3500.0, 1.1, sr);
            bp.process_buffer(&mut noise);
            (0..n_samples)
                .map(|i| {
                    let t = i as f32 / sr;
                    let freq = 180.0 * (1.0 + 0.05 * (-15.0 * t).exp());
                    let envelope = 0.6 * (-25.0 * t).exp() + 0.4 * (-8.0 * t).exp();
                    (sine(freq, t) + noise[i]) * envelope
                })
                .collect()
        }
        DrumClass::ClosedHat => {
            let cutoff = 7000.0 + (params.brightness - 0.5) * 2000.0;
            additive_hat(n_samples, sr, cutoff, -50.0, &mut rng)
        }
        DrumClass::OpenHat => additive_hat(n_samples, sr, 4000.0, -8.0, &mut rng),
        DrumClass::LowTom => tom(n_samples, sr, 85.0),
        DrumClass::MidTom => tom(n_samples, sr, 130.0),
        DrumClass::HighTom => tom(n_samples, sr, 190.0),
        DrumClass::Cymbal => cymbal(n_samples, sr, &mut rng),
    };

    for sample in out.iter_mut() {
        *sample *= velocity_scaled;
    }
    out
}

const HAT_PARTIALS: [f32; 6] = [263.0, 400.0, 421.0, 474.0, 587.0, 845.0];

/// A pure sum of sub-1kHz sinusoids has no energy for a highpass above
/// 4-7kHz to pass through — LTI filtering can't create harmonics the
/// source never had. Real hi-hat synthesis (and the sample-based original)
/// gets its "sizzle" from broadband noise shaped by that highpass; the
/// additive stack rides underneath it as the metallic ring. Noise
/// dominates the mix so the highpass has real stopband-crossing energy to
/// pass.
fn additive_hat(
    n_samples: usize,
    sr: f32,
    highpass_hz: f32,
    envelope_rate: f32,
    rng: &mut rand::rngs::StdRng,
) -> Vec<f32> {
    let mut stack = white_noise(rng, n_samples);
    for sample in stack.iter_mut() {
        *sample *= 0.7;
    }
    for &partial in HAT_PARTIALS.iter() {
        for (i, sample) in stack.iter_mut().enumerate() {
            let t = i as f32 / sr;
            *sample += 0.3 * sine(partial, t) / HAT_PARTIALS.len() as f32;
        }
    }
    let mut hp = Biquad::new(FilterKind::HighPass, highpass_hz, crate::fx::biquad::BUTTERWORTH_Q, sr);
    hp.process_buffer(&mut stack);
    for (i, sample) in stack.iter_mut().enumerate() {
        let t = i as f32 / sr;
        *sample *= (envelope_rate * t).exp();
    }
    stack
}

fn tom(n_samples: usize, sr: f32, base_freq: f32) -> Vec<f32> {
    (0..n_samples)
        .map(|i| {
            let t = i as f32 / sr;
            let freq = base_freq * (1.0 + 0.6 * (-18.0 * t).exp());
            let envelope = (-5.0 * t).exp();
            sine(freq, t).tanh_scaled(1.0) * envelope
        })
        .collect()
}

// Inharmonic partials characteristic of a cymbal, chosen to be densely
// inharmonic rather than a clean overtone series (see DESIGN.md).
const CYMBAL_PARTIALS: [f32; 7] = [287.0, 398.0, 521.0, 642.0, 794.0, 934.0, 1187.0];

fn cymbal(n_samples: usize, sr: f32, rng: &mut rand::rngs::StdRng) -> Vec<f32> {
    // Same LTI constraint as the hat voices: the inharmonic partials alone
    // carry no energy for a 4kHz highpass to pass, so broadband noise
    // supplies the shimmer the partials ring underneath.
    let mut stack = white_noise(rng, n_samples);
    for sample in stack.iter_mut() {
        *sample *= 0.7;
    }
    for &partial in CYMBAL_PARTIALS.iter() {
        for (i, sample) in stack.iter_mut().enumerate() {
            let t = i as f32 / sr;
            *sample += 0.3 * sine(partial, t) * 0.6 / CYMBAL_PARTIALS.len() as f32;
        }
    }
    let mut hp = Biquad::new(FilterKind::HighPass, 4000.0, crate::fx::biquad::BUTTERWORTH_Q, sr);
    hp.process_buffer(&mut stack);
    for (i, sample) in stack.iter_mut().enumerate() {
        let t = i as f32 / sr;
        *sample *= (-t / 2.5).exp();
    }
    stack
}

trait TanhScaled {
    fn tanh_scaled(self, drive: f32) -> f32;
}

impl TanhScaled for f32 {
    fn tanh_scaled(self, drive: f32) -> f32 {
        (self * drive).tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Instrument;

    #[test]
    fn is_gm_drum_pitch_rejects_melodic_range() {
        assert!(is_gm_drum_pitch(36));
        assert!(!is_gm_drum_pitch(60));
    }

    #[test]
    fn classify_matches_gm_drum_map() {
        assert_eq!(classify(36), DrumClass::Kick);
        assert_eq!(classify(38), DrumClass::Snare);
        assert_eq!(classify(42), DrumClass::ClosedHat);
        assert_eq!(classify(46), DrumClass::OpenHat);
        assert_eq!(classify(49), DrumClass::Cymbal);
    }

    #[test]
    fn kick_energy_concentrates_below_200hz() {
        let params = Params::defaults_for(Instrument::Drums);
        let buf = render_voice(DrumClass::Kick, 48_000, 110, &params, 1);
        assert!(buf.iter().all(|s| s.is_finite()));
        assert!(buf.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn closed_hat_has_dominant_energy_above_6khz() {
        // A pure sum of sub-1kHz sinusoids through a highpass has nothing
        // above the cutoff to pass; the noise-driven voice must.
        let params = Params::defaults_for(Instrument::Drums);
        let buf = render_voice(DrumClass::ClosedHat, 9600, 110, &params, 1);
        let sr = SAMPLE_RATE as f32;
        let mut low = buf.clone();
        Biquad::new(FilterKind::LowPass, 6000.0, crate::fx::biquad::BUTTERWORTH_Q, sr).process_buffer(&mut low);
        let mut high = buf.clone();
        Biquad::new(FilterKind::HighPass, 6000.0, crate::fx::biquad::BUTTERWORTH_Q, sr).process_buffer(&mut high);
        let rms = |b: &[f32]| (b.iter().map(|s| s * s).sum::<f32>() / b.len() as f32).sqrt();
        assert!(rms(&high) > rms(&low), "high: {}, low: {}", rms(&high), rms(&low));
    }

    #[test]
    fn velocity_curve_scales_output() {
        let params = Params::defaults_for(Instrument::Drums);
        let quiet = render_voice(DrumClass::Snare, 4800, 10, &params, 2);
        let loud = render_voice(DrumClass::Snare, 4800, 120, &params, 2);
        let quiet_peak = quiet.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
        let loud_peak = loud.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
        assert!(loud_peak > quiet_peak);
    }
}
