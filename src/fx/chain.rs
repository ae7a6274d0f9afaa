//! Per-instrument post-FX chain (C7): biquad EQ stages, body/soundboard
//! resonance, multi-tap reverb, and the adaptive limiter, applied in the
//! fixed order spec section 4.7 lists for each instrument.
//!
//! Several stages specify a percentage boost rather than a dB figure
//! (e.g. guitar's "+25%"); these are converted via `20*log10(1+pct)` and
//! applied as the gain of a peaking/shelf biquad. Stages that name a gain
//! only qualitatively (bass's "sub boost", "attack") use the conservative
//! end of what a mastering engineer would reach for; see DESIGN.md.

use crate::event::SAMPLE_RATE;
use crate::fx::biquad::{Biquad, Cascade, FilterKind};
use crate::fx::limiter::{adaptive_limit, peak_normalize};
use crate::fx::reverb::{self, Tap};
use crate::params::Params;

fn pct_to_db(pct: f32) -> f32 {
    20.0 * (1.0 + pct).log10()
}

fn blend(dry: &[f32], wet_processed: &[f32], wet: f32) -> Vec<f32> {
    dry.iter()
        .zip(wet_processed.iter())
        .map(|(d, w)| d * (1.0 - wet) + w * wet)
        .collect()
}

pub fn apply_guitar_chain(buffer: &mut Vec<f32>, params: &Params) {
    let sr = SAMPLE_RATE as f32;

    Cascade::butterworth(FilterKind::HighPass, 80.0, 6, sr).process_buffer(buffer);

    let dry = buffer.clone();
    let mut notched = dry.clone();
    Biquad::new(FilterKind::Notch, 280.0, 25.0, sr).process_buffer(&mut notched);
    *buffer = blend(&dry, &notched, 0.20);

    Biquad::new(FilterKind::Peaking { gain_db: pct_to_db(0.25) }, 2500.0, 12.0, sr)
        .process_buffer(buffer);
    Biquad::new(FilterKind::Peaking { gain_db: pct_to_db(0.18) }, 4500.0, 20.0, sr)
        .process_buffer(buffer);
    Biquad::new(FilterKind::HighShelf { gain_db: pct_to_db(0.12) }, 8000.0, crate::fx::biquad::BUTTERWORTH_Q, sr)
        .process_buffer(buffer);

    Cascade::butterworth(FilterKind::LowPass, 12_000.0, 3, sr).process_buffer(buffer);

    let taps = [
        Tap {
            delay_ms: 80.0,
            gain: 0.5 * params.reflection,
        },
        Tap {
            delay_ms: 120.0,
            gain: 0.3 * params.reflection,
        },
    ];
    reverb::process(buffer, &taps, 0.20);

    adaptive_limit(buffer, 0.93);
}

pub fn apply_bass_chain(buffer: &mut Vec<f32>, params: &Params) {
    let sr = SAMPLE_RATE as f32;

    Biquad::new(FilterKind::HighPass, 25.0, crate::fx::biquad::BUTTERWORTH_Q, sr).process_buffer(buffer);
    Biquad::new(FilterKind::Peaking { gain_db: 4.0 }, 70.0, 1.4, sr).process_buffer(buffer);
    Biquad::new(FilterKind::Notch, 280.0, 8.0, sr).process_buffer(buffer);
    Biquad::new(FilterKind::Peaking { gain_db: 3.0 }, 2000.0, 1.2, sr).process_buffer(buffer);
    Biquad::new(FilterKind::LowPass, 5000.0, crate::fx::biquad::BUTTERWORTH_Q, sr).process_buffer(buffer);

    if params.reflection > 0.0 {
        let taps = [Tap {
            delay_ms: 30.0,
            gain: params.reflection,
        }];
        reverb::process(buffer, &taps, 0.15);
    }

    peak_normalize(buffer, 0.96);
}

pub fn apply_piano_chain(buffer: &mut Vec<f32>, params: &Params) {
    let sr = SAMPLE_RATE as f32;

    Biquad::new(FilterKind::HighPass, 25.0, crate::fx::biquad::BUTTERWORTH_Q, sr).process_buffer(buffer);
    Biquad::new(FilterKind::Peaking { gain_db: 3.0 }, 110.0, 1.2, sr).process_buffer(buffer);
    Biquad::new(FilterKind::Notch, 500.0, 10.0, sr).process_buffer(buffer);
    Biquad::new(FilterKind::Notch, 700.0, 10.0, sr).process_buffer(buffer);
    Biquad::new(FilterKind::Peaking { gain_db: pct_to_db(0.40) }, 3000.0, 1.5, sr).process_buffer(buffer);
    Biquad::new(FilterKind::HighShelf { gain_db: pct_to_db(0.20) }, 8000.0, crate::fx::biquad::BUTTERWORTH_Q, sr)
        .process_buffer(buffer);

    let taps = [
        Tap { delay_ms: 40.0, gain: 0.6 * params.reflection },
        Tap { delay_ms: 90.0, gain: 0.4 * params.reflection },
        Tap { delay_ms: 150.0, gain: 0.25 * params.reflection },
        Tap { delay_ms: 230.0, gain: 0.15 * params.reflection },
    ];
    reverb::process(buffer, &taps, 0.25);

    peak_normalize(buffer, 0.96);
}

pub fn apply_drums_chain(buffer: &mut Vec<f32>, params: &Params) {
    let sr = SAMPLE_RATE as f32;
    let drive = 1.0 + params.body_mix * 1.5;
    for sample in buffer.iter_mut() {
        *sample = (*sample * drive).tanh();
    }

    if params.brightness > 0.6 {
        Biquad::new(FilterKind::HighShelf { gain_db: 4.0 }, 5000.0, crate::fx::biquad::BUTTERWORTH_Q, sr)
            .process_buffer(buffer);
    } else if params.brightness < 0.4 {
        Biquad::new(FilterKind::LowPass, 300.0, crate::fx::biquad::BUTTERWORTH_Q, sr).process_buffer(buffer);
    }

    let taps = [
        Tap { delay_ms: 30.0, gain: params.reflection },
        Tap { delay_ms: 60.0, gain: params.reflection * 0.7 },
    ];
    reverb::process(buffer, &taps, 0.20);

    adaptive_limit(buffer, 0.95);
}
