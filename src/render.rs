//! Render Pipeline (C10): orchestrates extraction, arrangement, AGC,
//! per-instrument synthesis, post-FX, the multi-track mixer, and WAV
//! encoding into the single public entry point of this crate.

use rayon::prelude::*;

use crate::agc::{self, PIANO_GAIN};
use crate::arrangement::{self, ArrangementMode};
use crate::error::{PhonoError, Result};
use crate::event::{NoteEvent, SAMPLE_RATE};
use crate::fx::chain;
use crate::midi::{self, ExtractedScore};
use crate::mixer;
use crate::params::{Instrument, Params};
use crate::synth::percussion::{self, DrumClass};
use crate::synth::{bass, guitar, piano};
use crate::wav;

const DURATION_CAP_SECONDS: f32 = 600.0;

/// Output of a successful render: the encoded WAV container plus the raw
/// float samples it was built from.
#[derive(Debug, Clone)]
pub struct RenderedAudio {
    pub wav_bytes: Vec<u8>,
    pub float_samples: Vec<f32>,
}

/// How long a voice's own release/decay tail is allowed to run past its
/// note-off before being truncated to the mix buffer's end.
fn release_tail_samples(engine: Engine) -> u64 {
    let seconds = match engine {
        Engine::Guitar | Engine::Bass => 1.0,
        Engine::Piano => 1.5,
        Engine::Drums => 2.5,
    };
    (seconds * SAMPLE_RATE as f32) as u64
}

/// Extra buffer length appended past the score's own duration, so a
/// voice's tail has room to ring out. Spec section 8 invariant 2 bounds
/// this to `[3, 5]` seconds, varying by instrument.
fn tail_padding_seconds(instrument: Instrument) -> f32 {
    match instrument {
        Instrument::Piano => 4.0,
        _ => 3.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Guitar,
    Bass,
    Piano,
    Drums,
}

/// Renders the complete score for `instrument` and `params`, returning the
/// WAV container and the underlying float samples.
pub fn render(
    midi_bytes: &[u8],
    instrument: Instrument,
    params: Params,
    seed: u64,
) -> Result<RenderedAudio> {
    render_with_progress(midi_bytes, instrument, params, seed, None)
}

/// Like [`render`], but reports per-event skips and coarse progress through
/// `progress` instead of staying silent. Silent by default: library call
/// sites that don't need diagnostics pass `None`.
pub fn render_with_progress(
    midi_bytes: &[u8],
    instrument: Instrument,
    params: Params,
    seed: u64,
    progress: Option<&dyn Fn(&str)>,
) -> Result<RenderedAudio> {
    let score = midi::extract_events(midi_bytes);
    midi::validate_score(&score, DURATION_CAP_SECONDS)?;
    let params = params.clamp_for(instrument);

    let buffer_len = score.total_samples + (tail_padding_seconds(instrument) * SAMPLE_RATE as f32) as u64;

    let mix = match instrument {
        Instrument::Guitar => render_single(&score, Engine::Guitar, &params, seed, buffer_len, progress),
        Instrument::Bass => render_bass_track(&score, &params, seed, buffer_len, ArrangementMode::Solo, progress),
        Instrument::Piano => render_single(&score, Engine::Piano, &params, seed, buffer_len, progress),
        Instrument::Drums => render_single(&score, Engine::Drums, &params, seed, buffer_len, progress),
        Instrument::GuitarBass => render_guitar_bass(&score, &params, seed, buffer_len, progress),
        Instrument::FullBand => render_full_band(&score, &params, seed, buffer_len, progress),
    };

    let wav_bytes = wav::encode(&mix)?;
    Ok(RenderedAudio {
        wav_bytes,
        float_samples: mix,
    })
}

/// Renders one engine's full event list (no arrangement filter) into a
/// buffer of `buffer_len`, post-FX applied, with that engine's AGC gain.
fn render_single(
    score: &ExtractedScore,
    engine: Engine,
    params: &Params,
    seed: u64,
    buffer_len: u64,
    progress: Option<&dyn Fn(&str)>,
) -> Vec<f32> {
    let mut mix = render_voices(&score.events, engine, params, seed, buffer_len, progress);
    apply_agc(&mut mix, engine, &score.events, score.total_samples);
    apply_chain(&mut mix, engine, params);
    mix
}

fn render_bass_track(
    score: &ExtractedScore,
    params: &Params,
    seed: u64,
    buffer_len: u64,
    mode: ArrangementMode,
    progress: Option<&dyn Fn(&str)>,
) -> Vec<f32> {
    let events = arrangement::arrange(&score.events, mode);
    let mut mix = render_voices(&events, Engine::Bass, params, seed, buffer_len, progress);
    apply_chain(&mut mix, Engine::Bass, params);
    mix
}

fn render_guitar_bass(
    score: &ExtractedScore,
    params: &Params,
    seed: u64,
    buffer_len: u64,
    progress: Option<&dyn Fn(&str)>,
) -> Vec<f32> {
    let split_pitch = params.coupling.round() as u8;
    let (bass_events, guitar_events): (Vec<NoteEvent>, Vec<NoteEvent>) = score
        .events
        .iter()
        .copied()
        .partition(|e| e.pitch < split_pitch);
    let bass_events = arrangement::arrange(&bass_events, ArrangementMode::Accompaniment);

    let mut guitar_mix = render_voices(&guitar_events, Engine::Guitar, params, seed, buffer_len, progress);
    apply_agc(&mut guitar_mix, Engine::Guitar, &guitar_events, score.total_samples);
    apply_chain(&mut guitar_mix, Engine::Guitar, params);

    let mut bass_mix = render_voices(&bass_events, Engine::Bass, params, seed.wrapping_add(1), buffer_len, progress);
    apply_chain(&mut bass_mix, Engine::Bass, params);

    mixer::mix_guitar_bass(guitar_mix, bass_mix, params)
}

fn render_full_band(
    score: &ExtractedScore,
    params: &Params,
    seed: u64,
    buffer_len: u64,
    progress: Option<&dyn Fn(&str)>,
) -> Vec<f32> {
    let split_pitch = params.coupling.round() as u8;

    let mut drum_events = Vec::new();
    let mut melodic_events = Vec::new();
    for &event in &score.events {
        if percussion::is_gm_drum_pitch(event.pitch) {
            drum_events.push(event);
        } else {
            melodic_events.push(event);
        }
    }
    let (bass_events, guitar_events): (Vec<NoteEvent>, Vec<NoteEvent>) = melodic_events
        .into_iter()
        .partition(|e| e.pitch < split_pitch);
    let bass_events = arrangement::arrange(&bass_events, ArrangementMode::Accompaniment);

    let mut guitar_mix = render_voices(&guitar_events, Engine::Guitar, params, seed, buffer_len, progress);
    apply_agc(&mut guitar_mix, Engine::Guitar, &guitar_events, score.total_samples);
    apply_chain(&mut guitar_mix, Engine::Guitar, params);

    let mut bass_mix = render_voices(&bass_events, Engine::Bass, params, seed.wrapping_add(1), buffer_len, progress);
    apply_chain(&mut bass_mix, Engine::Bass, params);

    let mut drums_mix = render_voices(&drum_events, Engine::Drums, params, seed.wrapping_add(2), buffer_len, progress);
    apply_chain(&mut drums_mix, Engine::Drums, params);

    mixer::mix_full_band(guitar_mix, bass_mix, drums_mix, params)
}

fn apply_agc(mix: &mut [f32], engine: Engine, events: &[NoteEvent], total_samples: u64) {
    match engine {
        Engine::Guitar => {
            let max_poly = agc::max_polyphony(events, total_samples);
            let gain = agc::guitar_gain(max_poly);
            for sample in mix.iter_mut() {
                *sample *= gain;
            }
        }
        Engine::Piano => {
            for sample in mix.iter_mut() {
                *sample *= PIANO_GAIN;
            }
        }
        Engine::Bass | Engine::Drums => {}
    }
}

fn apply_chain(mix: &mut Vec<f32>, engine: Engine, params: &Params) {
    match engine {
        Engine::Guitar => chain::apply_guitar_chain(mix, params),
        Engine::Bass => chain::apply_bass_chain(mix, params),
        Engine::Piano => chain::apply_piano_chain(mix, params),
        Engine::Drums => chain::apply_drums_chain(mix, params),
    }
}

/// Renders each event into its own scratch buffer in parallel via `rayon`,
/// then sums them into the mix buffer in a second, strictly sequential pass
/// over events sorted by `(start_sample, pitch)` — preserving deterministic
/// summation order regardless of how many threads did the rendering.
fn render_voices(
    events: &[NoteEvent],
    engine: Engine,
    params: &Params,
    seed: u64,
    buffer_len: u64,
    progress: Option<&dyn Fn(&str)>,
) -> Vec<f32> {
    let tail = release_tail_samples(engine);

    let scratch: Vec<Option<(u64, Vec<f32>)>> = events
        .par_iter()
        .enumerate()
        .map(|(index, event)| {
            if event.start_sample >= buffer_len {
                return None;
            }
            let n_samples = (event.duration_samples() + tail)
                .min(buffer_len - event.start_sample) as usize;
            if n_samples == 0 {
                return None;
            }
            let event_seed = seed ^ (index as u64).wrapping_mul(0x9E3779B97F4A7C15);
            match render_one(event, engine, n_samples, params, event_seed) {
                Ok(buf) => Some((event.start_sample, buf)),
                Err(_) => None,
            }
        })
        .collect();

    let mut mix = vec![0.0f32; buffer_len as usize];
    for (index, slot) in scratch.into_iter().enumerate() {
        match slot {
            Some((start, buf)) => {
                for (offset, sample) in buf.into_iter().enumerate() {
                    mix[start as usize + offset] += sample;
                }
            }
            None => {
                if let (Some(event), Some(cb)) = (events.get(index), progress) {
                    cb(&format!(
                        "skipped event at sample {} pitch {}",
                        event.start_sample, event.pitch
                    ));
                }
            }
        }
    }
    mix
}

fn render_one(
    event: &NoteEvent,
    engine: Engine,
    n_samples: usize,
    params: &Params,
    seed: u64,
) -> Result<Vec<f32>> {
    match engine {
        Engine::Guitar => guitar::render_voice(event, n_samples, params, seed),
        Engine::Bass => bass::render_voice(event, n_samples, params, seed),
        Engine::Piano => piano::render_voice(event, n_samples, params, seed),
        Engine::Drums => {
            let class = percussion::classify(event.pitch);
            Ok(percussion::render_voice(class, n_samples, event.velocity, params, seed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};

    fn single_note_midi(pitch: u8, velocity: u8, duration_ticks: u32) -> Vec<u8> {
        let track = vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel: u4::new(0),
                    message: MidiMessage::NoteOn {
                        key: u7::new(pitch),
                        vel: u7::new(velocity),
                    },
                },
            },
            TrackEvent {
                delta: u28::new(duration_ticks),
                kind: TrackEventKind::Midi {
                    channel: u4::new(0),
                    message: MidiMessage::NoteOff {
                        key: u7::new(pitch),
                        vel: u7::new(0),
                    },
                },
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ];
        let smf = Smf {
            header: Header::new(midly::Format::SingleTrack, Timing::Metrical(u15::new(480))),
            tracks: vec![track],
        };
        let mut buf = Vec::new();
        smf.write(&mut buf).unwrap();
        buf
    }

    #[test]
    fn empty_midi_returns_empty_score_error() {
        let bytes = single_note_midi(60, 0, 0); // velocity 0 note-on never opens a note
        let params = Params::defaults_for(Instrument::Guitar);
        let result = render(&bytes, Instrument::Guitar, params, 1);
        assert!(matches!(result, Err(PhonoError::EmptyScore)));
    }

    #[test]
    fn guitar_middle_c_renders_wav_with_tail_padding() {
        let bytes = single_note_midi(60, 100, 480); // one quarter note at 120 BPM = 0.5s
        let params = Params::defaults_for(Instrument::Guitar);
        let result = render(&bytes, Instrument::Guitar, params, 1).unwrap();
        assert_eq!(&result.wav_bytes[0..4], b"RIFF");
        assert!(result.float_samples.iter().all(|s| s.is_finite()));
        let peak = result.float_samples.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
        assert!(peak <= 0.96 + 1e-3);
    }

    #[test]
    fn guitar_bass_ensemble_produces_single_mixed_buffer() {
        let bytes = single_note_midi(40, 90, 480);
        let params = Params::defaults_for(Instrument::GuitarBass);
        let result = render(&bytes, Instrument::GuitarBass, params, 2).unwrap();
        assert!(!result.float_samples.is_empty());
        assert!(result.float_samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn full_band_routes_drum_pitch_without_crashing() {
        let bytes = single_note_midi(36, 110, 480); // kick
        let params = Params::defaults_for(Instrument::FullBand);
        let result = render(&bytes, Instrument::FullBand, params, 3).unwrap();
        assert!(result.float_samples.iter().all(|s| s.is_finite()));
    }
}
