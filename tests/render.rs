//! End-to-end scenarios and invariants/laws for the render pipeline,
//! exercised through the public `render` API the way a host application
//! would call it.

use midly::num::{u15, u28, u4, u7};
use midly::{Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};

use phonoforge::fx::biquad::{Biquad, FilterKind, BUTTERWORTH_Q};
use phonoforge::prelude::*;

const SR: f32 = SAMPLE_RATE as f32;

fn smf_bytes(track: Vec<TrackEvent<'static>>) -> Vec<u8> {
    let smf = Smf {
        header: Header::new(midly::Format::SingleTrack, Timing::Metrical(u15::new(480))),
        tracks: vec![track],
    };
    let mut buf = Vec::new();
    smf.write(&mut buf).unwrap();
    buf
}

fn note_on(delta: u32, pitch: u8, velocity: u8) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message: MidiMessage::NoteOn {
                key: u7::new(pitch),
                vel: u7::new(velocity),
            },
        },
    }
}

fn note_off(delta: u32, pitch: u8) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message: MidiMessage::NoteOff {
                key: u7::new(pitch),
                vel: u7::new(0),
            },
        },
    }
}

fn sustain(delta: u32, down: bool) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message: MidiMessage::Controller {
                controller: u7::new(64),
                value: u7::new(if down { 127 } else { 0 }),
            },
        },
    }
}

fn end_of_track(delta: u32) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, &x| m.max(x.abs()))
}

/// Narrowband energy at `freq` via a single-bin Goertzel-style correlation
/// (a dot product against sin/cos at the target frequency) — cheaper than a
/// full FFT and sufficient for "is this frequency present" assertions.
fn goertzel_magnitude(samples: &[f32], freq: f32, sample_rate: f32) -> f32 {
    let mut re = 0.0f32;
    let mut im = 0.0f32;
    for (i, &s) in samples.iter().enumerate() {
        let phase = 2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate;
        re += s * phase.cos();
        im += s * phase.sin();
    }
    (re * re + im * im).sqrt() / samples.len() as f32
}

fn lowpass_rms(samples: &[f32], cutoff: f32) -> f32 {
    let mut filtered = samples.to_vec();
    Biquad::new(FilterKind::LowPass, cutoff, BUTTERWORTH_Q, SR).process_buffer(&mut filtered);
    rms(&filtered)
}

fn highpass_rms(samples: &[f32], cutoff: f32) -> f32 {
    let mut filtered = samples.to_vec();
    Biquad::new(FilterKind::HighPass, cutoff, BUTTERWORTH_Q, SR).process_buffer(&mut filtered);
    rms(&filtered)
}

fn bandpass_rms(samples: &[f32], lo: f32, hi: f32) -> f32 {
    let mut filtered = samples.to_vec();
    Biquad::new(FilterKind::HighPass, lo, BUTTERWORTH_Q, SR).process_buffer(&mut filtered);
    Biquad::new(FilterKind::LowPass, hi, BUTTERWORTH_Q, SR).process_buffer(&mut filtered);
    rms(&filtered)
}

// --- Invariants -------------------------------------------------------

#[test]
fn invariant_wav_format_is_canonical() {
    let bytes = smf_bytes(vec![note_on(0, 60, 100), note_off(480, 60), end_of_track(0)]);
    let params = Params::defaults_for(Instrument::Guitar);
    let audio = render(&bytes, Instrument::Guitar, params, 1).unwrap();
    assert_eq!(&audio.wav_bytes[0..4], b"RIFF");
    assert_eq!(&audio.wav_bytes[8..12], b"WAVE");
    // fmt chunk: PCM(1), 1 channel, 48000 Hz, 16-bit.
    assert_eq!(u16::from_le_bytes([audio.wav_bytes[20], audio.wav_bytes[21]]), 1);
    assert_eq!(u16::from_le_bytes([audio.wav_bytes[22], audio.wav_bytes[23]]), 1);
    assert_eq!(
        u32::from_le_bytes([
            audio.wav_bytes[24],
            audio.wav_bytes[25],
            audio.wav_bytes[26],
            audio.wav_bytes[27]
        ]),
        48_000
    );
    assert_eq!(u16::from_le_bytes([audio.wav_bytes[34], audio.wav_bytes[35]]), 16);
}

#[test]
fn invariant_float_peak_stays_within_master_ceiling() {
    let bytes = smf_bytes(vec![note_on(0, 60, 127), note_off(480, 60), end_of_track(0)]);
    let params = Params::defaults_for(Instrument::Guitar);
    let audio = render(&bytes, Instrument::Guitar, params, 1).unwrap();
    assert!(peak(&audio.float_samples) <= 0.96 + 1e-3);
}

#[test]
fn invariant_float_peak_stays_within_master_ceiling_bass() {
    let bytes = smf_bytes(vec![note_on(0, 40, 127), note_off(480, 40), end_of_track(0)]);
    let params = Params::defaults_for(Instrument::Bass);
    let audio = render(&bytes, Instrument::Bass, params, 1).unwrap();
    assert!(peak(&audio.float_samples) <= 0.96 + 1e-3);
}

#[test]
fn invariant_float_peak_stays_within_master_ceiling_piano() {
    let bytes = smf_bytes(vec![note_on(0, 60, 127), note_off(480, 60), end_of_track(0)]);
    let params = Params::defaults_for(Instrument::Piano);
    let audio = render(&bytes, Instrument::Piano, params, 1).unwrap();
    assert!(peak(&audio.float_samples) <= 0.96 + 1e-3);
}

#[test]
fn invariant_rms_grows_with_velocity() {
    let params = Params::defaults_for(Instrument::Guitar);
    let quiet_bytes = smf_bytes(vec![note_on(0, 60, 30), note_off(480, 60), end_of_track(0)]);
    let loud_bytes = smf_bytes(vec![note_on(0, 60, 120), note_off(480, 60), end_of_track(0)]);
    let quiet = render(&quiet_bytes, Instrument::Guitar, params, 1).unwrap();
    let loud = render(&loud_bytes, Instrument::Guitar, params, 1).unwrap();
    assert!(rms(&loud.float_samples) > rms(&quiet.float_samples));
}

// --- Laws ---------------------------------------------------------------

#[test]
fn law_silence_in_silence_out() {
    // A track with no note events at all (velocity-0 note-on never opens a note).
    let bytes = smf_bytes(vec![note_on(0, 60, 0), end_of_track(480)]);
    let params = Params::defaults_for(Instrument::Guitar);
    let result = render(&bytes, Instrument::Guitar, params, 1);
    assert!(matches!(result, Err(PhonoError::EmptyScore)));
}

#[test]
fn law_determinism_same_seed_same_output() {
    let bytes = smf_bytes(vec![note_on(0, 64, 90), note_off(960, 64), end_of_track(0)]);
    let params = Params::defaults_for(Instrument::Guitar);
    let a = render(&bytes, Instrument::Guitar, params, 42).unwrap();
    let b = render(&bytes, Instrument::Guitar, params, 42).unwrap();
    assert_eq!(a.float_samples, b.float_samples);
}

#[test]
fn law_decay_monotonicity_after_release() {
    let bytes = smf_bytes(vec![note_on(0, 55, 110), note_off(960, 55), end_of_track(0)]);
    let params = Params::defaults_for(Instrument::Guitar);
    let audio = render(&bytes, Instrument::Guitar, params, 1).unwrap();

    let release_sample = (960.0 / 480.0 * 0.5 * SR) as usize; // quarter note at 120 BPM
    let window = (0.1 * SR) as usize;
    let mut windows = Vec::new();
    let mut cursor = release_sample;
    while cursor + window < audio.float_samples.len() && windows.len() < 10 {
        windows.push(rms(&audio.float_samples[cursor..cursor + window]));
        cursor += window;
    }
    for pair in windows.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-4);
    }
}

// --- Scenarios ------------------------------------------------------------

#[test]
fn scenario_guitar_middle_c() {
    let bytes = smf_bytes(vec![note_on(0, 60, 100), note_off(960, 60), end_of_track(0)]);
    let params = Params::defaults_for(Instrument::Guitar);
    let audio = render(&bytes, Instrument::Guitar, params, 1).unwrap();

    // ~4s total: ~1s note + 3s tail padding.
    let seconds = audio.float_samples.len() as f32 / SR;
    assert!((seconds - 4.0).abs() < 0.2, "expected ~4s, got {seconds}s");

    let fundamental = goertzel_magnitude(&audio.float_samples[..(SR as usize)], 261.626, SR);
    let off_target = goertzel_magnitude(&audio.float_samples[..(SR as usize)], 900.0, SR);
    assert!(fundamental > off_target);

    let first_100ms = rms(&audio.float_samples[..(0.1 * SR) as usize]);
    let last_100ms_start = audio.float_samples.len() - (0.1 * SR) as usize;
    let last_100ms = rms(&audio.float_samples[last_100ms_start..]);
    assert!(first_100ms > last_100ms * 1.9); // roughly >= 6 dB
}

#[test]
fn scenario_bass_arrangement_thinning() {
    use phonoforge::arrangement::{arrange, ArrangementMode};
    use phonoforge::event::NoteEvent;

    let pitches = [40u8, 42, 43, 45, 47, 48, 50, 52, 53, 55];
    let events: Vec<NoteEvent> = pitches
        .iter()
        .map(|&p| NoteEvent {
            start_sample: 0,
            end_sample: (0.2 * SR) as u64,
            pitch: p,
            velocity: 100,
            sustained: false,
        })
        .collect();
    let out = arrange(&events, ArrangementMode::Accompaniment);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].pitch, 40);
}

#[test]
fn scenario_piano_sustain_pedal() {
    let bytes = smf_bytes(vec![
        sustain(0, true),
        note_on(0, 60, 100),
        note_off(480, 60), // note-off at 0.5s (480 ticks @ 120bpm/480tpq = 0.5s)
        sustain(2400, false), // pedal off at t = 0.5 + 2.5 = 3s
        end_of_track(0),
    ]);
    let params = Params::defaults_for(Instrument::Piano);
    let audio = render(&bytes, Instrument::Piano, params, 1).unwrap();

    let peak_amp = peak(&audio.float_samples);
    let at_2s = (2.0 * SR) as usize;
    let window = (0.05 * SR) as usize;
    let amp_at_2s = peak(&audio.float_samples[at_2s..at_2s + window]);
    assert!(amp_at_2s > peak_amp * 0.1, "{amp_at_2s} vs {peak_amp}");
}

#[test]
fn scenario_polyphony_agc_bounds_peak() {
    let single_bytes = smf_bytes(vec![note_on(0, 55, 100), note_off(480, 55), end_of_track(0)]);
    let mut chord = Vec::new();
    for pitch in 48u8..64 {
        chord.push(note_on(0, pitch, 100));
    }
    for (i, pitch) in (48u8..64).enumerate() {
        chord.push(note_off(if i == 0 { 480 } else { 0 }, pitch));
    }
    chord.push(end_of_track(0));
    let chord_bytes = smf_bytes(chord);

    let params = Params::defaults_for(Instrument::Guitar);
    let single = render(&single_bytes, Instrument::Guitar, params, 1).unwrap();
    let poly = render(&chord_bytes, Instrument::Guitar, params, 1).unwrap();

    // The post-FX limiter bounds absolute peak regardless of polyphony; the
    // AGC's effect is verified directly (pre-limiter) in `agc.rs`'s own
    // tests. Here we just confirm the ensemble render stays finite and
    // within the master ceiling even at 16-way overlap.
    assert!(peak(&poly.float_samples) <= 0.96 + 1e-3);
    assert!(peak(&single.float_samples) <= 0.96 + 1e-3);
}

#[test]
fn scenario_full_band_balance_shifts_bass_energy() {
    let bytes = smf_bytes(vec![
        note_on(0, 40, 100),
        note_on(0, 64, 100),
        note_off(4800, 40),
        note_off(0, 64),
        end_of_track(0),
    ]);

    let mut bass_heavy = Params::defaults_for(Instrument::FullBand);
    bass_heavy.pluck_position = 2.5;
    let mut guitar_heavy = Params::defaults_for(Instrument::FullBand);
    guitar_heavy.pluck_position = 0.8;

    let bass_audio = render(&bytes, Instrument::FullBand, bass_heavy, 7).unwrap();
    let guitar_audio = render(&bytes, Instrument::FullBand, guitar_heavy, 7).unwrap();

    let bass_band_energy_high = bandpass_rms(&bass_audio.float_samples, 40.0, 250.0);
    let bass_band_energy_low = bandpass_rms(&guitar_audio.float_samples, 40.0, 250.0);
    assert!(bass_band_energy_high >= bass_band_energy_low * 1.2);
}

#[test]
fn scenario_drum_routing_by_frequency() {
    let kick_bytes = smf_bytes(vec![note_on(0, 36, 110), note_off(480, 36), end_of_track(0)]);
    let hat_bytes = smf_bytes(vec![note_on(0, 42, 110), note_off(480, 42), end_of_track(0)]);
    let params = Params::defaults_for(Instrument::Drums);

    let kick = render(&kick_bytes, Instrument::Drums, params, 1).unwrap();
    let hat = render(&hat_bytes, Instrument::Drums, params, 1).unwrap();

    let kick_low = lowpass_rms(&kick.float_samples, 200.0);
    let kick_high = highpass_rms(&kick.float_samples, 200.0);
    assert!(kick_low > kick_high);

    let hat_low = lowpass_rms(&hat.float_samples, 6000.0);
    let hat_high = highpass_rms(&hat.float_samples, 6000.0);
    assert!(hat_high > hat_low);
}
