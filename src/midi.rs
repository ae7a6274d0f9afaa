//! MIDI Event Extractor (C1)
//!
//! Flattens a Standard MIDI File into a time-ordered sequence of
//! [`NoteEvent`]s plus sustain-pedal state, using `midly` for byte-level
//! parsing. Ticks are converted to samples at a fixed 48 kHz against the
//! tempo map found in the file (defaulting to 120 BPM when no `Set Tempo`
//! meta event is present).

use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};

use crate::error::{PhonoError, Result};
use crate::event::{NoteEvent, SAMPLE_RATE};

/// A gap longer than this is clamped (prevents pathological silent renders).
const MAX_SILENCE_SAMPLES: u64 = 2 * SAMPLE_RATE as u64;

/// The result of flattening a MIDI file: the events plus the total sample
/// length the render buffer should be sized to.
#[derive(Debug, Clone, Default)]
pub struct ExtractedScore {
    pub events: Vec<NoteEvent>,
    pub total_samples: u64,
}

struct OpenNote {
    start_sample: u64,
    velocity: u8,
    sustained_at_start: bool,
}

/// Parses `midi_bytes` and flattens all tracks into one global, sample-clocked
/// event list. Malformed input returns an empty [`ExtractedScore`] rather
/// than an error — callers at the API boundary translate that into
/// [`PhonoError::EmptyScore`].
pub fn extract_events(midi_bytes: &[u8]) -> ExtractedScore {
    let smf = match Smf::parse(midi_bytes) {
        Ok(smf) => smf,
        Err(_) => return ExtractedScore::default(),
    };

    let ticks_per_quarter = match smf.header.timing {
        midly::Timing::Metrical(tpq) => tpq.as_int() as u64,
        // Timecode-based files are rare in this context; fall back to a
        // conventional PPQ so downstream math still makes sense.
        midly::Timing::Timecode(_, _) => 480,
    };

    // Merge all tracks onto one cursor: each track's delta-times are
    // independent, so we run them in lockstep via a per-track cursor and
    // always advance the track with the least-elapsed ticks next. For the
    // format-0 (single track) and typical format-1 (tempo + parallel
    // instrument tracks) files this covers, a simpler approach suffices:
    // flatten each track's absolute-tick events, then merge-sort globally.
    let mut absolute_events: Vec<(u64, TrackEventKind)> = Vec::new();
    for track in &smf.tracks {
        let mut tick_cursor: u64 = 0;
        for event in track {
            tick_cursor += event.delta.as_int() as u64;
            absolute_events.push((tick_cursor, event.kind.clone()));
        }
    }
    absolute_events.sort_by_key(|(tick, _)| *tick);

    let mut sample_cursor: u64 = 0;
    let mut last_tick: u64 = 0;
    let mut micros_per_quarter: u64 = 500_000; // 120 BPM default
    let mut sustain_down = false;
    let mut open_notes: std::collections::HashMap<(u8, u8), OpenNote> =
        std::collections::HashMap::new();
    let mut events = Vec::new();

    for (tick, kind) in absolute_events {
        let delta_ticks = tick.saturating_sub(last_tick);
        last_tick = tick;

        if delta_ticks > 0 && ticks_per_quarter > 0 {
            let delta_samples = ticks_to_samples(delta_ticks, ticks_per_quarter, micros_per_quarter);
            sample_cursor += delta_samples.min(MAX_SILENCE_SAMPLES);
        }

        match kind {
            TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                micros_per_quarter = t.as_int() as u64;
            }
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } => {
                        let pitch = key.as_int();
                        let velocity = vel.as_int();
                        if velocity == 0 {
                            close_note(&mut open_notes, &mut events, channel, pitch, sample_cursor);
                        } else {
                            open_notes.insert(
                                (channel, pitch),
                                OpenNote {
                                    start_sample: sample_cursor,
                                    velocity,
                                    sustained_at_start: sustain_down,
                                },
                            );
                        }
                    }
                    MidiMessage::NoteOff { key, .. } => {
                        close_note(&mut open_notes, &mut events, channel, key.as_int(), sample_cursor);
                    }
                    MidiMessage::Controller { controller, value } => {
                        if controller.as_int() == 64 {
                            sustain_down = value.as_int() >= 64;
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    let total_samples = sample_cursor.max(1);
    let release_point = total_samples.saturating_sub(2 * SAMPLE_RATE as u64);
    for ((_, pitch), note) in open_notes {
        events.push(NoteEvent {
            start_sample: note.start_sample,
            end_sample: release_point.max(note.start_sample + 1),
            pitch,
            velocity: note.velocity,
            sustained: note.sustained_at_start,
        });
    }

    events.sort_by_key(|e| (e.start_sample, e.pitch));

    ExtractedScore {
        events,
        total_samples,
    }
}

fn close_note(
    open_notes: &mut std::collections::HashMap<(u8, u8), OpenNote>,
    events: &mut Vec<NoteEvent>,
    channel: u8,
    pitch: u8,
    at_sample: u64,
) {
    if let Some(note) = open_notes.remove(&(channel, pitch)) {
        let end_sample = at_sample.max(note.start_sample + 1);
        events.push(NoteEvent {
            start_sample: note.start_sample,
            end_sample,
            pitch,
            velocity: note.velocity,
            sustained: note.sustained_at_start,
        });
    }
}

fn ticks_to_samples(ticks: u64, ticks_per_quarter: u64, micros_per_quarter: u64) -> u64 {
    let seconds_per_tick = micros_per_quarter as f64 / 1_000_000.0 / ticks_per_quarter as f64;
    (ticks as f64 * seconds_per_tick * SAMPLE_RATE as f64).round() as u64
}

/// Validates a parsed score against the capacity rules in the error
/// taxonomy, translating raw extraction results into `Result`.
pub fn validate_score(score: &ExtractedScore, duration_cap_seconds: f32) -> Result<()> {
    if score.events.is_empty() {
        return Err(PhonoError::EmptyScore);
    }
    let seconds = score.total_samples as f32 / SAMPLE_RATE as f32;
    if seconds > duration_cap_seconds {
        return Err(PhonoError::DurationExceeded {
            seconds,
            limit: duration_cap_seconds,
        });
    }
    Ok(())
}
