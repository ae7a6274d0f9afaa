//! Bass Arrangement Filter (C5)
//!
//! In accompaniment mode the bass engine doesn't play every note a human
//! bassist would skip in a dense chord voicing — it clusters, thins, and
//! octave-folds the incoming events the way a real arrangement would.
//! Solo-mode octave folding is configurable (spec section 9 open question).

use crate::event::NoteEvent;

const CLUSTER_WINDOW_SAMPLES: u64 = (crate::event::SAMPLE_RATE as u64 * 40) / 1000;
const MIN_GAP_SAMPLES: u64 = (crate::event::SAMPLE_RATE as u64 * 120) / 1000;
const MIN_GAP_LOUD_SAMPLES: u64 = (crate::event::SAMPLE_RATE as u64 * 60) / 1000;
const LOUD_VELOCITY_THRESHOLD: u8 = 90;
const MAX_BASS_PITCH: u8 = 67;

/// How the bass arrangement filter treats the incoming event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrangementMode {
    /// Cluster/thin/fold into `[28, 48]` for use alongside other instruments.
    Accompaniment,
    /// Keep every note, fold surviving pitches into `[28, 60]`.
    Solo,
    /// Keep every note, no octave folding at all (spec section 9: the
    /// source's implicit behavior, made explicit and opt-in here).
    SoloNoFold,
}

/// Applies the arrangement filter to `events`, which must already be sorted
/// by `(start_sample, pitch)`.
pub fn arrange(events: &[NoteEvent], mode: ArrangementMode) -> Vec<NoteEvent> {
    match mode {
        ArrangementMode::Accompaniment => accompaniment(events),
        ArrangementMode::Solo => events.iter().map(|e| fold(*e, 28, 60)).collect(),
        ArrangementMode::SoloNoFold => events.to_vec(),
    }
}

fn accompaniment(events: &[NoteEvent]) -> Vec<NoteEvent> {
    let clustered = cluster_lowest(events);

    let mut accepted: Vec<NoteEvent> = Vec::new();
    let mut last_accepted_start: Option<u64> = None;
    for event in clustered {
        if event.pitch > MAX_BASS_PITCH {
            continue;
        }
        let min_gap = if event.velocity > LOUD_VELOCITY_THRESHOLD {
            MIN_GAP_LOUD_SAMPLES
        } else {
            MIN_GAP_SAMPLES
        };
        let accept = match last_accepted_start {
            None => true,
            Some(last) => event.start_sample.saturating_sub(last) > min_gap,
        };
        if accept {
            last_accepted_start = Some(event.start_sample);
            accepted.push(fold(event, 28, 48));
        }
    }
    accepted
}

/// Groups events whose `start_sample` values lie within a 40ms window and
/// keeps only the lowest pitch per group.
fn cluster_lowest(events: &[NoteEvent]) -> Vec<NoteEvent> {
    let mut result = Vec::new();
    let mut i = 0;
    while i < events.len() {
        let window_start = events[i].start_sample;
        let mut j = i;
        let mut lowest = events[i];
        while j < events.len() && events[j].start_sample - window_start <= CLUSTER_WINDOW_SAMPLES {
            if events[j].pitch < lowest.pitch {
                lowest = events[j];
            }
            j += 1;
        }
        result.push(lowest);
        i = j;
    }
    result
}

/// Shifts `event`'s pitch by octaves until it lies in `[lo, hi]`.
fn fold(mut event: NoteEvent, lo: u8, hi: u8) -> NoteEvent {
    while event.pitch > hi && event.pitch >= 12 {
        event.pitch -= 12;
    }
    while event.pitch < lo {
        event.pitch += 12;
    }
    event
}
