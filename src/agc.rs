//! Polyphony AGC (C6)
//!
//! A pre-pass over all events builds an integer grid counting simultaneous
//! active notes, then derives a single scalar gain per voice kind. Linear
//! summation of K identical voices grows as K but perceived loudness grows
//! roughly as sqrt(K); compensating by `1/sqrt(K)` keeps approximate
//! loudness constant while leaving headroom for the limiter.

use crate::event::NoteEvent;

/// Builds the polyphony grid and returns `max_polyphony` over `total_samples`.
/// The grid itself is discarded after this scan — only the peak matters.
pub fn max_polyphony(events: &[NoteEvent], total_samples: u64) -> u32 {
    if total_samples == 0 || events.is_empty() {
        return 0;
    }

    // A full per-sample grid would allocate `total_samples` u32s; instead
    // we sweep note start/end boundaries (a standard interval max-overlap
    // scan) which is equivalent and far cheaper for long renders.
    let mut boundaries: Vec<(u64, i32)> = Vec::with_capacity(events.len() * 2);
    for event in events {
        boundaries.push((event.start_sample, 1));
        boundaries.push((event.end_sample, -1));
    }
    boundaries.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut active: i32 = 0;
    let mut peak: i32 = 0;
    for (_, delta) in boundaries {
        active += delta;
        peak = peak.max(active);
    }
    peak.max(0) as u32
}

/// Gain attenuator for the guitar engine: `1/sqrt(max_polyphony)`, unity
/// when there's no overlap.
pub fn guitar_gain(max_polyphony: u32) -> f32 {
    if max_polyphony <= 1 {
        1.0
    } else {
        1.0 / (max_polyphony as f32).sqrt()
    }
}

/// Fixed piano AGC attenuator (spec section 4.6: a flat `0.8`, independent
/// of polyphony).
pub const PIANO_GAIN: f32 = 0.8;
