//! Note event data model shared by every synthesis engine.

pub const SAMPLE_RATE: u32 = 48_000;

/// A single sounded note, already converted from MIDI ticks to sample indices.
///
/// Invariant: `end_sample > start_sample`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub start_sample: u64,
    pub end_sample: u64,
    pub pitch: u8,
    pub velocity: u8,
    pub sustained: bool,
}

impl NoteEvent {
    /// Frequency in Hz for this event's pitch: `f = 440 * 2^((pitch-69)/12)`.
    pub fn frequency(&self) -> f32 {
        pitch_to_frequency(self.pitch)
    }

    pub fn duration_samples(&self) -> u64 {
        self.end_sample - self.start_sample
    }
}

/// Converts a MIDI pitch (0-127) to frequency in Hz.
pub fn pitch_to_frequency(pitch: u8) -> f32 {
    440.0 * 2.0_f32.powf((pitch as f32 - 69.0) / 12.0)
}
