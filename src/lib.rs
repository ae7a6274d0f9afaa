//! # phonoforge
//!
//! Renders a MIDI byte stream into a physically-modeled mono 48 kHz WAV:
//! Karplus-Strong plucked strings (guitar, bass), a struck-string piano
//! voice, a synthesized percussion bank, and a multi-track mixer for
//! ensemble renders.
//!
//! ## Quick Start
//!
//! ```no_run
//! use phonoforge::prelude::*;
//!
//! fn main() -> Result<(), PhonoError> {
//!     let midi_bytes = std::fs::read("song.mid").unwrap();
//!     let params = Params::defaults_for(Instrument::Guitar);
//!     let audio = render(&midi_bytes, Instrument::Guitar, params, 0)?;
//!     std::fs::write("out.wav", audio.wav_bytes).unwrap();
//!     Ok(())
//! }
//! ```

pub mod agc;
pub mod arrangement;
pub mod error;
pub mod event;
pub mod fx;
pub mod midi;
pub mod mixer;
pub mod params;
pub mod render;
pub mod synth;
pub mod wav;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{PhonoError, Result};
    pub use crate::event::{pitch_to_frequency, NoteEvent, SAMPLE_RATE};
    pub use crate::params::{Instrument, Params};
    pub use crate::render::{render, render_with_progress, RenderedAudio};
}
