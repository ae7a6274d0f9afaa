//! Error types for the phonoforge library
//!
//! A unified error type for everything that can fail while turning a MIDI
//! byte stream into rendered audio.

use std::fmt;

/// Main error type for the phonoforge library
#[derive(Debug, Clone)]
pub enum PhonoError {
    /// MIDI bytes failed to parse, or contained no usable track data
    InvalidMidi(String),

    /// A score with zero note events was rendered
    EmptyScore,

    /// Render duration exceeded the 600 second hard cap
    DurationExceeded { seconds: f32, limit: f32 },

    /// A caller-supplied parameter was rejected outright (as opposed to
    /// silently clamped)
    InvalidParameter(String),

    /// WAV container encoding failed
    EncodingFailed(String),

    /// Internal failure: arithmetic overflow, allocation failure, or a
    /// violated invariant that isn't the caller's fault
    Render(String),
}

impl fmt::Display for PhonoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhonoError::InvalidMidi(msg) => write!(f, "invalid MIDI: {}", msg),
            PhonoError::EmptyScore => {
                write!(f, "score produced zero note events")
            }
            PhonoError::DurationExceeded { seconds, limit } => {
                write!(
                    f,
                    "render duration {:.1}s exceeds the {:.0}s cap",
                    seconds, limit
                )
            }
            PhonoError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            PhonoError::EncodingFailed(msg) => write!(f, "WAV encoding failed: {}", msg),
            PhonoError::Render(msg) => write!(f, "render error: {}", msg),
        }
    }
}

impl std::error::Error for PhonoError {}

impl From<std::io::Error> for PhonoError {
    fn from(err: std::io::Error) -> Self {
        PhonoError::EncodingFailed(err.to_string())
    }
}

impl From<midly::Error> for PhonoError {
    fn from(err: midly::Error) -> Self {
        PhonoError::InvalidMidi(err.to_string())
    }
}

impl From<hound::Error> for PhonoError {
    fn from(err: hound::Error) -> Self {
        PhonoError::EncodingFailed(err.to_string())
    }
}

/// Result type alias for phonoforge operations
pub type Result<T> = std::result::Result<T, PhonoError>;
