//! Per-instrument physical synthesis engines (C2-C4).

pub mod bass;
pub mod guitar;
pub mod karplus_strong;
pub mod percussion;
pub mod piano;
