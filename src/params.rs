//! Instrument selection and synthesis parameters (spec section 6 table).

/// Which engine(s) a render call exercises. `GuitarBass` and `FullBand`
/// select the multi-track mixer (C8) over two or three single-instrument
/// engines respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrument {
    Guitar,
    Bass,
    Piano,
    Drums,
    GuitarBass,
    FullBand,
}

/// The five synthesis knobs shared across engines. Meaning is
/// instrument-specific (see `Params::clamp_for`); unused knobs for a given
/// instrument are ignored rather than rejected.
#[derive(Debug, Clone, Copy)]
pub struct Params {
    pub brightness: f32,
    pub pluck_position: f32,
    pub body_mix: f32,
    pub reflection: f32,
    pub coupling: f32,
}

struct Range {
    lo: f32,
    hi: f32,
    default: f32,
}

impl Range {
    const fn new(lo: f32, hi: f32, default: f32) -> Self {
        Self { lo, hi, default }
    }

    fn clamp_or_default(&self, value: Option<f32>) -> f32 {
        value.map(|v| v.clamp(self.lo, self.hi)).unwrap_or(self.default)
    }
}

struct ParamRanges {
    brightness: Range,
    pluck_position: Range,
    body_mix: Range,
    reflection: Range,
    coupling: Range,
}

fn ranges_for(instrument: Instrument) -> ParamRanges {
    match instrument {
        Instrument::Guitar => ParamRanges {
            brightness: Range::new(0.2, 0.8, 0.60),
            pluck_position: Range::new(0.08, 0.40, 0.25),
            body_mix: Range::new(0.0, 0.6, 0.15),
            reflection: Range::new(0.0, 0.3, 0.15),
            coupling: Range::new(0.0, 0.01, 0.005),
        },
        Instrument::Bass => ParamRanges {
            brightness: Range::new(0.2, 0.7, 0.65),
            pluck_position: Range::new(1.2, 2.5, 1.8),
            body_mix: Range::new(0.0, 0.6, 0.3),
            reflection: Range::new(0.0, 0.3, 0.1),
            coupling: Range::new(0.0, 0.0, 0.0), // unused
        },
        Instrument::Piano => ParamRanges {
            brightness: Range::new(0.3, 0.9, 0.65),
            pluck_position: Range::new(0.5, 2.0, 1.0),
            body_mix: Range::new(0.0, 0.5, 0.3),
            reflection: Range::new(0.0, 0.4, 0.15),
            coupling: Range::new(1.5, 3.5, 2.5),
        },
        Instrument::Drums => ParamRanges {
            brightness: Range::new(0.3, 0.9, 0.7),
            pluck_position: Range::new(0.5, 2.0, 1.2),
            body_mix: Range::new(0.0, 0.8, 0.4),
            reflection: Range::new(0.0, 0.5, 0.2),
            coupling: Range::new(1.0, 3.0, 2.0),
        },
        Instrument::GuitarBass => ParamRanges {
            brightness: Range::new(0.3, 0.8, 0.5),
            pluck_position: Range::new(0.3, 3.0, 1.8),
            body_mix: Range::new(0.0, 0.5, 0.28),
            reflection: Range::new(0.0, 0.3, 0.12),
            coupling: Range::new(45.0, 60.0, 52.0), // split pitch, not a unit fraction
        },
        Instrument::FullBand => ParamRanges {
            brightness: Range::new(0.4, 0.9, 0.7),
            pluck_position: Range::new(0.8, 2.5, 1.5),
            body_mix: Range::new(0.0, 0.6, 0.35),
            reflection: Range::new(0.0, 0.4, 0.18),
            coupling: Range::new(40.0, 65.0, 52.0),
        },
    }
}

impl Params {
    /// The documented defaults for `instrument`.
    pub fn defaults_for(instrument: Instrument) -> Self {
        let r = ranges_for(instrument);
        Self {
            brightness: r.brightness.default,
            pluck_position: r.pluck_position.default,
            body_mix: r.body_mix.default,
            reflection: r.reflection.default,
            coupling: r.coupling.default,
        }
    }

    /// Clamps every field of `self` to `instrument`'s documented range,
    /// substituting the default for any field the caller wants left
    /// unspecified. This never rejects input — out-of-range values are
    /// silently clamped per spec section 6.
    pub fn clamp_for(self, instrument: Instrument) -> Self {
        let r = ranges_for(instrument);
        Self {
            brightness: r.brightness.clamp_or_default(Some(self.brightness)),
            pluck_position: r.pluck_position.clamp_or_default(Some(self.pluck_position)),
            body_mix: r.body_mix.clamp_or_default(Some(self.body_mix)),
            reflection: r.reflection.clamp_or_default(Some(self.reflection)),
            coupling: r.coupling.clamp_or_default(Some(self.coupling)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let p = Params::defaults_for(Instrument::Guitar);
        assert!((p.brightness - 0.60).abs() < 1e-6);
        assert!((p.pluck_position - 0.25).abs() < 1e-6);
    }

    #[test]
    fn clamp_for_restricts_out_of_range_values() {
        let p = Params {
            brightness: 5.0,
            pluck_position: -1.0,
            body_mix: 0.1,
            reflection: 0.1,
            coupling: 0.0,
        }
        .clamp_for(Instrument::Guitar);
        assert!((p.brightness - 0.8).abs() < 1e-6);
        assert!((p.pluck_position - 0.08).abs() < 1e-6);
    }

    #[test]
    fn bass_coupling_is_unused_range() {
        let p = Params::defaults_for(Instrument::Bass);
        assert_eq!(p.coupling, 0.0);
    }
}
