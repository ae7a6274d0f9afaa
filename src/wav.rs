//! WAV Encoder (C9): canonical mono 16-bit PCM RIFF/WAVE container.

use std::io::Cursor;

use crate::error::Result;
use crate::event::SAMPLE_RATE;

/// Converts `samples` (expected in `[-1.0, 1.0]`) to a RIFF/WAVE byte
/// buffer: 1 channel, 48kHz, 16-bit PCM, little-endian.
pub fn encode(samples: &[f32]) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let clamped = (sample * 32767.0).clamp(-32768.0, 32767.0);
            writer.write_sample(clamped as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
