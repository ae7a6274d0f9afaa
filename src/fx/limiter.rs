//! Adaptive limiter and soft-knee compressor (C7 / C8 master bus).

/// Adaptive limiter: scale the whole buffer down so its peak sits at
/// `target`, then soft-clip any residual overshoot. Linear gain reduction
/// preserves transients; the soft-clip catches only what the linear stage
/// couldn't.
pub fn adaptive_limit(buffer: &mut [f32], target: f32) {
    let peak = buffer.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
    if peak > target && peak > 0.0 {
        let scale = target / peak;
        for sample in buffer.iter_mut() {
            *sample *= scale;
        }
    }
    for sample in buffer.iter_mut() {
        *sample = soft_clip(*sample, target);
    }
}

fn soft_clip(x: f32, target: f32) -> f32 {
    let abs_x = x.abs();
    if abs_x > target {
        let excess = abs_x - target;
        x.signum() * (target + excess / (1.0 + excess * excess))
    } else {
        x
    }
}

/// Soft-knee compressor used on the mixer's master bus: above `threshold`,
/// compress at `ratio`:1.
pub fn soft_knee_compress(buffer: &mut [f32], threshold: f32, ratio: f32) {
    for sample in buffer.iter_mut() {
        let abs_x = sample.abs();
        if abs_x > threshold {
            let excess = abs_x - threshold;
            *sample = sample.signum() * (threshold + excess / ratio);
        }
    }
}

/// Scales `buffer` so its peak sits at `target` (used for final
/// normalization after the master bus compressor).
pub fn peak_normalize(buffer: &mut [f32], target: f32) {
    let peak = buffer.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
    if peak > 0.0 {
        let scale = target / peak;
        for sample in buffer.iter_mut() {
            *sample *= scale;
        }
    }
}
