//! Audio energy measurement

/// Full-scale amplitude of a signed 16-bit sample
const FULL_SCALE: f32 = 32768.0;

/// Normalized RMS energy of a block of 16-bit samples
///
/// Returns a value in `0.0..=1.0`; an empty block has zero energy.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn energy(block: &[i16]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = block
        .iter()
        .map(|&s| {
            let s = f64::from(s);
            s * s
        })
        .sum();
    let rms = (sum_squares / block.len() as f64).sqrt();

    #[allow(clippy::cast_possible_truncation)]
    let normalized = (rms / f64::from(FULL_SCALE)) as f32;
    normalized.clamp(0.0, 1.0)
}
