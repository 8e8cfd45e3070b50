//! Step quantization and write verification shared by volume and brightness.

pub const LEVEL_EPSILON: f32 = 0.001;

/// Snaps `current + delta` to the step grid and clamps to `[0, 1]`.
pub fn quantize(current: f32, delta: f32) -> f32 {
    if delta == 0.0 {
        return current.clamp(0.0, 1.0);
    }
    let steps = 1.0 / delta.abs();
    (((current + delta) * steps).round() / steps).clamp(0.0, 1.0)
}

/// Already at the end the step pushes toward, so no movement is expected.
pub fn at_boundary(current: f32, delta: f32) -> bool {
    (current <= LEVEL_EPSILON && delta < 0.0) || (current >= 1.0 - LEVEL_EPSILON && delta > 0.0)
}

#[derive(Debug, PartialEq)]
pub(crate) enum StepError {
    WriteFailed,
    NoEffect,
}

/// Writes the quantized level and checks the hardware actually moved.
pub(crate) fn step_and_verify(
    current: f32,
    delta: f32,
    write: impl FnOnce(f32) -> Option<f32>,
) -> Result<f32, StepError> {
    let expected = quantize(current, delta);
    let actual = write(expected).ok_or(StepError::WriteFailed)?;
    if !at_boundary(current, delta) && (actual - current).abs() <= LEVEL_EPSILON {
        return Err(StepError::NoEffect);
    }
    Ok(actual)
}
