//! Zero-guarded division and significant-digit rounding.
//!
//! Evaluation results feed report tables directly, so these helpers never
//! emit `NaN` or `Infinity`.

/// Divides `numerator` by `denominator`, yielding `0.0` whenever the
/// denominator is zero or the quotient is non-finite.
#[must_use]
pub fn divide_zero_guarded(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let quotient = numerator / denominator;
    if quotient.is_finite() {
        quotient
    } else {
        0.0
    }
}

/// Rounds `value` to `digits` significant digits, half away from zero.
///
/// This is the deterministic fixed-precision convention applied to
/// uncertainty components of switched expressions (not the FPU's
/// round-half-even). Zero and non-finite inputs pass through unchanged.
#[must_use]
pub fn round_to_sig_figs(value: f64, digits: u32) -> f64 {
    if value == 0.0 || !value.is_finite() || digits == 0 {
        return value;
    }
    let magnitude = value.abs().log10().floor() as i32;
    let power = digits as i32 - 1 - magnitude;
    // Keep the scale an exact power of ten (10^k is exact for k <= 22) and
    // pick multiply or divide so the scaling itself stays exact-ish in both
    // directions of the magnitude range.
    let rounded = if power >= 0 {
        let scale = 10f64.powi(power);
        (value * scale).round() / scale
    } else {
        let scale = 10f64.powi(-power);
        (value / scale).round() * scale
    };
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}
