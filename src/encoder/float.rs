use crate::domain::EncodingError;

/// Digit budget used when the caller does not configure one.
pub const DEFAULT_SIGNIFICANT_DIGITS: u32 = 4;

/// Number of decimal places needed to show `value` with roughly
/// `significant_digits` significant digits.
///
/// Zero never reaches `log10`. The `2 * EPSILON` correction keeps exact
/// powers of ten from gaining an extra decimal, and the result is clamped at
/// zero for values wider than the digit budget.
pub fn float_precision(value: f64, significant_digits: u32) -> usize {
    if value == 0.0 {
        return significant_digits.saturating_sub(1) as usize;
    }

    let precision = significant_digits as f64 - value.abs().log10() - 2.0 * f64::EPSILON;
    if precision <= 0.0 {
        0
    } else {
        // Truncates toward zero.
        precision as usize
    }
}

/// Render `value` as a plain fixed-point decimal string.
///
/// Never produces scientific notation, even for subnormal inputs. NaN and
/// infinities are rejected instead of being written as malformed fields.
pub fn encode_float(value: f64, significant_digits: u32) -> Result<String, EncodingError> {
    if !value.is_finite() {
        return Err(EncodingError::NonFinite {
            field: "value".to_string(),
            value,
        });
    }

    let precision = float_precision(value, significant_digits);
    // Folds -0.0 into 0.0 so zero never renders with a sign.
    let value = if value == 0.0 { 0.0 } else { value };

    Ok(format!("{value:.precision$}"))
}
