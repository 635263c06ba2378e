use crate::domain::TransformKind;

/// Apply the modality transform to one measurement.
pub fn apply(kind: TransformKind, value: f64) -> f64 {
    match kind {
        TransformKind::Log2Plus1 => (value + 1.0).log2(),
        TransformKind::Passthrough => value,
        TransformKind::Vaf => value,
    }
}

/// Variant allele frequency of one mutation row.
pub fn vaf(t_alt_count: f64, t_depth: f64) -> f64 {
    t_alt_count / t_depth
}

/// Render a float in scientific notation with at most `precision` fractional
/// digits, shortest form: trailing zeros are dropped, the decimal point is
/// kept even when bare, and the exponent carries a sign and at least two
/// digits. `3.0` renders as `3.e+00`, `0.25` as `2.5e-01`.
///
/// This is the equality granularity of the whole comparison: both pipelines
/// render through the same rules, so agreement at `precision` digits is
/// agreement.
pub fn format_float_scientific(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let rendered = format!("{value:.precision$e}");
    let (mantissa, exponent) = rendered
        .split_once('e')
        .expect("float scientific rendering always carries an exponent");

    let mantissa = match mantissa.split_once('.') {
        Some((integral, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            format!("{integral}.{fraction}")
        }
        None => format!("{mantissa}."),
    };

    let exponent: i32 = exponent
        .parse()
        .expect("float scientific exponent is an integer");
    format!("{mantissa}e{exponent:+03}")
}

/// NaN-preserving rendering: missing stays missing, everything else goes
/// through [`format_float_scientific`].
pub fn round_keeping_nans(value: f64, precision: usize) -> Option<String> {
    if value.is_nan() {
        None
    } else {
        Some(format_float_scientific(value, precision))
    }
}
