use crate::types::WindowLevel;

#[inline]
#[must_use]
pub fn find_min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &val| {
            (min.min(val), max.max(val))
        })
}

/// Window spanning the full range of `values`
///
/// A flat image gets width 1 so every pixel lands on mid gray instead of
/// dividing by zero.
#[must_use]
pub fn auto_window(values: &[f64]) -> WindowLevel {
    let (min, max) = find_min_max(values);
    if !(min.is_finite() && max.is_finite()) {
        return WindowLevel::new(0.0, 1.0);
    }

    let window = WindowLevel::from_range(min, max);
    if window.width > 0.0 {
        window
    } else {
        WindowLevel::new(window.center, 1.0)
    }
}
