//! Shrink-to-fit font sizing.

/// Pick the font size for text that must fit `max_width`.
///
/// Candidates are `base - k * step` for k = 0, 1, ... down to `floor`. The
/// first candidate whose measured width fits wins; when none fits the floor
/// is used and the text may overflow. A base below the floor is used as is.
pub fn fit_font_size<F>(measure: F, base: f64, max_width: f64, floor: f64, step: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    if base <= floor || step <= 0.0 {
        return base;
    }

    let mut k = 0u32;
    loop {
        let size = base - f64::from(k) * step;
        if size < floor {
            return floor;
        }
        if measure(size) <= max_width {
            return size;
        }
        k += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Width grows linearly with size, like real glyph runs
    fn linear(em_width: f64) -> impl Fn(f64) -> f64 {
        move |size| em_width * size
    }

    #[test]
    fn test_fits_at_base_size() {
        assert_eq!(fit_font_size(linear(5.0), 12.0, 100.0, 6.0, 0.5), 12.0);
    }

    #[test]
    fn test_shrinks_to_largest_fitting_step() {
        // 10 em wide text in a 95 pt box: 9.5 fits, 10 does not
        assert_eq!(fit_font_size(linear(10.0), 12.0, 95.0, 6.0, 0.5), 9.5);
    }

    #[test]
    fn test_steps_are_relative_to_base() {
        // 12.3 - 3 * 1.0 = 9.3 is the first fitting candidate
        let size = fit_font_size(linear(10.0), 12.3, 95.0, 6.0, 1.0);
        assert!((size - 9.3).abs() < 1e-9);
    }

    #[test]
    fn test_floor_when_nothing_fits() {
        assert_eq!(fit_font_size(linear(100.0), 12.0, 50.0, 6.0, 0.5), 6.0);
    }

    #[test]
    fn test_floor_between_steps() {
        // candidates 12, 9.25, 6.5 -> nothing fits, floor 6 is used
        assert_eq!(fit_font_size(linear(100.0), 12.0, 50.0, 6.0, 2.75), 6.0);
    }

    #[test]
    fn test_base_below_floor_is_kept() {
        assert_eq!(fit_font_size(linear(100.0), 5.0, 10.0, 6.0, 0.5), 5.0);
    }

    #[test]
    fn test_exact_fit_is_accepted() {
        assert_eq!(fit_font_size(linear(10.0), 10.0, 100.0, 6.0, 0.5), 10.0);
    }
}
