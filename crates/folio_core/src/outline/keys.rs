//! Floating-point order key arithmetic.
//!
//! Keys are allocated between two pre-order neighbours. Once the gap between
//! neighbours can no longer be split, callers resequence the document and
//! retry with fresh integer keys.

/// Smallest gap still considered splittable.
pub const MIN_KEY_GAP: f64 = 1e-9;

/// Step used past the last key and between resequenced keys.
pub const KEY_STEP: f64 = 1.0;

/// Returns a key strictly between `lower` and `upper`, or `None` when the
/// interval is exhausted.
///
/// A missing bound means the new key sits at that end of the document.
pub fn key_between(lower: Option<f64>, upper: Option<f64>) -> Option<f64> {
    let key = match (lower, upper) {
        (None, None) => 0.0,
        (Some(lower), None) => lower + KEY_STEP,
        (None, Some(upper)) => upper - KEY_STEP,
        (Some(lower), Some(upper)) => {
            if upper - lower <= MIN_KEY_GAP {
                return None;
            }
            lower + (upper - lower) / 2.0
        }
    };

    let above_lower = lower.map_or(true, |lower| key > lower);
    let below_upper = upper.map_or(true, |upper| key < upper);
    if key.is_finite() && above_lower && below_upper {
        Some(key)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{key_between, MIN_KEY_GAP};

    #[test]
    fn open_bounds_step_by_one() {
        assert_eq!(key_between(None, None), Some(0.0));
        assert_eq!(key_between(Some(4.0), None), Some(5.0));
        assert_eq!(key_between(None, Some(4.0)), Some(3.0));
    }

    #[test]
    fn closed_bounds_take_midpoint() {
        assert_eq!(key_between(Some(1.0), Some(2.0)), Some(1.5));
    }

    #[test]
    fn exhausted_interval_is_rejected() {
        assert_eq!(key_between(Some(1.0), Some(1.0 + MIN_KEY_GAP / 2.0)), None);
        assert_eq!(key_between(Some(2.0), Some(1.0)), None);
    }

    #[test]
    fn huge_keys_that_cannot_grow_are_rejected() {
        let lower = 2f64.powi(60);
        assert_eq!(key_between(Some(lower), None), None);
    }
}
