//! Guidance-scale sampling quantized to quarter steps.

use super::random::RandomSource;

/// Quantization step for emitted guidance values.
pub const CFG_STEP: f64 = 0.25;
/// Substituted when the quantized value would fall below 1.0.
pub const CFG_FALLBACK: f64 = 8.5;

/// Draw a guidance value in `[min, max]` rounded to the nearest [`CFG_STEP`].
///
/// The rounded value is clamped to the quarter multiples that lie inside the
/// bounds. When no quarter multiple fits (e.g. `[7.3, 7.4]`), `min` is
/// returned unrounded. Values below 1.0 are replaced by [`CFG_FALLBACK`].
pub fn sample_cfg_scale<R: RandomSource + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    quantize(min + rng.unit() * (max - min), min, max)
}

fn quantize(raw: f64, min: f64, max: f64) -> f64 {
    let steps = 1.0 / CFG_STEP;
    let lo = (min * steps).ceil() / steps;
    let hi = (max * steps).floor() / steps;
    let value = if lo > hi {
        min
    } else {
        ((raw * steps).round() / steps).clamp(lo, hi)
    };
    if value < 1.0 { CFG_FALLBACK } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::random::SystemRandom;
    use crate::test_support::ScriptedRandom;

    fn is_quarter_multiple(value: f64) -> bool {
        (value * 4.0).fract() == 0.0
    }

    #[test]
    fn midpoint_draw_maps_linearly() {
        let mut rng = ScriptedRandom::with_units(vec![0.5]);
        assert_eq!(sample_cfg_scale(&mut rng, 7.5, 15.0), 11.25);
    }

    #[test]
    fn values_round_to_nearest_quarter() {
        // 7.5 + 0.1 * 7.5 = 8.25 exactly; 7.5 + 0.11 * 7.5 = 8.325 -> 8.25
        let mut rng = ScriptedRandom::with_units(vec![0.1, 0.11, 0.13]);
        assert_eq!(sample_cfg_scale(&mut rng, 7.5, 15.0), 8.25);
        assert_eq!(sample_cfg_scale(&mut rng, 7.5, 15.0), 8.25);
        assert_eq!(sample_cfg_scale(&mut rng, 7.5, 15.0), 8.5);
    }

    #[test]
    fn below_one_uses_fallback() {
        let mut rng = ScriptedRandom::with_units(vec![0.0]);
        assert_eq!(sample_cfg_scale(&mut rng, 0.1, 0.9), CFG_FALLBACK);
    }

    #[test]
    fn equal_bounds_return_the_bound() {
        let mut rng = ScriptedRandom::with_units(vec![0.73]);
        assert_eq!(sample_cfg_scale(&mut rng, 9.0, 9.0), 9.0);
    }

    #[test]
    fn unaligned_bounds_snap_inward_to_the_quarter_grid() {
        // 7.3 rounds down to 7.25, below min; 7.6 rounds up to 7.75, above max.
        let mut rng = ScriptedRandom::with_units(vec![0.0, 1.0]);
        assert_eq!(sample_cfg_scale(&mut rng, 7.3, 7.6), 7.5);
        assert_eq!(sample_cfg_scale(&mut rng, 7.3, 7.6), 7.5);
    }

    #[test]
    fn bounds_without_a_quarter_multiple_return_min() {
        let mut rng = ScriptedRandom::with_units(vec![0.5]);
        assert_eq!(sample_cfg_scale(&mut rng, 7.3, 7.4), 7.3);
    }

    #[test]
    fn sampled_values_are_quarter_multiples_within_bounds() {
        let bounds = [
            (7.5, 15.0),
            (1.0, 2.0),
            (3.0, 3.5),
            (12.0, 20.0),
            (7.3, 7.6),
            (1.1, 9.9),
            (4.05, 4.55),
        ];
        let mut rng = SystemRandom::new();
        for (min, max) in bounds {
            for _ in 0..500 {
                let value = sample_cfg_scale(&mut rng, min, max);
                assert!(is_quarter_multiple(value), "{value} not a quarter step");
                assert!(value >= min && value <= max, "{value} outside [{min}, {max}]");
            }
        }
    }
}
