//! Perceptual brightness curve for the output-enable PWM.
//!
//! The eye responds roughly logarithmically to light, so a linear PWM ramp
//! looks like it jumps from dark to bright in the first few steps and then
//! barely changes. [`DIM_CURVE`] corrects for that: equal steps of linear
//! brightness map to duty values that look evenly spaced.
//!
//! HUB08 and HUB12 panels blank their LEDs while OE is HIGH, so the value
//! programmed into the compare register is the *off* time. [`duty_for`] folds
//! that inversion in: brightness `0` yields [`DUTY_OFF`] and brightness `255`
//! yields the shortest off time.

/// Compare value that keeps OE HIGH for the whole PWM period (panel blank).
pub const DUTY_OFF: u8 = u8::MAX;

/// Gamma corrected on-time for every linear brightness step.
///
/// The table is monotonically non-decreasing.
pub const DIM_CURVE: [u8; 256] = [
    0, 1, 1, 2, 2, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 3, //
    3, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, //
    4, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 6, 6, 6, //
    6, 6, 6, 6, 6, 7, 7, 7, 7, 7, 7, 7, 8, 8, 8, 8, //
    8, 8, 9, 9, 9, 9, 9, 9, 10, 10, 10, 10, 10, 11, 11, 11, //
    11, 11, 12, 12, 12, 12, 12, 13, 13, 13, 13, 14, 14, 14, 14, 15, //
    15, 15, 16, 16, 16, 16, 17, 17, 17, 18, 18, 18, 19, 19, 19, 20, //
    20, 20, 21, 21, 22, 22, 22, 23, 23, 24, 24, 25, 25, 25, 26, 26, //
    27, 27, 28, 28, 29, 29, 30, 30, 31, 32, 32, 33, 33, 34, 35, 35, //
    36, 36, 37, 38, 38, 39, 40, 40, 41, 42, 43, 43, 44, 45, 46, 47, //
    48, 48, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62, //
    63, 64, 65, 66, 68, 69, 70, 71, 73, 74, 75, 76, 78, 79, 81, 82, //
    83, 85, 86, 88, 90, 91, 93, 94, 96, 98, 99, 101, 103, 105, 107, 109, //
    110, 112, 114, 116, 118, 121, 123, 125, 127, 129, 132, 134, 136, 139, 141, 144, //
    146, 149, 151, 154, 157, 159, 162, 165, 168, 171, 174, 177, 180, 183, 186, 190, //
    193, 196, 200, 203, 207, 211, 214, 218, 222, 226, 230, 234, 238, 242, 247, 252, //
];

/// Maps a linear brightness to the OE compare value (active-low off time).
#[must_use]
#[inline]
pub const fn duty_for(brightness: u8) -> u8 {
    DUTY_OFF - DIM_CURVE[brightness as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_is_monotonic() {
        for pair in DIM_CURVE.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_duty_non_increasing_with_brightness() {
        for a in 0..=u8::MAX {
            for b in a..=u8::MAX {
                assert!(duty_for(a) >= duty_for(b), "duty({a}) < duty({b})");
            }
        }
    }

    #[test]
    fn test_duty_endpoints() {
        assert_eq!(duty_for(0), DUTY_OFF);
        assert_eq!(duty_for(255), 3);
        assert_eq!(duty_for(128), 255 - 27);
    }

    #[test]
    fn test_duty_usable_in_const_context() {
        const FULL: u8 = duty_for(u8::MAX);
        assert!(FULL < DUTY_OFF);
    }
}
