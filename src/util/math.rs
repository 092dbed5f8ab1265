//! Math re-exports and power-of-two helpers used for buffer sizing.

pub use glam::{IVec2, Mat3, Vec2, Vec3};

/// Smallest `e` such that `1 << e >= n`.
///
/// `0` and `1` both map to exponent `0`.
#[inline]
pub fn ceil_pow2_exp(n: u32) -> u32 {
    if n <= 1 {
        0
    } else {
        u32::BITS - (n - 1).leading_zeros()
    }
}

/// Next power of two `>= n` (with `next_pow2(0) == 1`).
#[inline]
pub fn next_pow2(n: u32) -> u32 {
    1 << ceil_pow2_exp(n)
}

/// Integer division rounding up.
#[inline]
pub fn div_ceil(n: u32, d: u32) -> u32 {
    n.div_ceil(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceil_pow2_exp() {
        assert_eq!(ceil_pow2_exp(0), 0);
        assert_eq!(ceil_pow2_exp(1), 0);
        assert_eq!(ceil_pow2_exp(2), 1);
        assert_eq!(ceil_pow2_exp(3), 2);
        assert_eq!(ceil_pow2_exp(4), 2);
        assert_eq!(ceil_pow2_exp(5), 3);
        assert_eq!(ceil_pow2_exp(1 << 20), 20);
        assert_eq!(ceil_pow2_exp((1 << 20) + 1), 21);
    }

    #[test]
    fn test_next_pow2() {
        assert_eq!(next_pow2(0), 1);
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(7), 8);
        assert_eq!(next_pow2(8), 8);
        // 800x600 at 4 rays per pixel
        assert_eq!(next_pow2(800 * 600 * 4), 1 << 21);
    }

    #[test]
    fn test_div_ceil() {
        assert_eq!(div_ceil(0, 64), 0);
        assert_eq!(div_ceil(1, 64), 1);
        assert_eq!(div_ceil(64, 64), 1);
        assert_eq!(div_ceil(65, 64), 2);
    }
}
