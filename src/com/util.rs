use std::cmp::*;

/* clipping within min and max */
#[inline(always)]
pub fn CLIP3<T: Ord>(min_x: T, max_x: T, value: T) -> T {
    max(min_x, min(max_x, value))
}

#[inline(always)]
pub fn clip<T: PartialOrd>(v: T, min: T, max: T) -> T {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

/* rounds to two decimals the way the feature extractor does */
#[inline(always)]
pub fn two_decimals(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Sum of squared differences between two strided blocks.
pub fn sse(a: &[i16], a_stride: usize, b: &[i16], b_stride: usize, w: usize, h: usize) -> u64 {
    let mut sum = 0u64;
    for y in 0..h {
        let ra = &a[y * a_stride..y * a_stride + w];
        let rb = &b[y * b_stride..y * b_stride + w];
        for (&p, &q) in ra.iter().zip(rb.iter()) {
            let d = p as i64 - q as i64;
            sum += (d * d) as u64;
        }
    }
    sum
}

/// Sum of absolute differences between two strided blocks.
pub fn sad(a: &[i16], a_stride: usize, b: &[i16], b_stride: usize, w: usize, h: usize) -> u64 {
    let mut sum = 0u64;
    for y in 0..h {
        let ra = &a[y * a_stride..y * a_stride + w];
        let rb = &b[y * b_stride..y * b_stride + w];
        for (&p, &q) in ra.iter().zip(rb.iter()) {
            sum += (p as i32 - q as i32).abs() as u64;
        }
    }
    sum
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clip3_bounds() {
        assert_eq!(CLIP3(-12, 51, 60), 51);
        assert_eq!(CLIP3(-12, 51, -20), -12);
        assert_eq!(CLIP3(-12, 51, 30), 30);
    }

    #[test]
    fn block_distortions() {
        let a = [1i16, 2, 3, 4, 9, 9];
        let b = [1i16, 4, 0, 3, 4, 0];
        // 2x2 blocks, a with stride 3, b with stride 2
        assert_eq!(sad(&a, 3, &b, 2, 2, 2), 0 + 2 + 4 + 6);
        assert_eq!(sse(&a, 3, &b, 2, 2, 2), 0 + 4 + 16 + 36);
    }

    #[test]
    fn rounding_to_two_decimals() {
        assert_eq!(two_decimals(0.456), 0.46);
        assert_eq!(two_decimals(-0.5), -0.5);
    }
}
