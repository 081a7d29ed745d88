//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Binomial coefficient `n choose k`.
///
/// Returns 0 if `k > n`. Computed in floating point with the recurrence
/// `C(n, i) = C(n, i - 1) (n - k + i) / i`, which is exact while the result fits in
/// the mantissa and loses precision rather than overflowing beyond that.
pub fn binomial(n: u32, k: u32) -> f64 {
    if k > n {
        return 0.0;
    }

    let k = k.min(n - k);

    (1..=k).fold(1.0, |res, i| res * f64::from(n - k + i) / f64::from(i))
}

/// The falling factorial `a (a - 1) ... (a - b + 1)`, which is 1 for `b = 0`.
pub fn falling_factorial<T>(a: u32, b: u32) -> T
where
    T: Float,
{
    let mut res = T::one();

    for i in 0..b {
        // Terms below zero can only be reached when b > a + 1, in which case
        // the product has already passed through zero.
        res = res * T::from(a as i64 - i as i64).unwrap_or_else(T::zero);
    }

    res
}

/// Integrate `func` over `[a, b]` using the composite Simpson rule with the given
/// number of panels.
///
/// An odd number of panels is rounded up to the next even number.
pub fn simpson<T, F>(func: F, a: T, b: T, panels: usize) -> T
where
    T: Float,
    F: Fn(T) -> T,
{
    let n = if panels % 2 == 0 {
        panels.max(2)
    } else {
        panels + 1
    };

    let n_t = match T::from(n) {
        Some(v) => v,
        None => return T::nan(),
    };
    let two = T::one() + T::one();
    let four = two + two;
    let h = (b - a) / n_t;

    let mut sum = func(a) + func(b);

    for i in 1..n {
        let x = a + h * T::from(i).unwrap_or_else(T::nan);
        sum = sum + if i % 2 == 0 { two * func(x) } else { four * func(x) };
    }

    sum * h / (two + T::one())
}
