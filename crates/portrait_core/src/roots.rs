//! Sign-change scanning and bisection for scalar equations.
//!
//! A root is only ever reported inside a bracket with a strict sign change.
//! A sample that lands exactly on zero does not open a bracket, so such a
//! root is missed unless the neighbouring samples straddle it; bisection, on
//! the other hand, returns immediately when its midpoint evaluates to zero.

use crate::error::PortraitError;

pub const DEFAULT_SAMPLES: usize = 1000;
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

fn evaluate<F>(f: &F, x: f64) -> Result<f64, PortraitError>
where
    F: Fn(f64) -> f64 + ?Sized,
{
    let value = f(x);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PortraitError::DomainError { x })
    }
}

/// Splits `[lo, hi]` into `samples` equal parts and returns every adjacent
/// sample pair whose values have a strictly negative product.
pub fn scan_and_bracket<F>(
    f: &F,
    (lo, hi): (f64, f64),
    samples: usize,
) -> Result<Vec<(f64, f64)>, PortraitError>
where
    F: Fn(f64) -> f64 + ?Sized,
{
    if samples == 0 {
        return Err(PortraitError::InvalidSettings(
            "root scan needs at least one sample interval".into(),
        ));
    }
    if !lo.is_finite() || !hi.is_finite() {
        return Err(PortraitError::InvalidSettings(format!(
            "root scan range must be finite, got [{lo}, {hi}]"
        )));
    }

    let step = (hi - lo) / samples as f64;
    let mut brackets = Vec::new();
    let mut prev_x = lo;
    let mut prev_value = evaluate(f, lo)?;
    for i in 1..=samples {
        let x = lo + step * i as f64;
        let value = evaluate(f, x)?;
        if prev_value * value < 0.0 {
            brackets.push((prev_x, x));
        }
        prev_x = x;
        prev_value = value;
    }
    Ok(brackets)
}

/// Bisects `[min(a, b), max(a, b)]` until its width is at most `tolerance`.
pub fn bisect<F>(f: &F, a: f64, b: f64, tolerance: f64) -> Result<f64, PortraitError>
where
    F: Fn(f64) -> f64 + ?Sized,
{
    if !(tolerance > 0.0) {
        return Err(PortraitError::InvalidSettings(format!(
            "bisection tolerance must be positive, got {tolerance}"
        )));
    }

    let (mut left, mut right) = (a.min(b), a.max(b));
    let mut left_value = evaluate(f, left)?;
    while (right - left).abs() > tolerance {
        let mid = (left + right) / 2.0;
        // Adjacent floats: the bracket cannot shrink any further.
        if mid <= left || mid >= right {
            return Ok(mid);
        }
        let mid_value = evaluate(f, mid)?;
        let product = left_value * mid_value;
        if product < 0.0 {
            right = mid;
        } else if product > 0.0 {
            left = mid;
            left_value = mid_value;
        } else {
            return Ok(mid);
        }
    }
    Ok((left + right) / 2.0)
}

/// Roots of `f` on `range`, left to right, one per bracket.
pub fn solve<F>(f: &F, range: (f64, f64), samples: usize) -> Result<Vec<f64>, PortraitError>
where
    F: Fn(f64) -> f64 + ?Sized,
{
    scan_and_bracket(f, range, samples)?
        .into_iter()
        .map(|(lo, hi)| bisect(f, lo, hi, DEFAULT_TOLERANCE))
        .collect()
}
