//! Linear interpolation across missing periods

/// Values strictly between `start` and `end` when `missing` evenly spaced
/// periods are absent between them.
pub fn linear_fill(start: f64, end: f64, missing: usize) -> Vec<f64> {
    let steps = (missing + 1) as f64;
    (1..=missing)
        .map(|i| start + (end - start) * i as f64 / steps)
        .collect()
}
