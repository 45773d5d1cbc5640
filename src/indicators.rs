//! Moving-average indicators over an intraday close series.

/// Simple moving average. `None` until the window is filled.
pub fn sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    let mut out = Vec::with_capacity(values.len());
    let mut running = 0.0;
    for (i, &value) in values.iter().enumerate() {
        running += value;
        if i + 1 < window {
            out.push(None);
            continue;
        }
        if i + 1 > window {
            running -= values[i - window];
        }
        out.push(Some(running / window as f64));
    }
    out
}

/// Exponential moving average, seeded from the first value
/// (alpha = 2 / (span + 1), no adjustment).
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut prev = values[0];
    out.push(prev);
    for &value in &values[1..] {
        prev = alpha * value + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_warmup_and_window() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&values, 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[3], Some(3.0));
        assert_eq!(out[4], Some(4.0));
    }

    #[test]
    fn test_ema_seeds_from_first_value() {
        let values = [10.0, 10.0, 10.0];
        assert_eq!(ema(&values, 5), vec![10.0, 10.0, 10.0]);

        let out = ema(&[10.0, 20.0], 3);
        // alpha = 0.5
        assert_eq!(out[1], 15.0);
    }

    #[test]
    fn test_empty_series() {
        assert!(sma(&[], 20).is_empty());
        assert!(ema(&[], 20).is_empty());
    }
}
