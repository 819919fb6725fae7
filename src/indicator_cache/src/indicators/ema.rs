/// Exponential moving average in its recursive ("adjust=false") form.
///
/// `ema[0] = values[0]`, then `ema[i] = α·values[i] + (1 − α)·ema[i−1]` with
/// `α = 2 / (period + 1)`. The first output is the first input, so there is
/// no warm-up gap; the seed's influence decays geometrically instead.
///
/// # Example
///
/// ```
/// use indicator_cache::indicators::ema::ema;
///
/// let out = ema(&[10.0, 11.0, 12.0], 3);
/// assert_eq!(out[0], 10.0);
/// assert_eq!(out[1], 10.5);
/// assert_eq!(out[2], 11.25);
/// ```
pub fn ema(values: &[f64], period: u32) -> Vec<f64> {
    smooth(values, 2.0 / (f64::from(period) + 1.0))
}

/// Recursive smoothing with an explicit factor, shared with Wilder's RSI (`α = 1/n`).
///
/// Written as `prev + α·(x − prev)` so that a constant input stays exactly constant.
pub(crate) fn smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut iter = values.iter().copied();
    let Some(mut prev) = iter.next() else {
        return out;
    };
    out.push(prev);
    for value in iter {
        prev += alpha * (value - prev);
        out.push(prev);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(ema(&[], 12).is_empty());
    }

    #[test]
    fn first_value_seeds_the_average() {
        for period in [1, 5, 12, 26, 200] {
            let out = ema(&[42.5, 40.0, 41.0], period);
            assert_eq!(out[0], 42.5);
        }
    }

    #[test]
    fn constant_series_stays_constant() {
        let closes = vec![101.37; 500];
        for period in [2, 12, 26, 50, 200] {
            assert!(ema(&closes, period).iter().all(|&v| v == 101.37));
        }
    }

    #[test]
    fn matches_textbook_recursion() {
        let closes = [22.27, 22.19, 22.08, 22.17, 22.18, 22.13, 22.23, 22.43, 22.24, 22.29];
        let alpha = 2.0 / 11.0;
        let out = ema(&closes, 10);

        let mut expected = closes[0];
        for (i, &c) in closes.iter().enumerate().skip(1) {
            expected = alpha * c + (1.0 - alpha) * expected;
            assert!((out[i] - expected).abs() < 1e-12, "index {i}");
        }
    }

    #[test]
    fn period_one_tracks_input() {
        let closes = [3.0, 7.0, 5.0];
        assert_eq!(ema(&closes, 1), closes.to_vec());
    }
}
