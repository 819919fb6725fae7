use super::ema::ema;

/// MACD line, its signal line and the histogram, aligned with the input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Macd {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// `macd = EMA(fast) − EMA(slow)`, `signal = EMA(macd, signal)`,
/// `histogram = macd − signal`.
pub fn macd(closes: &[f64], fast: u32, slow: u32, signal: u32) -> Macd {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let macd: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&macd, signal);
    let histogram = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();
    Macd {
        macd,
        signal,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<f64> {
        (0..120)
            .map(|i| 100.0 + (i as f64 * 0.35).sin() * 8.0 + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn histogram_is_exactly_macd_minus_signal() {
        let out = macd(&sample(), 12, 26, 9);
        assert_eq!(out.macd.len(), 120);
        for i in 0..out.macd.len() {
            assert_eq!(out.histogram[i], out.macd[i] - out.signal[i]);
        }
    }

    #[test]
    fn starts_at_zero() {
        let out = macd(&sample(), 12, 26, 9);
        assert_eq!(out.macd[0], 0.0);
        assert_eq!(out.signal[0], 0.0);
        assert_eq!(out.histogram[0], 0.0);
    }

    #[test]
    fn constant_prices_have_flat_macd() {
        let out = macd(&[250.0; 60], 12, 26, 9);
        assert!(out.macd.iter().all(|&v| v == 0.0));
        assert!(out.histogram.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn empty_input() {
        assert_eq!(macd(&[], 12, 26, 9), Macd::default());
    }
}
