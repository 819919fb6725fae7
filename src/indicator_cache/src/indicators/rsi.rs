use serde::{Deserialize, Serialize};

/// How average gains and losses are formed.
///
/// The two variants give different numbers on the same input and are kept
/// separate on purpose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiMethod {
    /// Recursive smoothing with `α = 1/n`, seeded with the first delta.
    /// Defined from index 1.
    #[default]
    Wilder,
    /// Arithmetic mean of exactly the trailing `n` deltas.
    /// Defined from index `n`.
    Simple,
}

impl std::fmt::Display for RsiMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wilder => f.write_str("wilder"),
            Self::Simple => f.write_str("simple"),
        }
    }
}

/// Relative Strength Index over `closes`, one value per input.
///
/// `None` marks positions where the chosen method has not seen enough deltas.
/// When the average loss is zero the value is 100. Values are within `[0, 100]`.
pub fn rsi(closes: &[f64], period: u32, method: RsiMethod) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if closes.len() < 2 {
        return out;
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|w| {
            let delta = w[1] - w[0];
            (delta.max(0.0), (-delta).max(0.0))
        })
        .unzip();

    match method {
        RsiMethod::Wilder => {
            let alpha = 1.0 / f64::from(period.max(1));
            let avg_gain = super::ema::smooth(&gains, alpha);
            let avg_loss = super::ema::smooth(&losses, alpha);
            for (i, (g, l)) in avg_gain.into_iter().zip(avg_loss).enumerate() {
                out[i + 1] = Some(rsi_from_averages(g, l));
            }
        }
        RsiMethod::Simple => {
            let n = period.max(1) as usize;
            // delta j sits at close index j + 1; the first full window ends at delta n - 1
            for end in n..=gains.len() {
                let window = end - n..end;
                let g = gains[window.clone()].iter().sum::<f64>() / n as f64;
                let l = losses[window].iter().sum::<f64>() / n as f64;
                out[end] = Some(rsi_from_averages(g, l));
            }
        }
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}
