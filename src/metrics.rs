use serde::Serialize;

/// Risk-aversion exponent of the spectral measure's weighting function
/// `phi(p) = gamma * exp(gamma * p) / (exp(gamma) - 1)`.
const SPECTRAL_GAMMA: f64 = 5.0;

/// Exponential-utility coefficient of the entropic measure, per euro of loss.
/// Small enough that `gamma * L` stays in a useful range for portfolio-scale
/// losses; the log-sum-exp evaluation is stable for any magnitude regardless.
const ENTROPIC_GAMMA: f64 = 1e-5;

/// Empirical quantile ladder of a loss sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Percentiles {
    pub p01: f64,
    pub p05: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Full risk-statistics summary of a per-path loss sample.
///
/// Produced once per sample by `compute_risk_metrics`; the ascending sorted
/// sample is retained for diagnostics and exact re-quantiling but is not
/// serialised.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RiskMetrics {
    pub n: usize,
    pub expected_loss: f64,
    pub std_dev: f64,
    pub percentiles: Percentiles,
    pub var: f64,
    pub cvar: f64,
    pub unexpected_loss: f64,
    pub skewness: f64,
    pub excess_kurtosis: f64,
    pub spectral: f64,
    pub entropic: f64,
    /// True when the entropic measure overflowed and CVaR was substituted.
    pub entropic_fallback: bool,
    #[serde(skip)]
    pub sorted: Vec<f64>,
}

/// Linear-interpolated empirical quantile of an ascending-sorted sample.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let h = p * (n - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Spectral measure: exponential risk-aversion weights over the empirical
/// quantile function, discretised at the n equal-probability midpoints and
/// renormalised to sum to one.
fn spectral_measure(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    let norm = SPECTRAL_GAMMA.exp() - 1.0;
    let mut weight_sum = 0.0;
    let mut acc = 0.0;
    for (i, &loss) in sorted.iter().enumerate() {
        let p = (i as f64 + 0.5) / n as f64;
        let w = SPECTRAL_GAMMA * (SPECTRAL_GAMMA * p).exp() / norm;
        weight_sum += w;
        acc += w * loss;
    }
    acc / weight_sum
}

/// Entropic measure `(1/gamma) * ln E[exp(gamma * L)]` via log-sum-exp.
/// Returns `None` if the result is not finite.
fn entropic_measure(losses: &[f64]) -> Option<f64> {
    let n = losses.len() as f64;
    let m = losses.iter().fold(f64::NEG_INFINITY, |a, &l| a.max(ENTROPIC_GAMMA * l));
    let sum: f64 = losses.iter().map(|&l| (ENTROPIC_GAMMA * l - m).exp()).sum();
    let value = (m + (sum / n).ln()) / ENTROPIC_GAMMA;
    value.is_finite().then_some(value)
}

/// Turn a 1-D array of per-path loss realisations into a complete
/// `RiskMetrics` at confidence level `confidence`.
///
/// VaR is the empirical quantile at index `floor(confidence * n)` of the
/// ascending sort, clipped to the last index; CVaR is the mean of the sample
/// at or beyond that index. Empty input returns all zeros; a single-element
/// sample degenerates to VaR = CVaR = EL = the value with UL = 0.
pub fn compute_risk_metrics(losses: &[f64], confidence: f64) -> RiskMetrics {
    let n = losses.len();
    if n == 0 {
        return RiskMetrics::default();
    }

    let mut sorted = losses.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let expected_loss = losses.iter().sum::<f64>() / n as f64;
    let std_dev = if n > 1 {
        let var =
            losses.iter().map(|l| (l - expected_loss).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt()
    } else {
        0.0
    };

    let idx = ((confidence * n as f64).floor() as usize).min(n - 1);
    let var = sorted[idx];
    let tail = &sorted[idx..];
    let cvar = tail.iter().sum::<f64>() / tail.len() as f64;
    let unexpected_loss = (cvar - expected_loss).max(0.0);

    let (skewness, excess_kurtosis) = if std_dev > 1e-12 {
        let mut m3 = 0.0;
        let mut m4 = 0.0;
        for l in losses {
            let z = (l - expected_loss) / std_dev;
            m3 += z.powi(3);
            m4 += z.powi(4);
        }
        (m3 / n as f64, m4 / n as f64 - 3.0)
    } else {
        (0.0, 0.0)
    };

    let percentiles = Percentiles {
        p01: quantile(&sorted, 0.01),
        p05: quantile(&sorted, 0.05),
        p25: quantile(&sorted, 0.25),
        p50: quantile(&sorted, 0.50),
        p75: quantile(&sorted, 0.75),
        p95: quantile(&sorted, 0.95),
        p99: quantile(&sorted, 0.99),
    };

    let spectral = spectral_measure(&sorted);
    let (entropic, entropic_fallback) = match entropic_measure(losses) {
        Some(v) => (v, false),
        None => (cvar, true),
    };

    RiskMetrics {
        n,
        expected_loss,
        std_dev,
        percentiles,
        var,
        cvar,
        unexpected_loss,
        skewness,
        excess_kurtosis,
        spectral,
        entropic,
        entropic_fallback,
        sorted,
    }
}
