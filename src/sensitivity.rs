use serde::Serialize;

use crate::metrics::compute_risk_metrics;
use crate::params::SimulationParameters;
use crate::premium::{PortfolioResult, premium_per_mwh};

/// First-order sensitivity of the total premium to one calibration
/// parameter, from a fixed ±Δ perturbation.
///
/// Rows with `exact = false` come from hand-derived scaling heuristics on the
/// priced result, not from re-simulation; treat them as directional, not
/// authoritative. Rows with `exact = true` are recomputed from the retained
/// loss samples and are exact given the simulated distribution.
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityRow {
    pub parameter: &'static str,
    pub base: f64,
    /// Half-width of the applied perturbation after boundary clamping.
    pub delta: f64,
    pub premium_up: f64,
    pub premium_down: f64,
    /// Central difference (premium_up - premium_down) / (2 * delta).
    pub gradient: f64,
    pub exact: bool,
}

#[derive(Clone, Copy)]
enum Calibration {
    VolError,
    Persistence,
    MeanReversion,
    PriceDiffusion,
    JumpIntensity,
    JumpSize,
    Correlation,
    CostOfCapital,
    Confidence,
}

impl Calibration {
    const ALL: [Calibration; 9] = [
        Calibration::VolError,
        Calibration::Persistence,
        Calibration::MeanReversion,
        Calibration::PriceDiffusion,
        Calibration::JumpIntensity,
        Calibration::JumpSize,
        Calibration::Correlation,
        Calibration::CostOfCapital,
        Calibration::Confidence,
    ];

    fn name(self) -> &'static str {
        match self {
            Calibration::VolError => "vol_error",
            Calibration::Persistence => "phi",
            Calibration::MeanReversion => "kappa",
            Calibration::PriceDiffusion => "sigma_price",
            Calibration::JumpIntensity => "jump_intensity",
            Calibration::JumpSize => "jump_size",
            Calibration::Correlation => "correlation",
            Calibration::CostOfCapital => "cost_of_capital",
            Calibration::Confidence => "confidence",
        }
    }

    fn base(self, params: &SimulationParameters) -> f64 {
        match self {
            Calibration::VolError => params.vol_error,
            Calibration::Persistence => params.phi,
            Calibration::MeanReversion => params.kappa,
            Calibration::PriceDiffusion => params.sigma_price,
            Calibration::JumpIntensity => params.jump_intensity,
            Calibration::JumpSize => params.jump_size,
            Calibration::Correlation => params.correlation,
            Calibration::CostOfCapital => params.cost_of_capital,
            Calibration::Confidence => params.confidence,
        }
    }

    fn raw_delta(self) -> f64 {
        match self {
            Calibration::VolError => 0.01,
            Calibration::Persistence => 0.02,
            Calibration::MeanReversion => 0.02,
            Calibration::PriceDiffusion => 2.0,
            Calibration::JumpIntensity => 0.005,
            Calibration::JumpSize => 10.0,
            Calibration::Correlation => 0.05,
            Calibration::CostOfCapital => 0.01,
            Calibration::Confidence => 0.01,
        }
    }

    /// Domain the perturbed value is clamped into.
    fn bounds(self) -> (f64, f64) {
        match self {
            Calibration::VolError
            | Calibration::MeanReversion
            | Calibration::PriceDiffusion
            | Calibration::JumpSize
            | Calibration::CostOfCapital => (0.0, f64::INFINITY),
            Calibration::Persistence => (-0.999, 0.999),
            Calibration::JumpIntensity => (0.0, 1.0),
            Calibration::Correlation => (-1.0, 1.0),
            Calibration::Confidence => (0.01, 0.999),
        }
    }

    fn is_exact(self) -> bool {
        matches!(self, Calibration::CostOfCapital | Calibration::Confidence)
    }
}

/// Per-hour price-shock variance: diffusion plus compound-jump contribution.
fn price_shock_variance(sigma_price: f64, jump_intensity: f64, jump_size: f64) -> f64 {
    sigma_price * sigma_price + jump_intensity * jump_size * jump_size
}

/// Approximate (or, for capital/confidence, exact) total premium with one
/// calibration parameter moved to `theta`, everything else held at `params`.
fn premium_at(
    kind: Calibration,
    theta: f64,
    params: &SimulationParameters,
    result: &PortfolioResult,
) -> f64 {
    let structural = result.structural_premium;
    let pp = result.forecast_risk_premium;
    let vpp = result.volume_price_premium;

    // Scale factors for the two risk components; 1.0 means unaffected.
    let (f_forecast, f_volume_price) = match kind {
        Calibration::VolError => {
            // Both loss legs are linear in the volume-error magnitude.
            let f = if params.vol_error > 0.0 { theta / params.vol_error } else { 1.0 };
            (f, f)
        }
        Calibration::Persistence => {
            // Ratio of effective AR(1) variances 1 / (1 - phi²).
            let f = (1.0 - params.phi * params.phi) / (1.0 - theta * theta);
            (f, f)
        }
        Calibration::MeanReversion => {
            // Faster reversion shrinks dispersion like sqrt(kappa_old / kappa_new).
            let f = if params.kappa > 0.0 && theta > 0.0 {
                (params.kappa / theta).sqrt()
            } else {
                1.0
            };
            (f, f)
        }
        Calibration::PriceDiffusion => {
            let base = price_shock_variance(params.sigma_price, params.jump_intensity, params.jump_size);
            let bumped = price_shock_variance(theta, params.jump_intensity, params.jump_size);
            let f = if base > 0.0 { (bumped / base).sqrt() } else { 1.0 };
            (1.0, f)
        }
        Calibration::JumpIntensity => {
            let base = price_shock_variance(params.sigma_price, params.jump_intensity, params.jump_size);
            let bumped = price_shock_variance(params.sigma_price, theta, params.jump_size);
            let f = if base > 0.0 { (bumped / base).sqrt() } else { 1.0 };
            (1.0, f)
        }
        Calibration::JumpSize => {
            let base = price_shock_variance(params.sigma_price, params.jump_intensity, params.jump_size);
            let bumped = price_shock_variance(params.sigma_price, params.jump_intensity, theta);
            let f = if base > 0.0 { (bumped / base).sqrt() } else { 1.0 };
            (1.0, f)
        }
        Calibration::Correlation => {
            let denom = 1.0 + params.correlation;
            let f = if denom > 1e-6 { (1.0 + theta) / denom } else { 1.0 };
            (1.0, f)
        }
        Calibration::CostOfCapital => {
            // Exact: re-price the retained portfolio metrics at the new rate.
            let volume = result.volume_mwh;
            return structural
                + premium_per_mwh(&result.imbalance, theta, volume)
                + premium_per_mwh(&result.volume_price, theta, volume);
        }
        Calibration::Confidence => {
            // Exact: re-quantile the retained sorted samples at the new level.
            let volume = result.volume_mwh;
            let im = compute_risk_metrics(&result.imbalance.sorted, theta);
            let vm = compute_risk_metrics(&result.volume_price.sorted, theta);
            return structural
                + premium_per_mwh(&im, params.cost_of_capital, volume)
                + premium_per_mwh(&vm, params.cost_of_capital, volume);
        }
    };

    structural + pp * f_forecast + vpp * f_volume_price
}

/// Approximate first-order premium sensitivities for every calibration
/// parameter. Never re-runs the Monte Carlo engine: heuristic scaling of the
/// priced result, except the capital-rate and confidence rows which are
/// recomputed exactly from the retained loss distribution.
pub fn compute_sensitivities(
    params: &SimulationParameters,
    result: &PortfolioResult,
) -> Vec<SensitivityRow> {
    Calibration::ALL
        .iter()
        .map(|&kind| {
            let base = kind.base(params);
            let (lo, hi) = kind.bounds();
            let up = (base + kind.raw_delta()).clamp(lo, hi);
            let down = (base - kind.raw_delta()).clamp(lo, hi);
            let premium_up = premium_at(kind, up, params, result);
            let premium_down = premium_at(kind, down, params, result);
            let half_width = (up - down) / 2.0;
            let gradient = if half_width > 0.0 {
                (premium_up - premium_down) / (2.0 * half_width)
            } else {
                0.0
            };
            SensitivityRow {
                parameter: kind.name(),
                base,
                delta: half_width,
                premium_up,
                premium_down,
                gradient,
                exact: kind.is_exact(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, TimeDelta};

    use super::*;
    use crate::dataset::{HourlyRecord, PortfolioDataset};
    use crate::premium::price_portfolio;
    use crate::simulate::simulate;

    fn priced_fixture() -> (SimulationParameters, PortfolioResult) {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let records = (0..24 * 21)
            .map(|i| HourlyRecord {
                timestamp: start + TimeDelta::hours(i as i64),
                load_mwh: 1.2,
                forward_price: 80.0,
                temperature: None,
            })
            .collect();
        let data = PortfolioDataset::from_records(records).unwrap();
        let mut params = SimulationParameters::canonical();
        params.paths = 64;
        let acc = simulate(&data, &params).unwrap();
        let result = price_portfolio(&data, &params, &acc);
        (params, result)
    }

    #[test]
    fn every_calibration_parameter_gets_a_row() {
        let (params, result) = priced_fixture();
        let rows = compute_sensitivities(&params, &result);
        assert_eq!(rows.len(), 9);
        let mut names: Vec<&str> = rows.iter().map(|r| r.parameter).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 9, "parameter names must be unique");
        assert!(rows.iter().all(|r| r.gradient.is_finite()));
        assert!(rows.iter().all(|r| r.premium_up.is_finite() && r.premium_down.is_finite()));
    }

    #[test]
    fn gradient_is_the_central_difference_of_the_row() {
        let (params, result) = priced_fixture();
        for row in compute_sensitivities(&params, &result) {
            if row.delta > 0.0 {
                assert_relative_eq!(
                    row.gradient,
                    (row.premium_up - row.premium_down) / (2.0 * row.delta),
                    max_relative = 1e-12
                );
            }
        }
    }

    #[test]
    fn more_volume_error_means_more_premium() {
        let (params, result) = priced_fixture();
        let rows = compute_sensitivities(&params, &result);
        let row = rows.iter().find(|r| r.parameter == "vol_error").unwrap();
        assert!(!row.exact);
        assert!(
            row.premium_up > row.premium_down,
            "sigma_V up must not lower the premium: {} vs {}",
            row.premium_up,
            row.premium_down
        );
    }

    #[test]
    fn faster_mean_reversion_lowers_the_premium() {
        let (params, result) = priced_fixture();
        let rows = compute_sensitivities(&params, &result);
        let row = rows.iter().find(|r| r.parameter == "kappa").unwrap();
        assert!(row.premium_up <= row.premium_down);
    }

    #[test]
    fn cost_of_capital_row_is_exact() {
        let (params, result) = priced_fixture();
        let rows = compute_sensitivities(&params, &result);
        let row = rows.iter().find(|r| r.parameter == "cost_of_capital").unwrap();
        assert!(row.exact);

        let r_up = params.cost_of_capital + 0.01;
        let expected_up = result.structural_premium
            + (result.imbalance.expected_loss + r_up * result.imbalance.unexpected_loss)
                / result.volume_mwh
            + (result.volume_price.expected_loss + r_up * result.volume_price.unexpected_loss)
                / result.volume_mwh;
        assert_relative_eq!(row.premium_up, expected_up, max_relative = 1e-12);
    }

    #[test]
    fn higher_confidence_does_not_lower_the_premium() {
        let (params, result) = priced_fixture();
        let rows = compute_sensitivities(&params, &result);
        let row = rows.iter().find(|r| r.parameter == "confidence").unwrap();
        assert!(row.exact);
        assert!(row.premium_up >= row.premium_down - 1e-12);
    }

    #[test]
    fn perturbations_respect_parameter_domains() {
        let mut params = SimulationParameters::canonical();
        params.jump_intensity = 0.0; // lower bound: downward bump must clamp
        params.correlation = 1.0; // upper bound
        let (_, result) = priced_fixture();
        let rows = compute_sensitivities(&params, &result);
        let jump = rows.iter().find(|r| r.parameter == "jump_intensity").unwrap();
        assert!(jump.premium_down.is_finite());
        assert!(jump.delta >= 0.0);
        let rho = rows.iter().find(|r| r.parameter == "correlation").unwrap();
        assert!(rho.premium_up.is_finite());
        assert!(rho.delta <= 0.05 + 1e-12);
    }
}
