use serde::Serialize;

use crate::dataset::PortfolioDataset;
use crate::metrics::{RiskMetrics, compute_risk_metrics};
use crate::params::SimulationParameters;
use crate::simulate::LossAccumulator;

/// Premium decomposition of a single delivery year, all €/MWh.
#[derive(Debug, Clone, Serialize)]
pub struct YearResult {
    /// Calendar year.
    pub year: i32,
    pub volume_mwh: f64,
    /// Volume-weighted forward price minus the front-year base price.
    pub structural_premium: f64,
    /// Imbalance-settlement risk: (EL + r_EC · UL) / volume.
    pub forecast_risk_premium: f64,
    /// Two-sided volume-price risk: (EL + r_EC · UL) / volume.
    pub volume_price_premium: f64,
    pub total_premium: f64,
    pub imbalance: RiskMetrics,
    pub volume_price: RiskMetrics,
}

/// Year-level and pooled premium figures for one completed run. Replaced
/// wholesale by the next run; never updated incrementally.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioResult {
    pub years: Vec<YearResult>,
    pub volume_mwh: f64,
    pub structural_premium: f64,
    pub forecast_risk_premium: f64,
    pub volume_price_premium: f64,
    pub total_premium: f64,
    /// Volume-weighted standalone risk premiums minus the pooled risk
    /// premium; zero for a single delivery year.
    pub diversification_benefit: f64,
    pub imbalance: RiskMetrics,
    pub volume_price: RiskMetrics,
    pub confidence: f64,
    pub cost_of_capital: f64,
}

/// CVaR-economic-capital premium: expected loss plus the capital charge on
/// unexpected loss, per delivered MWh. Zero-volume samples price at zero.
pub(crate) fn premium_per_mwh(metrics: &RiskMetrics, cost_of_capital: f64, volume: f64) -> f64 {
    if volume > 0.0 {
        (metrics.expected_loss + cost_of_capital * metrics.unexpected_loss) / volume
    } else {
        0.0
    }
}

/// Combine the per-path, per-year loss matrices into year-level and pooled
/// premium figures.
pub fn price_portfolio(
    data: &PortfolioDataset,
    params: &SimulationParameters,
    acc: &LossAccumulator,
) -> PortfolioResult {
    let r = params.cost_of_capital;

    let mut years = Vec::with_capacity(data.n_years());
    for (y, &calendar_year) in data.years.iter().enumerate() {
        let volume = data.volume_by_year[y];
        let structural = if volume > 0.0 {
            data.cost_by_year[y] / volume - params.base_price
        } else {
            0.0
        };
        let imbalance = compute_risk_metrics(&acc.imbalance_year(y), params.confidence);
        let volume_price = compute_risk_metrics(&acc.volume_price_year(y), params.confidence);
        let forecast_risk_premium = premium_per_mwh(&imbalance, r, volume);
        let volume_price_premium = premium_per_mwh(&volume_price, r, volume);
        years.push(YearResult {
            year: calendar_year,
            volume_mwh: volume,
            structural_premium: structural,
            forecast_risk_premium,
            volume_price_premium,
            total_premium: structural + forecast_risk_premium + volume_price_premium,
            imbalance,
            volume_price,
        });
    }

    let total_volume = data.total_volume();
    let structural = if total_volume > 0.0 {
        data.cost_by_year.iter().sum::<f64>() / total_volume - params.base_price
    } else {
        0.0
    };
    let imbalance = compute_risk_metrics(&acc.imbalance_totals(), params.confidence);
    let volume_price = compute_risk_metrics(&acc.volume_price_totals(), params.confidence);
    let forecast_risk_premium = premium_per_mwh(&imbalance, r, total_volume);
    let volume_price_premium = premium_per_mwh(&volume_price, r, total_volume);

    // Pooling across years cannot be compared to itself for a single year.
    let diversification_benefit = if data.n_years() > 1 && total_volume > 0.0 {
        let standalone: f64 = years
            .iter()
            .map(|yr| (yr.forecast_risk_premium + yr.volume_price_premium) * yr.volume_mwh)
            .sum::<f64>()
            / total_volume;
        standalone - (forecast_risk_premium + volume_price_premium)
    } else {
        0.0
    };

    PortfolioResult {
        years,
        volume_mwh: total_volume,
        structural_premium: structural,
        forecast_risk_premium,
        volume_price_premium,
        total_premium: structural + forecast_risk_premium + volume_price_premium,
        diversification_benefit,
        imbalance,
        volume_price,
        confidence: params.confidence,
        cost_of_capital: params.cost_of_capital,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, TimeDelta};

    use super::*;
    use crate::dataset::HourlyRecord;
    use crate::simulate::{PathDiagnostics, simulate};

    fn flat_dataset(start_year: i32, hours: usize, load: f64, price: f64) -> PortfolioDataset {
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let records = (0..hours)
            .map(|i| HourlyRecord {
                timestamp: start + TimeDelta::hours(i as i64),
                load_mwh: load,
                forward_price: price,
                temperature: None,
            })
            .collect();
        PortfolioDataset::from_records(records).unwrap()
    }

    // ── Premium formula ───────────────────────────────────────────────────────

    #[test]
    fn year_premium_matches_closed_form() {
        // 2 hours, load 1 MWh -> volume 2 MWh; price == base -> structural 0.
        let data = flat_dataset(2026, 2, 1.0, 80.0);
        let mut params = SimulationParameters::canonical();
        params.paths = 2;
        params.confidence = 0.5;
        params.cost_of_capital = 0.15;

        let acc = LossAccumulator {
            paths: 2,
            years: 1,
            imbalance: vec![10.0, 30.0],
            volume_price: vec![-5.0, 5.0],
            diagnostics: PathDiagnostics::default(),
        };
        let result = price_portfolio(&data, &params, &acc);

        // Imbalance: EL 20, VaR = CVaR = 30, UL 10 -> (20 + 0.15·10) / 2.
        assert_relative_eq!(result.years[0].forecast_risk_premium, 10.75);
        // Volume-price: EL 0, CVaR 5, UL 5 -> (0 + 0.15·5) / 2.
        assert_relative_eq!(result.years[0].volume_price_premium, 0.375);
        assert_relative_eq!(result.years[0].structural_premium, 0.0);
        assert_relative_eq!(result.years[0].total_premium, 11.125);
        assert_relative_eq!(result.total_premium, 11.125);
    }

    #[test]
    fn structural_premium_is_forward_minus_base() {
        let data = flat_dataset(2026, 4, 2.0, 92.5);
        let mut params = SimulationParameters::canonical();
        params.paths = 1;
        params.base_price = 80.0;
        let acc = LossAccumulator {
            paths: 1,
            years: 1,
            imbalance: vec![0.0],
            volume_price: vec![0.0],
            diagnostics: PathDiagnostics::default(),
        };
        let result = price_portfolio(&data, &params, &acc);
        assert_relative_eq!(result.years[0].structural_premium, 12.5);
    }

    // ── Degenerate inputs ─────────────────────────────────────────────────────

    #[test]
    fn single_year_has_zero_diversification_benefit() {
        let data = flat_dataset(2026, 24 * 7, 1.0, 80.0);
        let mut params = SimulationParameters::canonical();
        params.paths = 16;
        let acc = simulate(&data, &params).unwrap();
        let result = price_portfolio(&data, &params, &acc);
        assert_eq!(result.diversification_benefit, 0.0);
    }

    #[test]
    fn zero_volume_year_prices_at_zero() {
        // Year two exists in the index but carries no load.
        let start = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let records: Vec<HourlyRecord> = (0..48)
            .map(|i| HourlyRecord {
                timestamp: start + TimeDelta::hours(i as i64),
                load_mwh: if i < 24 { 1.0 } else { 0.0 },
                forward_price: 80.0,
                temperature: None,
            })
            .collect();
        let data = PortfolioDataset::from_records(records).unwrap();
        assert_eq!(data.n_years(), 2);
        assert_eq!(data.volume_by_year[1], 0.0);

        let mut params = SimulationParameters::canonical();
        params.paths = 8;
        let acc = simulate(&data, &params).unwrap();
        let result = price_portfolio(&data, &params, &acc);
        assert_eq!(result.years[1].structural_premium, 0.0);
        assert_eq!(result.years[1].forecast_risk_premium, 0.0);
        assert_eq!(result.years[1].volume_price_premium, 0.0);
    }

    #[test]
    fn single_path_degenerates_cleanly() {
        // N = 1: VaR = CVaR = EL = the single loss, UL = 0, premium = EL / V.
        let data = flat_dataset(2026, 24, 1.0, 80.0);
        let mut params = SimulationParameters::canonical();
        params.paths = 1;
        let acc = simulate(&data, &params).unwrap();
        let result = price_portfolio(&data, &params, &acc);
        let im = &result.years[0].imbalance;
        assert_eq!(im.var, im.expected_loss);
        assert_eq!(im.cvar, im.expected_loss);
        assert_eq!(im.unexpected_loss, 0.0);
        assert_relative_eq!(
            result.years[0].forecast_risk_premium,
            im.expected_loss / result.years[0].volume_mwh
        );
    }

    // ── Monotonicity & diversification ────────────────────────────────────────

    #[test]
    fn forecast_risk_premium_grows_with_vol_error() {
        let data = flat_dataset(2026, 24 * 14, 1.2, 80.0);
        let mut lo = SimulationParameters::canonical();
        lo.paths = 32;
        lo.vol_error = 0.04;
        let mut hi = lo.clone();
        hi.vol_error = 0.12;

        let pp_lo = price_portfolio(&data, &lo, &simulate(&data, &lo).unwrap());
        let pp_hi = price_portfolio(&data, &hi, &simulate(&data, &hi).unwrap());
        assert!(
            pp_hi.forecast_risk_premium > pp_lo.forecast_risk_premium,
            "premium must not decrease when sigma_V rises: {} vs {}",
            pp_hi.forecast_risk_premium,
            pp_lo.forecast_risk_premium
        );
    }

    #[test]
    fn pooling_years_mostly_diversifies() {
        // Two delivery years; the pooled CVaR premium should undershoot the
        // volume-weighted standalone premiums in nearly every seeded run.
        let start = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let records: Vec<HourlyRecord> = (0..24 * 120)
            .map(|i| HourlyRecord {
                timestamp: start + TimeDelta::hours(i as i64),
                load_mwh: 1.0,
                forward_price: 80.0,
                temperature: None,
            })
            .collect();
        let data = PortfolioDataset::from_records(records).unwrap();
        assert_eq!(data.n_years(), 2);

        let mut non_negative = 0;
        for seed in [1u64, 2, 3] {
            let mut params = SimulationParameters::canonical();
            params.paths = 64;
            params.seed = seed;
            let acc = simulate(&data, &params).unwrap();
            let result = price_portfolio(&data, &params, &acc);
            if result.diversification_benefit >= 0.0 {
                non_negative += 1;
            }
        }
        assert!(non_negative >= 2, "diversification benefit negative in {} of 3 runs", 3 - non_negative);
    }

    // ── End-to-end scenario ───────────────────────────────────────────────────

    #[test]
    fn two_month_scenario_produces_plausible_premiums() {
        let data = flat_dataset(2026, 24 * 60, 1.14, 80.0);
        let mut params = SimulationParameters::canonical();
        params.paths = 200;
        let acc = simulate(&data, &params).unwrap();
        let result = price_portfolio(&data, &params, &acc);

        assert!(result.forecast_risk_premium.is_finite());
        assert!(result.volume_price_premium.is_finite());
        assert!(result.forecast_risk_premium > 0.0);
        assert!(
            result.total_premium > 0.0 && result.total_premium < 100.0,
            "total premium {} outside plausibility band",
            result.total_premium
        );
    }

    /// Full-size reference scenario: one delivery year of 8,760 hours and
    /// 2,000 paths at the canonical calibration. Expensive; run with
    /// `cargo test -- --ignored`.
    #[test]
    #[ignore]
    fn full_year_canonical_scenario_premium_band() {
        let data = flat_dataset(2026, 8_760, 10_000.0 / 8_760.0, 80.0);
        let params = SimulationParameters::canonical();
        let acc = simulate(&data, &params).unwrap();
        let result = price_portfolio(&data, &params, &acc);

        assert!(result.forecast_risk_premium.is_finite() && result.forecast_risk_premium > 0.0);
        assert!(result.volume_price_premium.is_finite());
        assert!(
            result.total_premium > 0.0 && result.total_premium < 40.0,
            "total premium {} €/MWh outside the plausible band",
            result.total_premium
        );
    }
}
