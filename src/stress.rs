use serde::Serialize;

use crate::dataset::PortfolioDataset;

/// Elevated imbalance settlement price assumed while a stress lasts (€/MWh).
const STRESS_PENALTY: f64 = 60.0;

/// A named deterministic shock applied to the portfolio without any random
/// sampling: analytic and instantaneous by design, trading simulation
/// fidelity for speed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressScenario {
    pub name: String,
    /// Spot-vs-forward displacement while the stress lasts (€/MWh).
    pub price_shock: f64,
    /// Load deviation as a fraction of forecast (signed).
    pub volume_shock: f64,
    /// Stress duration in hours.
    pub duration_hours: f64,
    /// Fraction of the structural position assumed hedged.
    pub hedge_ratio: f64,
}

/// Deterministic P&L impact of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct StressResult {
    pub scenario: StressScenario,
    /// Open-volume times price displacement over the stress window (€).
    pub volume_price_loss: f64,
    /// Always-adverse settlement cost of the volume deviation (€).
    pub imbalance_loss: f64,
    /// Unhedged repricing of the structural position (€).
    pub structural_impact: f64,
    pub total: f64,
    pub per_mwh: f64,
}

/// Ready-made scenarios covering the shocks a retail supplier is commonly
/// asked to quantify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StressPreset {
    /// Two-week cold spell: demand and spot surge together.
    ColdSnap,
    /// Short extreme spot excursion at mildly elevated offtake.
    PriceSpike,
    /// Sustained demand collapse with falling prices.
    DemandCollapse,
    /// A mild winter quarter eroding volume and price.
    MildWinter,
    /// Brief negative-price spell with surplus volume.
    NegativePriceSpell,
    /// Moderate rally hitting a fully unhedged book.
    HedgeGapSqueeze,
}

impl StressPreset {
    pub fn all() -> Vec<Self> {
        vec![
            Self::ColdSnap,
            Self::PriceSpike,
            Self::DemandCollapse,
            Self::MildWinter,
            Self::NegativePriceSpell,
            Self::HedgeGapSqueeze,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ColdSnap => "Cold snap (2 weeks)",
            Self::PriceSpike => "Price spike (3 days)",
            Self::DemandCollapse => "Demand collapse (1 month)",
            Self::MildWinter => "Mild winter (quarter)",
            Self::NegativePriceSpell => "Negative-price spell",
            Self::HedgeGapSqueeze => "Hedge-gap squeeze",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ColdSnap => "Spot +350 €/MWh, load +20 % for 336 h, book 30 % hedged",
            Self::PriceSpike => "Spot +500 €/MWh, load +5 % for 72 h, book 50 % hedged",
            Self::DemandCollapse => "Spot -120 €/MWh, load -30 % for 720 h, book 70 % hedged",
            Self::MildWinter => "Spot -40 €/MWh, load -15 % for 2160 h, book 60 % hedged",
            Self::NegativePriceSpell => "Spot -180 €/MWh, load -10 % for 48 h, book 20 % hedged",
            Self::HedgeGapSqueeze => "Spot +200 €/MWh, load +10 % for 168 h, unhedged",
        }
    }

    pub fn scenario(&self) -> StressScenario {
        let (price_shock, volume_shock, duration_hours, hedge_ratio) = match self {
            Self::ColdSnap => (350.0, 0.20, 336.0, 0.3),
            Self::PriceSpike => (500.0, 0.05, 72.0, 0.5),
            Self::DemandCollapse => (-120.0, -0.30, 720.0, 0.7),
            Self::MildWinter => (-40.0, -0.15, 2_160.0, 0.6),
            Self::NegativePriceSpell => (-180.0, -0.10, 48.0, 0.2),
            Self::HedgeGapSqueeze => (200.0, 0.10, 168.0, 0.0),
        };
        StressScenario {
            name: self.name().to_string(),
            price_shock,
            volume_shock,
            duration_hours,
            hedge_ratio,
        }
    }
}

/// Closed-form P&L impact of one scenario on the portfolio. Exactly
/// reproducible; independent of every other scenario.
pub fn evaluate_stress(data: &PortfolioDataset, scenario: &StressScenario) -> StressResult {
    let horizon_hours = data.n_hours() as f64;
    let avg_load = data.avg_load();
    let total_volume = data.total_volume();

    let volume_price_loss =
        avg_load * scenario.volume_shock * scenario.price_shock * scenario.duration_hours;
    let imbalance_loss =
        (avg_load * scenario.volume_shock).abs() * STRESS_PENALTY * scenario.duration_hours;
    let structural_impact = scenario.price_shock
        * total_volume
        * (scenario.duration_hours / horizon_hours)
        * (1.0 - scenario.hedge_ratio);

    let total = volume_price_loss + imbalance_loss + structural_impact;
    let per_mwh = if total_volume > 0.0 { total / total_volume } else { 0.0 };

    StressResult {
        scenario: scenario.clone(),
        volume_price_loss,
        imbalance_loss,
        structural_impact,
        total,
        per_mwh,
    }
}

/// Evaluate a set of scenarios and rank them by absolute total impact,
/// worst first.
pub fn rank_scenarios(data: &PortfolioDataset, scenarios: &[StressScenario]) -> Vec<StressResult> {
    let mut results: Vec<StressResult> =
        scenarios.iter().map(|s| evaluate_stress(data, s)).collect();
    results.sort_by(|a, b| {
        b.total.abs().partial_cmp(&a.total.abs()).unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}
