//! Monte Carlo risk-premium engine for multi-year retail energy delivery
//! portfolios.
//!
//! The engine prices the risk surcharge a supplier must add on top of the
//! wholesale reference price to carry the joint uncertainty of spot prices
//! (mean-reverting jump-diffusion, optionally GARCH-conditioned) and volume
//! forecast errors (persistent AR(1)), correlated through a single
//! Cholesky-factored innovation pair. Per-path, per-year losses are condensed
//! into CVaR-based economic-capital premiums, complemented by deterministic
//! stress scenarios and approximate parameter sensitivities.

pub mod dataset;
pub mod error;
pub mod metrics;
pub mod params;
pub mod premium;
pub mod sensitivity;
pub mod simulate;
pub mod stress;

pub use dataset::{HourlyRecord, PortfolioDataset};
pub use error::{DatasetError, EngineError, ParameterError};
pub use metrics::{RiskMetrics, compute_risk_metrics};
pub use params::{GarchParams, SimulationParameters};
pub use premium::{PortfolioResult, YearResult, price_portfolio};
pub use sensitivity::{SensitivityRow, compute_sensitivities};
pub use simulate::{LossAccumulator, RunHooks, simulate, simulate_with};
pub use stress::{StressPreset, StressResult, StressScenario, evaluate_stress, rank_scenarios};
