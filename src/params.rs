use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// GARCH(1,1) conditional-variance calibration for the price diffusion.
///
/// `v_t = omega + alpha * shock_{t-1}^2 + beta * v_{t-1}`, started at the
/// long-run variance `omega / (1 - alpha - beta)`. Covariance stationarity
/// requires `alpha + beta < 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GarchParams {
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl GarchParams {
    pub fn long_run_variance(&self) -> f64 {
        self.omega / (1.0 - self.alpha - self.beta)
    }

    fn validate(&self) -> Result<(), ParameterError> {
        if self.omega <= 0.0 {
            return Err(ParameterError::GarchOmegaNonPositive(self.omega));
        }
        if self.alpha < 0.0 || self.beta < 0.0 {
            return Err(ParameterError::GarchCoefficientNegative {
                alpha: self.alpha,
                beta: self.beta,
            });
        }
        if self.alpha + self.beta >= 1.0 {
            return Err(ParameterError::GarchNonStationary {
                alpha: self.alpha,
                beta: self.beta,
            });
        }
        Ok(())
    }
}

/// Full stochastic calibration for one simulation run. Created once, never
/// mutated during the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Mean-reversion speed kappa of the spot process (per hour).
    pub kappa: f64,
    /// Static diffusion volatility sigma_S (€/MWh per sqrt-hour). Ignored for
    /// the conditional part when `garch` is set; the seasonal shaping applies
    /// either way.
    pub sigma_price: f64,
    /// Optional GARCH(1,1) conditional variance replacing the static sigma.
    #[serde(default)]
    pub garch: Option<GarchParams>,
    /// Jump intensity lambda: per-hour arrival probability.
    pub jump_intensity: f64,
    /// Jump size standard deviation sigma_J (€/MWh).
    pub jump_size: f64,
    /// AR(1) persistence phi of the volume forecast error.
    pub phi: f64,
    /// Stationary volume-error standard deviation sigma_V (fraction of load).
    pub vol_error: f64,
    /// Instantaneous price-volume correlation rho in [-1, 1].
    pub correlation: f64,
    /// Number of Monte Carlo paths N.
    pub paths: usize,
    /// Confidence level alpha for VaR/CVaR, in (0, 1).
    pub confidence: f64,
    /// Cost-of-capital rate r_EC charged on unexpected loss (fraction).
    pub cost_of_capital: f64,
    /// Front-year reference price level (€/MWh) the structural premium is
    /// quoted against.
    pub base_price: f64,
    /// Seed for the deterministic RNG stream family.
    pub seed: u64,
}

impl SimulationParameters {
    /// The calibration the engine ships with. Values mirror the reference
    /// parameterisation of the production tool; override per run as needed.
    pub fn canonical() -> Self {
        SimulationParameters {
            kappa: 0.10,
            sigma_price: 15.0,
            garch: None,
            jump_intensity: 0.02,
            jump_size: 80.0,
            phi: 0.95,
            vol_error: 0.08,
            correlation: 0.40,
            paths: 2_000,
            confidence: 0.95,
            cost_of_capital: 0.15,
            base_price: 80.0,
            seed: 42,
        }
    }

    /// Fail-fast range checks. Called by the simulator before the first hour;
    /// nothing is silently clipped here (the run-time safety clamps are a
    /// separate, documented mechanism).
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.paths == 0 {
            return Err(ParameterError::NonPositivePaths);
        }
        if !(self.phi > -1.0 && self.phi < 1.0) {
            return Err(ParameterError::PersistenceOutOfRange(self.phi));
        }
        if !(-1.0..=1.0).contains(&self.correlation) {
            return Err(ParameterError::CorrelationOutOfRange(self.correlation));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(ParameterError::ConfidenceOutOfRange(self.confidence));
        }
        if !(0.0..=1.0).contains(&self.jump_intensity) {
            return Err(ParameterError::JumpIntensityOutOfRange(self.jump_intensity));
        }
        for (name, value) in [
            ("kappa", self.kappa),
            ("sigma_price", self.sigma_price),
            ("jump_size", self.jump_size),
            ("vol_error", self.vol_error),
            ("cost_of_capital", self.cost_of_capital),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(ParameterError::NegativeParameter { name, value });
            }
        }
        if let Some(garch) = &self.garch {
            garch.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_parameters_are_valid() {
        assert!(SimulationParameters::canonical().validate().is_ok());
    }

    #[test]
    fn zero_paths_rejected() {
        let mut p = SimulationParameters::canonical();
        p.paths = 0;
        assert_eq!(p.validate().unwrap_err(), ParameterError::NonPositivePaths);
    }

    #[test]
    fn non_stationary_garch_rejected() {
        let mut p = SimulationParameters::canonical();
        p.garch = Some(GarchParams { omega: 1.0, alpha: 0.20, beta: 0.85 });
        assert_eq!(
            p.validate().unwrap_err(),
            ParameterError::GarchNonStationary { alpha: 0.20, beta: 0.85 }
        );
    }

    #[test]
    fn stationary_garch_accepted() {
        let mut p = SimulationParameters::canonical();
        p.garch = Some(GarchParams { omega: 2.0, alpha: 0.10, beta: 0.85 });
        assert!(p.validate().is_ok());
        assert!((p.garch.unwrap().long_run_variance() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn persistence_at_or_above_one_rejected() {
        for phi in [1.0, 1.5] {
            let mut p = SimulationParameters::canonical();
            p.phi = phi;
            assert_eq!(p.validate().unwrap_err(), ParameterError::PersistenceOutOfRange(phi));
        }
    }

    #[test]
    fn correlation_outside_unit_interval_rejected() {
        let mut p = SimulationParameters::canonical();
        p.correlation = 1.2;
        assert_eq!(p.validate().unwrap_err(), ParameterError::CorrelationOutOfRange(1.2));
    }

    #[test]
    fn negative_volatility_names_parameter() {
        let mut p = SimulationParameters::canonical();
        p.sigma_price = -1.0;
        assert_eq!(
            p.validate().unwrap_err(),
            ParameterError::NegativeParameter { name: "sigma_price", value: -1.0 }
        );
    }

    #[test]
    fn parameters_round_trip_through_json() {
        let mut p = SimulationParameters::canonical();
        p.garch = Some(GarchParams { omega: 2.0, alpha: 0.1, beta: 0.8 });
        let json = serde_json::to_string(&p).unwrap();
        let back: SimulationParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
