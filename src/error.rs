use thiserror::Error;

/// Rejected calibration. Raised by `SimulationParameters::validate` before any
/// path is started; the offending parameter is named in the message.
#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("paths must be positive")]
    NonPositivePaths,
    #[error("GARCH omega must be positive, got {0}")]
    GarchOmegaNonPositive(f64),
    #[error("GARCH alpha and beta must be non-negative, got alpha={alpha}, beta={beta}")]
    GarchCoefficientNegative { alpha: f64, beta: f64 },
    #[error("GARCH is non-stationary: alpha ({alpha}) + beta ({beta}) must sum below 1")]
    GarchNonStationary { alpha: f64, beta: f64 },
    #[error("AR(1) persistence phi must lie in (-1, 1), got {0}")]
    PersistenceOutOfRange(f64),
    #[error("price-volume correlation rho must lie in [-1, 1], got {0}")]
    CorrelationOutOfRange(f64),
    #[error("confidence level must lie in (0, 1), got {0}")]
    ConfidenceOutOfRange(f64),
    #[error("jump intensity is a per-hour probability and must lie in [0, 1], got {0}")]
    JumpIntensityOutOfRange(f64),
    #[error("{name} must be non-negative, got {value}")]
    NegativeParameter { name: &'static str, value: f64 },
}

/// Rejected portfolio input. Raised by `PortfolioDataset::from_records`.
#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("dataset contains no hourly records")]
    Empty,
    #[error("timestamps must be strictly increasing hour by hour (record {index})")]
    NonMonotonicTimestamp { index: usize },
    #[error("negative load {load} MWh at record {index}")]
    NegativeLoad { index: usize, load: f64 },
}

/// Simulation-run failure. Numerical edge cases inside the run are absorbed by
/// the documented safety clamps and never surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error("simulation cancelled; no partial result is available")]
    Cancelled,
    #[error("cannot allocate {bytes} bytes of loss accumulators ({paths} paths x {years} years)")]
    OutOfMemory {
        bytes: usize,
        paths: usize,
        years: usize,
    },
}
