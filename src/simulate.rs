use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::dataset::PortfolioDataset;
use crate::error::EngineError;
use crate::params::{GarchParams, SimulationParameters};

/// Calendar-month multiplier on the diffusion volatility (index 0 = January).
/// Winter hours carry wider price swings than summer hours.
const SEASONAL_VOL: [f64; 12] =
    [1.25, 1.20, 1.10, 1.00, 0.90, 0.80, 0.80, 0.85, 0.90, 1.00, 1.15, 1.25];

/// Hour-of-day multiplier on the imbalance penalty spread (index = hour).
/// Peak hours settle at a worse spread than night hours.
const PEAK_PENALTY: [f64; 24] = [
    0.75, 0.75, 0.75, 0.75, 0.75, 0.85, // 00-05
    1.00, 1.10, 1.35, 1.35, 1.35, 1.35, // 06-11
    1.35, 1.35, 1.35, 1.35, 1.35, 1.40, // 12-17
    1.40, 1.35, 1.00, 1.00, 0.85, 0.75, // 18-23
];

/// Fixed floor of the imbalance penalty (€/MWh).
const PENALTY_FLOOR: f64 = 5.0;
/// Scale of the half-normal imbalance penalty spread (€/MWh).
const PENALTY_SPREAD: f64 = 15.0;

/// Numerical safety band for the simulated spot price (€/MWh). This bounds
/// floating-point blow-up on extreme jump sequences; it is not a market
/// constraint.
const SPOT_CLIP_MIN: f64 = -100.0;
const SPOT_CLIP_MAX: f64 = 1500.0;

/// Numerical safety band for the GARCH conditional variance ((€/MWh)² per
/// hour). Same caveat as the spot clip: stability, not economics.
const GARCH_VAR_FLOOR: f64 = 1e-6;
const GARCH_VAR_CAP: f64 = 4.0e4;

/// Diagnostic trajectory sampling stays bounded no matter how large the run:
/// at most this many paths over at most one delivery year of hours.
const DIAG_MAX_PATHS: usize = 50;
const DIAG_MAX_HOURS: usize = 8_760;

/// Optional run instrumentation. Progress receives the completed fraction of
/// simulated hours in [0, 1] (coarse, throttled; 1.0 is always delivered on
/// success) and must not influence the numerical result. Cancellation is
/// polled at hour boundaries; a cancelled run yields no partial result.
#[derive(Default, Clone, Copy)]
pub struct RunHooks<'a> {
    pub progress: Option<&'a (dyn Fn(f64) + Sync)>,
    pub cancel: Option<&'a AtomicBool>,
}

/// Spot trajectories of the first few paths, for plotting and diagnostics.
/// Row-major `paths x hours`.
#[derive(Debug, Clone, Default)]
pub struct PathDiagnostics {
    pub paths: usize,
    pub hours: usize,
    pub spot: Vec<f64>,
}

impl PathDiagnostics {
    pub fn path(&self, p: usize) -> &[f64] {
        &self.spot[p * self.hours..(p + 1) * self.hours]
    }
}

/// Per-path, per-year losses of one completed run. Row-major `paths x years`
/// matrices, owned exclusively by the run that filled them and immutable once
/// returned.
#[derive(Debug, Clone)]
pub struct LossAccumulator {
    pub paths: usize,
    pub years: usize,
    /// Imbalance-settlement losses; non-negative by construction.
    pub imbalance: Vec<f64>,
    /// Volume-price losses; either sign.
    pub volume_price: Vec<f64>,
    pub diagnostics: PathDiagnostics,
}

impl LossAccumulator {
    /// Imbalance losses of delivery year `y`, one entry per path.
    pub fn imbalance_year(&self, y: usize) -> Vec<f64> {
        (0..self.paths).map(|p| self.imbalance[p * self.years + y]).collect()
    }

    /// Volume-price losses of delivery year `y`, one entry per path.
    pub fn volume_price_year(&self, y: usize) -> Vec<f64> {
        (0..self.paths).map(|p| self.volume_price[p * self.years + y]).collect()
    }

    /// Whole-horizon imbalance loss per path (sum over years).
    pub fn imbalance_totals(&self) -> Vec<f64> {
        self.imbalance.chunks(self.years).map(|row| row.iter().sum()).collect()
    }

    /// Whole-horizon volume-price loss per path (sum over years).
    pub fn volume_price_totals(&self) -> Vec<f64> {
        self.volume_price.chunks(self.years).map(|row| row.iter().sum()).collect()
    }
}

/// GARCH(1,1) conditional-variance state of a single path.
struct GarchState {
    params: GarchParams,
    variance: f64,
}

impl GarchState {
    fn new(params: GarchParams) -> Self {
        let variance = params.long_run_variance().clamp(GARCH_VAR_FLOOR, GARCH_VAR_CAP);
        GarchState { params, variance }
    }

    fn sigma(&self) -> f64 {
        self.variance.sqrt()
    }

    /// Advance `v_{t+1} = omega + alpha * shock² + beta * v_t` with this
    /// hour's realised diffusion shock, clamped to the safety band.
    fn update(&mut self, shock: f64) {
        self.variance = (self.params.omega
            + self.params.alpha * shock * shock
            + self.params.beta * self.variance)
            .clamp(GARCH_VAR_FLOOR, GARCH_VAR_CAP);
    }
}

struct PathOutput {
    imbalance: Vec<f64>,
    volume_price: Vec<f64>,
    spot_sample: Option<Vec<f64>>,
}

/// Run one path over the whole horizon. The hour axis is strictly sequential
/// (spot and volume error each depend on their previous value); paths are
/// independent and carry their own seeded RNG stream, so the caller may run
/// them in any order or in parallel without changing the result.
fn run_path(
    path: usize,
    data: &PortfolioDataset,
    params: &SimulationParameters,
    cancel: Option<&AtomicBool>,
) -> Result<PathOutput, EngineError> {
    let hours = data.n_hours();
    let years = data.n_years();

    let mut rng = ChaCha20Rng::seed_from_u64(params.seed.wrapping_add(path as u64));
    let rho_comp = (1.0 - params.correlation * params.correlation).max(1e-12).sqrt();
    let phi_comp = (1.0 - params.phi * params.phi).max(1e-12).sqrt();

    let mut spot = data.forward[0];
    let mut eps = 0.0_f64;
    let mut garch = params.garch.map(GarchState::new);

    let mut imbalance = vec![0.0; years];
    let mut volume_price = vec![0.0; years];
    let mut spot_sample = (path < DIAG_MAX_PATHS)
        .then(|| Vec::with_capacity(hours.min(DIAG_MAX_HOURS)));

    for t in 0..hours {
        if let Some(flag) = cancel
            && flag.load(Ordering::Relaxed)
        {
            return Err(EngineError::Cancelled);
        }

        // Every draw happens every hour, arrival or not, so the stream
        // assignment per path/hour is fixed.
        let z1: f64 = rng.sample(StandardNormal);
        let z2: f64 = rng.sample(StandardNormal);
        let jump_u: f64 = rng.random();
        let z_jump: f64 = rng.sample(StandardNormal);
        let z_pen: f64 = rng.sample(StandardNormal);

        let dw_price = z1;
        let dw_volume = params.correlation * z1 + rho_comp * z2;

        let sigma_cond = match &garch {
            Some(g) => g.sigma(),
            None => params.sigma_price,
        };
        let vol_eff = sigma_cond * SEASONAL_VOL[data.month0[t]];
        if let Some(g) = garch.as_mut() {
            g.update(sigma_cond * z1);
        }

        let jump = if jump_u < params.jump_intensity { z_jump * params.jump_size } else { 0.0 };

        spot += params.kappa * (data.forward[t] - spot) + vol_eff * dw_price + jump;
        spot = spot.clamp(SPOT_CLIP_MIN, SPOT_CLIP_MAX);

        eps = params.phi * eps + phi_comp * params.vol_error * dw_volume;
        let actual = (data.load[t] * (1.0 + eps)).max(0.0);
        let dq = actual - data.load[t];

        let penalty = PENALTY_FLOOR + z_pen.abs() * PENALTY_SPREAD * PEAK_PENALTY[data.hour[t]];
        let y = data.year_index[t];
        imbalance[y] += dq.abs() * penalty;
        volume_price[y] += dq * (spot - data.forward[t]);

        if let Some(sample) = spot_sample.as_mut()
            && t < DIAG_MAX_HOURS
        {
            sample.push(spot);
        }
    }

    Ok(PathOutput { imbalance, volume_price, spot_sample })
}

/// Simulate N correlated price/volume-error paths over the whole horizon and
/// return the per-path, per-year loss matrices.
///
/// Fully reproducible: the same seed, parameters and dataset produce
/// bit-identical loss arrays regardless of thread count.
pub fn simulate(
    data: &PortfolioDataset,
    params: &SimulationParameters,
) -> Result<LossAccumulator, EngineError> {
    simulate_with(data, params, RunHooks::default())
}

/// `simulate` with progress reporting and cooperative cancellation.
pub fn simulate_with(
    data: &PortfolioDataset,
    params: &SimulationParameters,
    hooks: RunHooks<'_>,
) -> Result<LossAccumulator, EngineError> {
    params.validate()?;

    let paths = params.paths;
    let years = data.n_years();
    let hours = data.n_hours();

    // Reserve the full N x Y working set up front; an unsatisfiable request
    // aborts the run before the first path starts.
    let cells = paths.saturating_mul(years);
    let mut imbalance: Vec<f64> = Vec::new();
    let mut volume_price: Vec<f64> = Vec::new();
    let oom = |_| EngineError::OutOfMemory {
        bytes: 2 * cells * std::mem::size_of::<f64>(),
        paths,
        years,
    };
    imbalance.try_reserve_exact(cells).map_err(oom)?;
    volume_price.try_reserve_exact(cells).map_err(oom)?;

    tracing::debug!(paths, hours, years, seed = params.seed, "starting Monte Carlo run");

    let done = AtomicUsize::new(0);
    let step = (paths / 64).max(1);

    let outputs: Vec<PathOutput> = (0..paths)
        .into_par_iter()
        .map(|path| {
            let out = run_path(path, data, params, hooks.cancel)?;
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(progress) = hooks.progress
                && finished % step == 0
                && finished < paths
            {
                progress(finished as f64 / paths as f64);
            }
            Ok(out)
        })
        .collect::<Result<_, EngineError>>()?;

    for out in &outputs {
        imbalance.extend_from_slice(&out.imbalance);
        volume_price.extend_from_slice(&out.volume_price);
    }

    let diag_paths = paths.min(DIAG_MAX_PATHS);
    let diag_hours = hours.min(DIAG_MAX_HOURS);
    let mut spot = Vec::with_capacity(diag_paths * diag_hours);
    for out in outputs.iter().take(diag_paths) {
        if let Some(sample) = &out.spot_sample {
            spot.extend_from_slice(sample);
        }
    }

    if let Some(progress) = hooks.progress {
        progress(1.0);
    }
    tracing::debug!(paths, "Monte Carlo run complete");

    Ok(LossAccumulator {
        paths,
        years,
        imbalance,
        volume_price,
        diagnostics: PathDiagnostics { paths: diag_paths, hours: diag_hours, spot },
    })
}
