use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use premia::premium::{PortfolioResult, price_portfolio};
use premia::sensitivity::{SensitivityRow, compute_sensitivities};
use premia::simulate::{RunHooks, simulate_with};
use premia::stress::{StressPreset, StressResult, rank_scenarios};
use premia::{HourlyRecord, PortfolioDataset, SimulationParameters};

/// One CSV input row: `timestamp,load_mwh,price_eur_mwh[,temperature_c]`,
/// timestamps ISO 8601 (`2026-01-01T00:00:00`).
#[derive(Debug, Deserialize)]
struct CsvRecord {
    timestamp: NaiveDateTime,
    load_mwh: f64,
    price_eur_mwh: f64,
    #[serde(default)]
    temperature_c: Option<f64>,
}

#[derive(Serialize)]
struct Report<'a> {
    result: &'a PortfolioResult,
    stress: &'a [StressResult],
    sensitivities: &'a [SensitivityRow],
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut data_path: Option<String> = None;
    let mut params_path: Option<String> = None;
    let mut seed_override: Option<u64> = None;
    let mut paths_override: Option<usize> = None;
    let mut confidence_override: Option<f64> = None;
    let mut output_path: Option<String> = None;
    let mut quiet = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data" => {
                i += 1;
                data_path = Some(args[i].clone());
            }
            "--params" => {
                i += 1;
                params_path = Some(args[i].clone());
            }
            "--seed" => {
                i += 1;
                seed_override = Some(args[i].parse().expect("--seed requires a u64"));
            }
            "--paths" => {
                i += 1;
                paths_override = Some(args[i].parse().expect("--paths requires a positive integer"));
            }
            "--confidence" => {
                i += 1;
                confidence_override =
                    Some(args[i].parse().expect("--confidence requires a float in (0, 1)"));
            }
            "--output" => {
                i += 1;
                output_path = Some(args[i].clone());
            }
            "--quiet" => quiet = true,
            "--help" | "-h" => {
                print_usage();
                return;
            }
            _ => {}
        }
        i += 1;
    }

    let Some(data_path) = data_path else {
        print_usage();
        std::process::exit(2);
    };

    let mut params = match &params_path {
        Some(path) => {
            let file = File::open(path).unwrap_or_else(|e| panic!("failed to open {path}: {e}"));
            serde_json::from_reader(file)
                .unwrap_or_else(|e| panic!("invalid parameter file {path}: {e}"))
        }
        None => SimulationParameters::canonical(),
    };
    if let Some(seed) = seed_override {
        params.seed = seed;
    }
    if let Some(paths) = paths_override {
        params.paths = paths;
    }
    if let Some(confidence) = confidence_override {
        params.confidence = confidence;
    }

    let data = load_dataset(&data_path);
    tracing::info!(
        hours = data.n_hours(),
        years = data.n_years(),
        volume_mwh = data.total_volume(),
        "dataset loaded"
    );

    // Coarse progress to the log, roughly every 10 % of simulated hours.
    let last_decile = AtomicUsize::new(0);
    let progress = |frac: f64| {
        let decile = (frac * 10.0) as usize;
        if decile > last_decile.swap(decile, Ordering::Relaxed) {
            tracing::info!("simulation {:.0} % complete", frac * 100.0);
        }
    };
    let hooks = RunHooks { progress: Some(&progress), cancel: None };

    let acc = match simulate_with(&data, &params, hooks) {
        Ok(acc) => acc,
        Err(e) => {
            eprintln!("simulation rejected: {e}");
            std::process::exit(1);
        }
    };

    let result = price_portfolio(&data, &params, &acc);
    let scenarios: Vec<_> = StressPreset::all().iter().map(|p| p.scenario()).collect();
    let stress = rank_scenarios(&data, &scenarios);
    let sensitivities = compute_sensitivities(&params, &result);

    if !quiet {
        print_premiums(&result);
        print_stress(&stress);
        print_sensitivities(&sensitivities);
    }

    if let Some(path) = output_path {
        let file = File::create(&path).unwrap_or_else(|e| panic!("failed to create {path}: {e}"));
        let writer = BufWriter::new(file);
        let report = Report { result: &result, stress: &stress, sensitivities: &sensitivities };
        serde_json::to_writer_pretty(writer, &report).expect("failed to serialize report");
        tracing::info!(path = %path, "report written");
    }
}

fn print_usage() {
    eprintln!(
        "Usage: premia --data <hourly.csv> [--params <params.json>] [--seed N] \
         [--paths N] [--confidence A] [--output <report.json>] [--quiet]\n\
         CSV columns: timestamp,load_mwh,price_eur_mwh[,temperature_c]"
    );
}

fn load_dataset(path: &str) -> PortfolioDataset {
    let mut reader =
        csv::Reader::from_path(path).unwrap_or_else(|e| panic!("failed to open {path}: {e}"));
    let records: Vec<HourlyRecord> = reader
        .deserialize::<CsvRecord>()
        .map(|row| {
            let row = row.unwrap_or_else(|e| panic!("malformed record in {path}: {e}"));
            HourlyRecord {
                timestamp: row.timestamp,
                load_mwh: row.load_mwh,
                forward_price: row.price_eur_mwh,
                temperature: row.temperature_c,
            }
        })
        .collect();
    match PortfolioDataset::from_records(records) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("dataset rejected: {e}");
            std::process::exit(1);
        }
    }
}

fn print_premiums(result: &PortfolioResult) {
    println!("\n=== Annual premium decomposition (€/MWh) ===");
    println!(
        "{:>6} | {:>12} | {:>8} | {:>9} | {:>8} | {:>8}",
        "Year", "Volume(MWh)", "Struct", "Forecast", "VP-Risk", "Total"
    );
    println!("{}", "-".repeat(66));
    for yr in &result.years {
        println!(
            "{:>6} | {:>12.0} | {:>+8.2} | {:>9.2} | {:>8.2} | {:>+8.2}",
            yr.year,
            yr.volume_mwh,
            yr.structural_premium,
            yr.forecast_risk_premium,
            yr.volume_price_premium,
            yr.total_premium,
        );
    }
    println!("{}", "-".repeat(66));
    println!(
        "{:>6} | {:>12.0} | {:>+8.2} | {:>9.2} | {:>8.2} | {:>+8.2}",
        "Total",
        result.volume_mwh,
        result.structural_premium,
        result.forecast_risk_premium,
        result.volume_price_premium,
        result.total_premium,
    );
    println!("Diversification benefit: {:.2} €/MWh", result.diversification_benefit);

    println!("\n=== Portfolio loss diagnostics (€) ===");
    println!(
        "{:>14} | {:>12} | {:>12} | {:>12} | {:>12} | {:>7} | {:>7}",
        "Loss", "E[L]", "VaR", "CVaR", "UL", "Skew", "ExKurt"
    );
    for (label, m) in [("Imbalance", &result.imbalance), ("Volume-price", &result.volume_price)] {
        println!(
            "{:>14} | {:>12.0} | {:>12.0} | {:>12.0} | {:>12.0} | {:>7.2} | {:>7.2}",
            label, m.expected_loss, m.var, m.cvar, m.unexpected_loss, m.skewness, m.excess_kurtosis,
        );
    }
}

fn print_stress(stress: &[StressResult]) {
    println!("\n=== Stress scenarios (ranked by |impact|) ===");
    println!(
        "{:>26} | {:>7} | {:>6} | {:>6} | {:>6} | {:>12} | {:>8}",
        "Scenario", "ΔP", "ΔQ%", "Hours", "Hedge", "Total(€)", "€/MWh"
    );
    for r in stress {
        println!(
            "{:>26} | {:>+7.0} | {:>+6.0} | {:>6.0} | {:>6.2} | {:>12.0} | {:>+8.2}",
            r.scenario.name,
            r.scenario.price_shock,
            r.scenario.volume_shock * 100.0,
            r.scenario.duration_hours,
            r.scenario.hedge_ratio,
            r.total,
            r.per_mwh,
        );
    }
}

fn print_sensitivities(rows: &[SensitivityRow]) {
    println!("\n=== Premium sensitivities (approximate unless marked exact) ===");
    println!(
        "{:>16} | {:>9} | {:>8} | {:>9} | {:>9} | {:>11} | {:>6}",
        "Parameter", "Base", "±Δ", "π(θ+Δ)", "π(θ-Δ)", "dπ/dθ", "Mode"
    );
    for row in rows {
        println!(
            "{:>16} | {:>9.4} | {:>8.4} | {:>9.3} | {:>9.3} | {:>11.4} | {:>6}",
            row.parameter,
            row.base,
            row.delta,
            row.premium_up,
            row.premium_down,
            row.gradient,
            if row.exact { "exact" } else { "approx" },
        );
    }
}
