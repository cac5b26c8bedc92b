//! `recover` binary: recovers a compile-unit partition of a stripped
//! binary's exported program graph.
//!
//! Reads configuration either from argv (the default) or, when
//! `RECOVER_HEADLESS=1`, from `RECOVER_*` environment variables, for
//! scripted test harnesses that can't easily build an argv. See
//! [`config::Config`].

mod config;
mod error;

use std::process;
use std::time::Instant;

use clap::Parser;
use serde::Serialize;

use recover_core::CuMap;
use recover_estimators::{AgglNse, AgglPse, ApsNse, ApsPse, Estimator};
use recover_optimize::{run_convergence_loop, BruteForce, BruteForceFast, Genetic, PairOptimizer};

use config::{Config, EstimatorKind, FitnessKind, OptimizerKind};
use error::CliError;

fn main() {
    let config = if Config::is_headless() {
        Config::from_env()
    } else {
        Ok(Config::from(config::Cli::parse()))
    };

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("recover: {e}");
            process::exit(1);
        }
    };

    let max_level = if config.debug { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(max_level).init();

    let exit_code = match run(&config) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            eprintln!("recover: {e}");
            1
        }
    };

    process::exit(Config::exit_override().unwrap_or(exit_code));
}

#[derive(Serialize)]
struct RunSummary {
    estimator: &'static str,
    optimizer: &'static str,
    fitness_function: &'static str,
    segment: String,
    num_cus: usize,
    elapsed_ms: Option<u64>,
}

fn run(config: &Config) -> Result<i32, CliError> {
    let started = Instant::now();

    let data = recover_storage::load(&config.path, None)?;
    let segment = data.segment_by_name(&config.segment)?;

    let mut cu_map = match &config.load_estimation {
        Some(path) => CuMap::load(path)?,
        None => estimate(&data.pdg, config.estimator, segment)?,
    };

    optimize(&data.pdg, config.optimizer, config.fitness_function, &mut cu_map)?;

    if let Some(path) = &config.pickle {
        cu_map.save(path)?;
    }
    if let Some(path) = &config.json {
        cu_map.save(path)?;
    }

    let summary = RunSummary {
        estimator: estimator_name(config.estimator),
        optimizer: optimizer_name(config.optimizer),
        fitness_function: fitness_name(config.fitness_function),
        segment: config.segment.clone(),
        num_cus: cu_map.len(),
        elapsed_ms: config.time.then(|| started.elapsed().as_millis()),
    };
    println!("{}", serde_json::to_string_pretty(&summary).expect("RunSummary always serializes"));

    Ok(0)
}

fn estimate(
    graph: &recover_core::ProgramGraph,
    estimator: EstimatorKind,
    segment: recover_core::Selector,
) -> Result<CuMap, CliError> {
    let cu_map = match estimator {
        EstimatorKind::Agglnse => AgglNse::new(graph, segment).estimate()?,
        EstimatorKind::Agglpse => AgglPse::new(graph, segment).estimate()?,
        EstimatorKind::Apsnse => ApsNse::new(graph, segment).estimate()?,
        EstimatorKind::Apspse => ApsPse::new(graph, segment).estimate()?,
    };
    Ok(cu_map)
}

fn optimize(
    graph: &recover_core::ProgramGraph,
    optimizer: OptimizerKind,
    fitness_function: FitnessKind,
    cu_map: &mut CuMap,
) -> Result<(), CliError> {
    // The CLI surface enumerates a single fitness function; matched here (and
    // not just ignored) so a future second variant fails this match instead
    // of silently being treated as modularity.
    match fitness_function {
        FitnessKind::Modularity => {}
    }

    let mut optimizer: Box<dyn PairOptimizer + '_> = match optimizer {
        OptimizerKind::None => return Ok(()),
        OptimizerKind::BruteFast => Box::new(BruteForceFast::new(graph)),
        OptimizerKind::Brute => Box::new(BruteForce::new(graph)),
        OptimizerKind::Genetic => Box::new(Genetic::with_default_seed(graph)),
    };
    run_convergence_loop(cu_map, optimizer.as_mut())?;
    Ok(())
}

fn estimator_name(kind: EstimatorKind) -> &'static str {
    match kind {
        EstimatorKind::Agglnse => "agglnse",
        EstimatorKind::Agglpse => "agglpse",
        EstimatorKind::Apsnse => "apsnse",
        EstimatorKind::Apspse => "apspse",
    }
}

fn optimizer_name(kind: OptimizerKind) -> &'static str {
    match kind {
        OptimizerKind::None => "none",
        OptimizerKind::BruteFast => "brute_fast",
        OptimizerKind::Brute => "brute",
        OptimizerKind::Genetic => "genetic",
    }
}

fn fitness_name(kind: FitnessKind) -> &'static str {
    match kind {
        FitnessKind::Modularity => "modularity",
    }
}
