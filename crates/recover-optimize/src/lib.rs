//! Compile-unit map optimizers.
//!
//! An optimizer repeatedly examines adjacent compile-unit pairs, via
//! [`PairOptimizer`], and commits improved local layouts until
//! [`run_convergence_loop`] reaches a fixed point. Three strategies are
//! implemented: exhaustive ([`BruteForce`]), stratified ([`BruteForceFast`])
//! and genetic ([`Genetic`]), all scored by a shared
//! [`recover_fitness::FitnessFunction`].

mod brute_force;
mod brute_force_fast;
mod error;
mod genetic;
mod optimizer;

pub use brute_force::BruteForce;
pub use brute_force_fast::BruteForceFast;
pub use error::OptimizeError;
pub use genetic::{Genetic, DEFAULT_SEED};
pub use optimizer::{commit_state, run_convergence_loop, PairOptimizer};
