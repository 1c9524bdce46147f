//! Physiologically-based pharmacokinetic (PBPK) mass-balance simulation.
//!
//! Three model variants share one engine: a six-compartment model without
//! elimination, the same model with hepatic clearance, and a fourteen
//! compartment whole-body model with oral absorption, first-pass
//! metabolism and renal clearance.
//!
//! ```no_run
//! use pbpk_simulation::{Config, ModelVariant, Simulator};
//!
//! let config = Config::reference(ModelVariant::WholeBody);
//! let result = Simulator::new(&config)?.run()?;
//! println!("{} mg left at 24 h", result.final_sample().unwrap().total_amount());
//! # Ok::<(), pbpk_simulation::PbpkError>(())
//! ```

pub mod config;
pub mod dosing;
pub mod engine;
pub mod error;
pub mod models;
pub mod output;
pub mod parameters;
pub mod simulation;
pub mod solver;

pub use config::Config;
pub use engine::{derivative, resolve, CompartmentState, DerivedParameters};
pub use error::{PbpkError, PbpkResult};
pub use models::{Compartment, ModelVariant};
pub use output::Matrix;
pub use parameters::{ParameterSet, PhysiologicalParameters};
pub use simulation::{simulate_sweep, SimulationResult, Simulator};
pub use solver::{integrate, IntegrationMethod, SolverOptions};
