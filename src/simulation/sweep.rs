use log::info;
use rayon::prelude::*;
use serde::Serialize;

use super::{SimulationResult, Simulator};
use crate::config::Config;
use crate::error::{PbpkError, PbpkResult};

/// One run of a parameter sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepPoint {
    pub parameter: String,
    pub value: f64,
    pub result: SimulationResult,
}

/// Run `config` once per value of `parameter`, in parallel. Every run
/// resolves its own physiology; results come back in the order of `values`.
pub fn simulate_sweep(config: &Config, parameter: &str, values: &[f64]) -> PbpkResult<Vec<SweepPoint>> {
    config.validate()?;
    let variant = config.model.variant;
    if !variant.parameter_names().contains(&parameter) {
        return Err(PbpkError::Configuration(format!(
            "Cannot sweep {}: not a parameter of the {} model",
            parameter, variant
        )));
    }

    info!("Sweeping {} over {} values", parameter, values.len());
    let base = config.parameter_set();

    values
        .par_iter()
        .map(|&value| -> PbpkResult<SweepPoint> {
            let set = base.clone().with_override(parameter, value)?;
            let result = Simulator::with_parameters(config, &set)?.run()?;
            Ok(SweepPoint {
                parameter: parameter.to_string(),
                value,
                result,
            })
        })
        .collect()
}
