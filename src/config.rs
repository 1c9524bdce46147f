use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PbpkError, PbpkResult};
use crate::models::{Compartment, ModelVariant};
use crate::parameters::ParameterSet;
use crate::solver::{IntegrationMethod, SolverOptions};

/// A complete run description, as loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub dosing: DosingConfig,
    pub simulation: SimulationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub variant: ModelVariant,
    /// Start from the variant's reference parameter set and apply
    /// `parameters` as overrides.
    #[serde(default)]
    pub reference: bool,
    #[serde(default)]
    pub parameters: ParameterSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DosingConfig {
    pub route: DosingRoute,
    pub amount: f64, // mg per dose
    pub times: Vec<f64>,
    /// Blood pool receiving an IV bolus; venous when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Compartment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DosingRoute {
    Oral,
    IvBolus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub time_points: Vec<f64>,
    #[serde(default = "default_integration_method")]
    pub integration_method: IntegrationMethod,
    /// Relative tolerance (RK45).
    pub tolerance: Option<f64>,
    /// Fixed step (RK4) or first trial step (RK45), hours.
    pub step_size: Option<f64>,
    pub max_steps: Option<usize>,
}

fn default_integration_method() -> IntegrationMethod {
    IntegrationMethod::Rk45
}

/// Repeat the run once per value of a single parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub parameter: String,
    pub values: Vec<f64>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> PbpkResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reference run of a variant: 100 mg IV bolus into the venous pool, or
    /// 200 mg orally where the variant has a gut depot, sampled hourly to 24 h.
    pub fn reference(variant: ModelVariant) -> Self {
        let (route, amount) = if variant.has_depot() {
            (DosingRoute::Oral, 200.0)
        } else {
            (DosingRoute::IvBolus, 100.0)
        };
        Self {
            model: ModelConfig {
                variant,
                reference: true,
                parameters: ParameterSet::new(),
            },
            dosing: DosingConfig {
                route,
                amount,
                times: vec![0.0],
                target: None,
            },
            simulation: SimulationConfig {
                time_points: (0..=24).map(f64::from).collect(),
                integration_method: IntegrationMethod::Rk45,
                tolerance: None,
                step_size: None,
                max_steps: None,
            },
            sweep: None,
        }
    }

    /// Parameter set the model is built from.
    pub fn parameter_set(&self) -> ParameterSet {
        if self.model.reference {
            let mut set = self.model.variant.reference_parameters();
            set.merge(&self.model.parameters);
            set
        } else {
            self.model.parameters.clone()
        }
    }

    pub fn validate(&self) -> PbpkResult<()> {
        self.validate_dosing()?;
        self.validate_simulation()?;

        if let Some(sweep) = &self.sweep {
            let variant = self.model.variant;
            if !variant.parameter_names().contains(&sweep.parameter.as_str()) {
                return Err(PbpkError::Configuration(format!(
                    "Cannot sweep {}: not a parameter of the {} model",
                    sweep.parameter, variant
                )));
            }
            if sweep.values.is_empty() {
                return Err(PbpkError::Configuration(
                    "Sweep needs at least one value".to_string(),
                ));
            }
            if sweep.values.iter().any(|v| !v.is_finite()) {
                return Err(PbpkError::Configuration(format!(
                    "Sweep values for {} must be finite",
                    sweep.parameter
                )));
            }
        }

        Ok(())
    }

    fn validate_dosing(&self) -> PbpkResult<()> {
        let dosing = &self.dosing;
        if !dosing.amount.is_finite() || dosing.amount <= 0.0 {
            return Err(PbpkError::Configuration(
                "Dose amount must be positive".to_string(),
            ));
        }

        if dosing.times.is_empty() {
            return Err(PbpkError::Configuration(
                "At least one dosing time must be specified".to_string(),
            ));
        }
        if dosing.times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(PbpkError::Configuration(
                "Dosing times must be finite and non-negative".to_string(),
            ));
        }

        match dosing.route {
            DosingRoute::Oral => {
                if !self.model.variant.has_depot() {
                    return Err(PbpkError::Configuration(format!(
                        "The {} model has no gut depot for oral dosing",
                        self.model.variant
                    )));
                }
                if dosing.target.is_some() {
                    return Err(PbpkError::Configuration(
                        "Oral doses always enter the gut depot; remove the target".to_string(),
                    ));
                }
            }
            DosingRoute::IvBolus => {
                if let Some(target) = dosing.target {
                    if !target.is_blood_pool() {
                        return Err(PbpkError::Configuration(format!(
                            "IV bolus target must be ART or VEN, got {}",
                            target
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    fn validate_simulation(&self) -> PbpkResult<()> {
        let simulation = &self.simulation;
        if simulation.time_points.is_empty() {
            return Err(PbpkError::Configuration(
                "At least one time point must be specified".to_string(),
            ));
        }
        if simulation.time_points.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(PbpkError::Configuration(
                "Time points must be finite and non-negative".to_string(),
            ));
        }
        if simulation.time_points.windows(2).any(|w| w[1] <= w[0]) {
            return Err(PbpkError::Configuration(
                "Time points must be strictly increasing".to_string(),
            ));
        }

        simulation.solver_options().validate()
    }
}

impl SimulationConfig {
    pub fn solver_options(&self) -> SolverOptions {
        let defaults = SolverOptions::default();
        SolverOptions {
            method: self.integration_method,
            rtol: self.tolerance.unwrap_or(defaults.rtol),
            step_size: self.step_size.unwrap_or(defaults.step_size),
            max_steps: self.max_steps.unwrap_or(defaults.max_steps),
            ..defaults
        }
    }
}
