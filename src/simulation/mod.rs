pub mod result;
pub mod sweep;

use log::{debug, info};

use crate::config::Config;
use crate::dosing::DosingRegimen;
use crate::engine::{elimination_rates, evaluate, resolve, DerivedParameters};
use crate::error::{PbpkError, PbpkResult};
use crate::parameters::ParameterSet;
use crate::solver::{Integrator, OdeSystem, SolverOptions};

pub use result::*;
pub use sweep::*;

/// The PBPK state extended with one cumulative amount per elimination route,
/// so the integrator carries the elimination ledger alongside the body.
struct LedgerSystem<'a> {
    derived: &'a DerivedParameters,
    compartments: usize,
    routes: usize,
}

impl<'a> LedgerSystem<'a> {
    fn new(derived: &'a DerivedParameters) -> Self {
        Self {
            derived,
            compartments: derived.layout().len(),
            routes: derived.elimination_routes().len(),
        }
    }
}

impl OdeSystem for LedgerSystem<'_> {
    fn ndim(&self) -> usize {
        self.compartments + self.routes
    }

    fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) -> PbpkResult<()> {
        let (body, ledger) = y.split_at(self.compartments);
        let (body_rates, ledger_rates) = dydt.split_at_mut(self.compartments);
        evaluate(self.derived, body, body_rates)?;
        if !ledger.is_empty() {
            ledger_rates.copy_from_slice(&elimination_rates(self.derived, body)?);
        }
        Ok(())
    }
}

/// One configured run: resolved physiology, dosing and output grid.
pub struct Simulator {
    derived: DerivedParameters,
    regimen: DosingRegimen,
    time_points: Vec<f64>,
    options: SolverOptions,
}

impl Simulator {
    pub fn new(config: &Config) -> PbpkResult<Self> {
        config.validate()?;
        Self::with_parameters(config, &config.parameter_set())
    }

    /// Build the run in `config` on an explicit parameter set.
    pub fn with_parameters(config: &Config, set: &ParameterSet) -> PbpkResult<Self> {
        let variant = config.model.variant;
        let params = variant.physiology(set)?;
        let derived = resolve(&params)?;
        let regimen = DosingRegimen::from_config(&config.dosing, variant)?;
        let time_points = config.simulation.time_points.clone();
        if let Some(&end) = time_points.last() {
            regimen.check_horizon(end);
        }

        Ok(Self {
            derived,
            regimen,
            time_points,
            options: config.simulation.solver_options(),
        })
    }

    pub fn derived(&self) -> &DerivedParameters {
        &self.derived
    }

    /// Integrate from t = 0 through every time point, applying each dose as
    /// an instantaneous change of state. A dose at a time point is applied
    /// before that point is sampled.
    pub fn run(&self) -> PbpkResult<SimulationResult> {
        let derived = &self.derived;
        let system = LedgerSystem::new(derived);
        let n = system.compartments;

        info!(
            "Simulating {} model: {} mg in {} dose(s), {} time points",
            derived.variant,
            self.regimen.total(),
            self.regimen.events().len(),
            self.time_points.len()
        );

        let mut integrator = Integrator::new(&system, self.options.clone())?;
        let mut y = vec![0.0; system.ndim()];
        let mut t = 0.0;
        let mut doses = self.regimen.events().iter().peekable();
        let mut samples = Vec::with_capacity(self.time_points.len());

        for &time in &self.time_points {
            while let Some(dose) = doses.next_if(|dose| dose.time <= time) {
                integrator.advance(&mut y, t, dose.time)?;
                t = dose.time;

                let compartment = dose.route.compartment();
                let index = derived.topology.index_of(compartment).ok_or_else(|| {
                    PbpkError::Configuration(format!("Cannot dose into {}", compartment))
                })?;
                y[index] += dose.amount;
                debug!("t = {} h: {} mg into {}", t, dose.amount, compartment);
            }

            integrator.advance(&mut y, t, time)?;
            t = time;

            samples.push(Sample {
                time,
                dosed: self.regimen.dosed_by(time),
                amounts: y[..n].to_vec(),
                eliminated: y[n..].to_vec(),
            });
        }

        let stats = integrator.stats();
        debug!(
            "{} steps accepted, {} rejected, {} derivative evaluations",
            stats.accepted, stats.rejected, stats.evaluations
        );

        let result = SimulationResult {
            variant: derived.variant,
            compartments: derived.layout().to_vec(),
            volumes: derived
                .layout()
                .iter()
                .map(|&c| derived.volume_of(c).unwrap_or(f64::NAN))
                .collect(),
            blood_plasma_ratio: derived.blood_plasma_ratio,
            routes: derived.elimination_routes(),
            samples,
            stats,
        };

        if let Some(last) = result.samples.last() {
            info!(
                "Finished at t = {} h: {:.6} mg in body, {:.6} mg eliminated, residual {:.3e} mg",
                last.time,
                last.total_amount(),
                last.total_eliminated(),
                last.mass_balance_residual()
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DosingRoute, SimulationConfig};
    use crate::engine::EliminationRoute;
    use crate::models::{Compartment, ModelVariant};
    use crate::solver::IntegrationMethod;
    use approx::assert_relative_eq;

    fn short_run(variant: ModelVariant, time_points: Vec<f64>) -> Config {
        let mut config = Config::reference(variant);
        config.simulation.time_points = time_points;
        config
    }

    #[test]
    fn test_dose_at_sample_time_is_visible() {
        let config = short_run(ModelVariant::Simple, vec![0.0, 0.5]);
        let result = Simulator::new(&config).unwrap().run().unwrap();
        let first = &result.samples[0];
        assert_eq!(first.time, 0.0);
        assert_eq!(first.dosed, 100.0);
        assert_eq!(result.amount(0, Compartment::Venous), Some(100.0));
        assert_eq!(first.total_amount(), 100.0);
    }

    #[test]
    fn test_sample_before_first_dose_is_empty() {
        let mut config = short_run(ModelVariant::Simple, vec![0.0, 1.0, 2.0]);
        config.dosing.times = vec![1.5];
        let result = Simulator::new(&config).unwrap().run().unwrap();
        assert_eq!(result.samples[1].dosed, 0.0);
        assert_eq!(result.samples[1].total_amount(), 0.0);
        assert_eq!(result.samples[2].dosed, 100.0);
        assert_relative_eq!(result.samples[2].total_amount(), 100.0, max_relative = 1e-9);
    }

    #[test]
    fn test_ledger_closes_mass_balance() {
        let config = short_run(ModelVariant::Hepatic, vec![0.0, 1.0, 4.0]);
        let result = Simulator::new(&config).unwrap().run().unwrap();
        assert_eq!(result.routes, vec![EliminationRoute::Hepatic]);
        for sample in &result.samples {
            assert!(sample.mass_balance_residual().abs() < 1e-6);
        }
        assert!(result.samples[2].total_eliminated() > 0.0);
    }

    #[test]
    fn test_repeated_doses_accumulate() {
        let mut config = short_run(ModelVariant::Simple, vec![0.0, 6.0, 12.0]);
        config.dosing.times = vec![0.0, 6.0];
        let result = Simulator::new(&config).unwrap().run().unwrap();
        assert_eq!(result.samples[1].dosed, 200.0);
        assert_relative_eq!(result.samples[2].total_amount(), 200.0, max_relative = 1e-9);
    }

    #[test]
    fn test_fixed_step_matches_adaptive() {
        let adaptive = short_run(ModelVariant::WholeBody, vec![0.0, 1.0, 2.0]);
        let mut fixed = adaptive.clone();
        fixed.simulation = SimulationConfig {
            integration_method: IntegrationMethod::Rk4,
            step_size: Some(5e-4),
            ..adaptive.simulation.clone()
        };

        let a = Simulator::new(&adaptive).unwrap().run().unwrap();
        let b = Simulator::new(&fixed).unwrap().run().unwrap();
        for (x, y) in a.samples[2].amounts.iter().zip(&b.samples[2].amounts) {
            assert_relative_eq!(*x, *y, epsilon = 1e-4, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_resolution_errors_are_fatal() {
        let mut config = Config::reference(ModelVariant::Simple);
        config.model.parameters.set("WEIGHT", 10.0);
        assert!(matches!(
            Simulator::new(&config),
            Err(PbpkError::Parameter(_))
        ));

        let mut config = Config::reference(ModelVariant::Simple);
        config.dosing.route = DosingRoute::Oral;
        assert!(matches!(
            Simulator::new(&config),
            Err(PbpkError::Configuration(_))
        ));
    }
}
