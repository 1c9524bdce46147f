//! ODE integration on top of `ode_solvers`.
//!
//! The PBPK engine only provides a right-hand side; the integrators
//! advance it through time:
//!
//! - [`IntegrationMethod::Rk4`]: classic fixed-step Runge–Kutta.
//! - [`IntegrationMethod::Rk45`]: Dormand–Prince 4(5) with adaptive step
//!   size. A failed derivative evaluation (a [`PbpkError::Domain`]) fills the
//!   stage with NaN, so the error estimate rejects the trial step and the
//!   stepper retries with a smaller one.

use std::cell::RefCell;

use log::debug;
use ode_solvers::dop_shared::{IntegrationError, OutputType};
use ode_solvers::dopri5::Dopri5;
use ode_solvers::rk4::Rk4;
use ode_solvers::{DVector, System};
use serde::{Deserialize, Serialize};

use crate::engine::{evaluate, DerivedParameters};
use crate::error::{PbpkError, PbpkResult};

type State = DVector<f64>;

/// Right-hand side `dy/dt = f(t, y)` of an ODE system.
pub trait OdeSystem {
    fn ndim(&self) -> usize;

    /// Write `f(t, y)` into `dydt`; both slices have length `ndim()`.
    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]) -> PbpkResult<()>;
}

impl OdeSystem for DerivedParameters {
    fn ndim(&self) -> usize {
        self.layout().len()
    }

    fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) -> PbpkResult<()> {
        evaluate(self, y, dydt)
    }
}

/// `ode_solvers` wants an infallible right-hand side; the most recent
/// failure is parked in `failure` for the caller to inspect.
struct Rhs<'a, S: ?Sized> {
    system: &'a S,
    failure: &'a RefCell<Option<PbpkError>>,
}

impl<S: OdeSystem + ?Sized> System<f64, State> for Rhs<'_, S> {
    fn system(&self, t: f64, y: &State, dy: &mut State) {
        if let Err(e) = self.system.rhs(t, y.as_slice(), dy.as_mut_slice()) {
            dy.fill(f64::NAN);
            *self.failure.borrow_mut() = Some(e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMethod {
    Rk4,
    Rk45,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub method: IntegrationMethod,
    pub rtol: f64,
    pub atol: f64,
    /// Fixed step for RK4, first trial step for RK45 (h).
    pub step_size: f64,
    /// Steps (accepted and rejected) allowed over one integrator's lifetime.
    pub max_steps: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: IntegrationMethod::Rk45,
            rtol: 1e-6,
            atol: 1e-9,
            step_size: 1e-3,
            max_steps: 1_000_000,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> PbpkResult<()> {
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(PbpkError::Configuration("rtol must be finite and > 0".to_string()));
        }
        if !self.atol.is_finite() || self.atol <= 0.0 {
            return Err(PbpkError::Configuration("atol must be finite and > 0".to_string()));
        }
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(PbpkError::Configuration("step size must be finite and > 0".to_string()));
        }
        if self.max_steps == 0 {
            return Err(PbpkError::Configuration("max_steps must be > 0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepStats {
    pub accepted: usize,
    pub rejected: usize,
    pub evaluations: usize,
}

impl StepStats {
    fn record(&mut self, stats: ode_solvers::dop_shared::Stats) {
        self.accepted += stats.accepted_steps as usize;
        self.rejected += stats.rejected_steps as usize;
        self.evaluations += stats.num_eval as usize;
    }

    fn taken(&self) -> usize {
        self.accepted + self.rejected
    }
}

/// Advances one system interval by interval, sharing a single step budget.
pub struct Integrator<'a, S: OdeSystem + ?Sized> {
    system: &'a S,
    options: SolverOptions,
    stats: StepStats,
}

impl<'a, S: OdeSystem + ?Sized> Integrator<'a, S> {
    pub fn new(system: &'a S, options: SolverOptions) -> PbpkResult<Self> {
        options.validate()?;
        Ok(Self {
            system,
            options,
            stats: StepStats::default(),
        })
    }

    pub fn stats(&self) -> StepStats {
        self.stats
    }

    /// Move `y` from `t0` to `t1` in place.
    pub fn advance(&mut self, y: &mut [f64], t0: f64, t1: f64) -> PbpkResult<()> {
        if y.len() != self.system.ndim() {
            return Err(PbpkError::Integration(format!(
                "State has {} entries, system has {}",
                y.len(),
                self.system.ndim()
            )));
        }
        if !t0.is_finite() || !t1.is_finite() || t1 < t0 {
            return Err(PbpkError::Integration(format!(
                "Cannot integrate from {} to {}",
                t0, t1
            )));
        }
        if t1 == t0 {
            return Ok(());
        }

        let budget = self.options.max_steps.saturating_sub(self.stats.taken());
        if budget == 0 {
            return Err(PbpkError::Integration(format!(
                "Step budget of {} exhausted at t = {}",
                self.options.max_steps, t0
            )));
        }

        let failure = RefCell::new(None);
        let rhs = Rhs {
            system: self.system,
            failure: &failure,
        };
        let y0 = State::from_column_slice(y);

        let end = match self.options.method {
            IntegrationMethod::Rk4 => self.fixed_step(rhs, y0, t0, t1, budget)?,
            IntegrationMethod::Rk45 => self.adaptive(rhs, y0, t0, t1, budget)?,
        };
        y.copy_from_slice(end.as_slice());
        Ok(())
    }

    fn fixed_step(
        &mut self,
        rhs: Rhs<'_, S>,
        y0: State,
        t0: f64,
        t1: f64,
        budget: usize,
    ) -> PbpkResult<State> {
        let span = t1 - t0;
        let steps = (span / self.options.step_size).ceil().max(1.0);
        if steps > budget as f64 {
            return Err(PbpkError::Integration(format!(
                "{} RK4 steps from t = {} to {} exceed the remaining step budget of {}",
                steps, t0, t1, budget
            )));
        }
        let h = span / steps;
        let failure = rhs.failure;

        // Rk4 takes ceil((x_end - x) / h) steps; ending half a step short
        // of t1 keeps rounding from adding one.
        let mut stepper = Rk4::new(rhs, t0, y0, t1 - 0.5 * h, h);
        let stats = stepper
            .integrate()
            .map_err(|e| PbpkError::Integration(e.to_string()))?;
        self.stats.record(stats);

        if let Some(e) = failure.take() {
            return Err(e);
        }
        last_state(stepper.x_out(), stepper.y_out(), t1)
    }

    fn adaptive(
        &mut self,
        rhs: Rhs<'_, S>,
        y0: State,
        t0: f64,
        t1: f64,
        budget: usize,
    ) -> PbpkResult<State> {
        let span = t1 - t0;
        let failure = rhs.failure;
        let mut stepper = Dopri5::from_param(
            rhs,
            t0,
            t1,
            0.0,
            y0,
            self.options.rtol,
            self.options.atol,
            0.9,
            0.04,
            0.2,
            10.0,
            span,
            self.options.step_size.min(span),
            budget.min(u32::MAX as usize) as u32,
            // stiffness detection off; a stiff stretch only costs steps
            u32::MAX,
            OutputType::Sparse,
        );

        match stepper.integrate() {
            Ok(stats) => {
                self.stats.record(stats);
                if let Some(e) = failure.take() {
                    debug!("Recovered from a rejected step: {}", e);
                }
                last_state(stepper.x_out(), stepper.y_out(), t1)
            }
            Err(IntegrationError::MaxNumStepReached { .. }) => Err(PbpkError::Integration(format!(
                "Step budget of {} exhausted between t = {} and {}",
                self.options.max_steps, t0, t1
            ))),
            Err(e) => Err(PbpkError::Integration(match failure.take() {
                Some(cause) => format!("{} ({})", e, cause),
                None => e.to_string(),
            })),
        }
    }
}

/// The stepper's final output, which must sit on `t1` with a finite state.
fn last_state(times: &[f64], states: &[State], t1: f64) -> PbpkResult<State> {
    match (times.last(), states.last()) {
        (Some(&t), Some(y)) if (t - t1).abs() <= 1e-9 * t1.abs().max(1.0) => {
            if y.iter().all(|v| v.is_finite()) {
                Ok(y.clone())
            } else {
                Err(PbpkError::Integration(format!("Non-finite state at t = {}", t1)))
            }
        }
        _ => Err(PbpkError::Integration(format!(
            "Integrator stopped short of t = {}",
            t1
        ))),
    }
}

/// State at every time in `times` (non-decreasing), starting from `y0` at
/// `times[0]`.
pub fn integrate<S: OdeSystem + ?Sized>(
    system: &S,
    y0: &[f64],
    times: &[f64],
    options: &SolverOptions,
) -> PbpkResult<Vec<Vec<f64>>> {
    let Some(&start) = times.first() else {
        return Err(PbpkError::Integration("Empty time grid".to_string()));
    };
    if times.windows(2).any(|w| !(w[1] >= w[0])) {
        return Err(PbpkError::Integration(
            "Time grid must be non-decreasing".to_string(),
        ));
    }

    let mut integrator = Integrator::new(system, options.clone())?;
    let mut y = y0.to_vec();
    let mut t = start;
    let mut states = Vec::with_capacity(times.len());
    for &target in times {
        integrator.advance(&mut y, t, target)?;
        states.push(y.clone());
        t = target;
    }

    let stats = integrator.stats();
    debug!(
        "Integrated to t = {}: {} steps accepted, {} rejected, {} evaluations",
        t, stats.accepted, stats.rejected, stats.evaluations
    );
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// dy/dt = -k y, failing like a PBPK state would if y goes negative.
    struct Decay {
        k: f64,
    }

    impl OdeSystem for Decay {
        fn ndim(&self) -> usize {
            1
        }

        fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) -> PbpkResult<()> {
            if y[0] < -1e-6 {
                return Err(PbpkError::Domain(format!("negative amount {}", y[0])));
            }
            dydt[0] = -self.k * y[0];
            Ok(())
        }
    }

    /// Two pools exchanging mass: a linear invariant y0 + y1.
    struct Exchange;

    impl OdeSystem for Exchange {
        fn ndim(&self) -> usize {
            2
        }

        fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) -> PbpkResult<()> {
            let flux = 3.0 * y[0] - 0.5 * y[1];
            dydt[0] = -flux;
            dydt[1] = flux;
            Ok(())
        }
    }

    struct AlwaysFails;

    impl OdeSystem for AlwaysFails {
        fn ndim(&self) -> usize {
            1
        }

        fn rhs(&self, t: f64, _y: &[f64], _dydt: &mut [f64]) -> PbpkResult<()> {
            if t > 0.0 {
                return Err(PbpkError::Domain("unstable".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_rk45_matches_exponential_decay() {
        let times = [0.0, 0.5, 1.0, 2.0, 5.0];
        let options = SolverOptions {
            rtol: 1e-10,
            atol: 1e-12,
            ..SolverOptions::default()
        };
        let states = integrate(&Decay { k: 0.849 }, &[200.0], &times, &options).unwrap();
        for (t, y) in times.iter().zip(&states) {
            assert_relative_eq!(y[0], 200.0 * (-0.849 * t).exp(), max_relative = 1e-6);
        }
    }

    #[test]
    fn test_rk4_matches_exponential_decay() {
        let options = SolverOptions {
            method: IntegrationMethod::Rk4,
            step_size: 0.01,
            ..SolverOptions::default()
        };
        let states = integrate(&Decay { k: 1.3 }, &[1.0], &[0.0, 1.0, 3.0], &options).unwrap();
        assert_relative_eq!(states[1][0], (-1.3f64).exp(), max_relative = 1e-8);
        assert_relative_eq!(states[2][0], (-3.9f64).exp(), max_relative = 1e-8);
    }

    #[test]
    fn test_linear_invariant_is_preserved() {
        for method in [IntegrationMethod::Rk4, IntegrationMethod::Rk45] {
            let options = SolverOptions {
                method,
                ..SolverOptions::default()
            };
            let states = integrate(&Exchange, &[10.0, 0.0], &[0.0, 4.0, 24.0], &options).unwrap();
            for y in states {
                assert_relative_eq!(y[0] + y[1], 10.0, max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn test_domain_error_shrinks_step() {
        // an explicit step of 1.0 on k = 50 overshoots below zero
        let options = SolverOptions {
            step_size: 1.0,
            ..SolverOptions::default()
        };
        let states = integrate(&Decay { k: 50.0 }, &[1.0], &[0.0, 0.2], &options).unwrap();
        assert_relative_eq!(states[1][0], (-10.0f64).exp(), max_relative = 1e-3);
    }

    #[test]
    fn test_persistent_domain_error_is_integration_error() {
        let result = integrate(&AlwaysFails, &[1.0], &[0.0, 1.0], &SolverOptions::default());
        assert!(matches!(result, Err(PbpkError::Integration(_))));
    }

    #[test]
    fn test_rk4_propagates_domain_error() {
        let options = SolverOptions {
            method: IntegrationMethod::Rk4,
            step_size: 0.1,
            ..SolverOptions::default()
        };
        let result = integrate(&AlwaysFails, &[1.0], &[0.0, 1.0], &options);
        assert!(matches!(result, Err(PbpkError::Domain(_))));
    }

    #[test]
    fn test_invalid_inputs() {
        let options = SolverOptions::default();
        assert!(integrate(&Exchange, &[1.0, 0.0], &[], &options).is_err());
        assert!(integrate(&Exchange, &[1.0, 0.0], &[1.0, 0.5], &options).is_err());
        assert!(integrate(&Exchange, &[1.0], &[0.0, 1.0], &options).is_err());
        let bad = SolverOptions {
            rtol: 0.0,
            ..SolverOptions::default()
        };
        assert!(matches!(
            integrate(&Exchange, &[1.0, 0.0], &[0.0, 1.0], &bad),
            Err(PbpkError::Configuration(_))
        ));
    }

    #[test]
    fn test_step_budget_exhausted() {
        let options = SolverOptions {
            max_steps: 3,
            ..SolverOptions::default()
        };
        let result = integrate(&Decay { k: 1.0 }, &[1.0], &[0.0, 100.0], &options);
        assert!(matches!(result, Err(PbpkError::Integration(_))));
    }

    #[test]
    fn test_fixed_step_budget_checked_before_stepping() {
        let options = SolverOptions {
            method: IntegrationMethod::Rk4,
            step_size: 0.01,
            max_steps: 3,
            ..SolverOptions::default()
        };
        let result = integrate(&Decay { k: 1.0 }, &[1.0], &[0.0, 100.0], &options);
        assert!(matches!(result, Err(PbpkError::Integration(_))));

        // the budget spans every interval of one run
        let options = SolverOptions {
            max_steps: 150,
            ..options
        };
        let decay = Decay { k: 1.0 };
        let mut integrator = Integrator::new(&decay, options).unwrap();
        let mut y = [1.0];
        integrator.advance(&mut y, 0.0, 1.0).unwrap();
        assert_eq!(integrator.stats().accepted, 100);
        assert!(matches!(
            integrator.advance(&mut y, 1.0, 2.0),
            Err(PbpkError::Integration(_))
        ));
        assert_relative_eq!(y[0], (-1.0f64).exp(), max_relative = 1e-8);
    }
}
