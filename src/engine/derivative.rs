//! The ODE right-hand side.
//!
//! Every perfused organ follows the same well-stirred balance, driven by the
//! organ table in [`Topology`](super::topology::Topology):
//!
//! ```text
//! dA/dt = Q_art·C_art + Σ_upstream Q_out,j·C_eq,j − Q_out·C_eq − CL·fu·C_eq (+ Ka·D)
//! ```
//!
//! The venous pool collects every organ draining into it and empties into
//! the lung; the lung feeds the arterial pool, which supplies every organ.

use super::resolver::DerivedParameters;
use super::state::{concentration, equilibrium_concentration, CompartmentState};
use crate::error::{PbpkError, PbpkResult};
use crate::models::Compartment;
use crate::parameters::Drain;

/// Time derivative of every state; `t` is unused since flows and clearances
/// are constant over a run.
pub fn derivative(
    _t: f64,
    state: &CompartmentState,
    derived: &DerivedParameters,
) -> PbpkResult<CompartmentState> {
    if state.compartments() != derived.layout() {
        return Err(PbpkError::Domain(format!(
            "State layout {:?} does not match the {} model",
            state.compartments(),
            derived.variant
        )));
    }
    let mut rates = vec![0.0; state.amounts().len()];
    evaluate(derived, state.amounts(), &mut rates)?;
    CompartmentState::from_amounts(derived.layout(), rates)
}

/// Slice form of [`derivative`] used by the integrators.
pub fn evaluate(derived: &DerivedParameters, y: &[f64], dydt: &mut [f64]) -> PbpkResult<()> {
    let topology = &derived.topology;
    let n = topology.layout.len();
    if y.len() != n || dydt.len() != n {
        return Err(PbpkError::Domain(format!(
            "Expected {} states, got {} amounts and {} rates",
            n,
            y.len(),
            dydt.len()
        )));
    }

    let bp = derived.blood_plasma_ratio;
    let q_total = topology.cardiac_output;

    let arterial = &topology.arterial;
    let venous = &topology.venous;
    let lung = &topology.lung;
    let c_art = concentration(Compartment::Arterial, y[arterial.state_index], arterial.volume)?;
    let c_ven = concentration(Compartment::Venous, y[venous.state_index], venous.volume)?;
    let c_lung = equilibrium_concentration(
        concentration(Compartment::Lung, y[lung.state_index], lung.volume)?,
        lung.partition,
        bp,
    );

    let organ_concentrations = organ_equilibrium_concentrations(derived, y)?;

    let mut venous_inflow = 0.0;
    let mut arterial_offtake = 0.0;
    for (i, organ) in topology.organs.iter().enumerate() {
        let c_eq = organ_concentrations[i];

        let mut rate = organ.arterial_flow * c_art - organ.outflow * c_eq;
        for &j in &organ.inflows {
            rate += topology.organs[j].outflow * organ_concentrations[j];
        }
        if let Some(elimination) = &organ.elimination {
            rate -= elimination.rate(c_eq);
        }
        dydt[organ.state_index] = rate;

        arterial_offtake += organ.arterial_flow;
        if organ.drains_to == Drain::Venous {
            venous_inflow += organ.outflow * c_eq;
        }
    }

    if let Some(depot) = &topology.depot {
        let amount = y[depot.state_index];
        concentration(Compartment::Depot, amount, depot.volume)?;
        let absorption = depot.rate_constant * amount;
        dydt[depot.state_index] = -absorption;
        dydt[topology.organs[depot.target].state_index] += absorption;
    }

    dydt[venous.state_index] = venous_inflow - q_total * c_ven;
    dydt[lung.state_index] = q_total * (c_ven - c_lung);
    dydt[arterial.state_index] = q_total * c_lung - arterial_offtake * c_art;

    Ok(())
}

/// Instantaneous removal rate (mg/h) of every elimination route, in
/// [`DerivedParameters::elimination_routes`] order.
pub fn elimination_rates(derived: &DerivedParameters, y: &[f64]) -> PbpkResult<Vec<f64>> {
    let topology = &derived.topology;
    topology
        .eliminations()
        .map(|(organ, elimination)| -> PbpkResult<f64> {
            let amount = y.get(organ.state_index).copied().ok_or_else(|| {
                PbpkError::Domain(format!("No amount for {}", organ.compartment))
            })?;
            let c_eq = equilibrium_concentration(
                concentration(organ.compartment, amount, organ.volume)?,
                organ.partition,
                derived.blood_plasma_ratio,
            );
            Ok(elimination.rate(c_eq))
        })
        .collect()
}

fn organ_equilibrium_concentrations(derived: &DerivedParameters, y: &[f64]) -> PbpkResult<Vec<f64>> {
    derived
        .topology
        .organs
        .iter()
        .map(|organ| -> PbpkResult<f64> {
            let c = concentration(organ.compartment, y[organ.state_index], organ.volume)?;
            Ok(equilibrium_concentration(c, organ.partition, derived.blood_plasma_ratio))
        })
        .collect()
}
