use serde::Serialize;

use super::topology::Topology;
use crate::error::{PbpkError, PbpkResult};
use crate::parameters::Drain;

/// Relative tolerance for flow-balance checks.
pub const FLOW_TOLERANCE: f64 = 1e-9;

/// Flows around the closed circulation (L/h).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowBalance {
    pub cardiac_output: f64,
    /// Σ blood drawn from the arterial pool.
    pub arterial_offtake: f64,
    /// Σ blood returned to the venous pool.
    pub venous_return: f64,
}

impl FlowBalance {
    pub fn is_closed(&self) -> bool {
        close(self.arterial_offtake, self.cardiac_output)
            && close(self.venous_return, self.cardiac_output)
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= FLOW_TOLERANCE * a.abs().max(b.abs())
}

/// Verify that the organ table forms a single closed circulation using the
/// same flows on both the arterial and venous side.
pub fn check_flow_balance(topology: &Topology) -> PbpkResult<FlowBalance> {
    for organ in &topology.organs {
        let inflow = organ.arterial_flow
            + organ
                .inflows
                .iter()
                .map(|&j| topology.organs[j].outflow)
                .sum::<f64>();
        if !close(inflow, organ.outflow) {
            return Err(PbpkError::Parameter(format!(
                "{} receives {} L/h but returns {} L/h",
                organ.compartment, inflow, organ.outflow
            )));
        }
    }

    let balance = FlowBalance {
        cardiac_output: topology.cardiac_output,
        arterial_offtake: topology.organs.iter().map(|o| o.arterial_flow).sum(),
        venous_return: topology
            .organs
            .iter()
            .filter(|o| o.drains_to == Drain::Venous)
            .map(|o| o.outflow)
            .sum(),
    };

    if !balance.is_closed() {
        return Err(PbpkError::Parameter(format!(
            "Inconsistent flow topology: cardiac output {} L/h, arterial offtake {} L/h, venous return {} L/h",
            balance.cardiac_output, balance.arterial_offtake, balance.venous_return
        )));
    }

    Ok(balance)
}

/// Total drug in the body and depot (mg).
pub fn total_amount(amounts: &[f64]) -> f64 {
    amounts.iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::resolve;
    use crate::models::{Compartment, ModelVariant};
    use approx::assert_relative_eq;

    fn topology(variant: ModelVariant) -> Topology {
        let params = variant.physiology(&variant.reference_parameters()).unwrap();
        resolve(&params).unwrap().topology
    }

    #[test]
    fn test_every_variant_is_closed() {
        for variant in [ModelVariant::Simple, ModelVariant::Hepatic, ModelVariant::WholeBody] {
            let balance = check_flow_balance(&topology(variant)).unwrap();
            assert!(balance.is_closed());
            assert_relative_eq!(
                balance.arterial_offtake,
                balance.cardiac_output,
                max_relative = FLOW_TOLERANCE
            );
            assert_relative_eq!(
                balance.venous_return,
                balance.cardiac_output,
                max_relative = FLOW_TOLERANCE
            );
        }
    }

    #[test]
    fn test_broken_drainage_detected() {
        let mut topology = topology(ModelVariant::WholeBody);
        let liver = topology
            .organs
            .iter()
            .position(|o| o.compartment == Compartment::Liver)
            .unwrap();
        // liver returning only its hepatic-artery blood loses the portal flow
        topology.organs[liver].outflow = topology.organs[liver].arterial_flow;
        assert!(matches!(
            check_flow_balance(&topology),
            Err(PbpkError::Parameter(_))
        ));
    }

    #[test]
    fn test_leaking_venous_return_detected() {
        let mut topology = topology(ModelVariant::Simple);
        topology.organs[0].drains_to = Drain::Into(Compartment::Muscle);
        assert!(check_flow_balance(&topology).is_err());
    }

    #[test]
    fn test_total_amount() {
        assert_eq!(total_amount(&[1.0, 2.5, 0.5]), 4.0);
        assert_eq!(total_amount(&[]), 0.0);
    }
}
