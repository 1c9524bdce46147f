use log::{debug, warn};

use super::clearance::intrinsic_clearance;
use super::conservation::{check_flow_balance, FlowBalance, FLOW_TOLERANCE};
use super::topology::{
    Binding, BloodPool, Depot, Elimination, EliminationRoute, Lung, PerfusedOrgan, Topology,
};
use crate::error::{PbpkError, PbpkResult};
use crate::models::{Compartment, ModelVariant};
use crate::parameters::{Drain, HepaticClearance, PhysiologicalParameters, Tissue};

/// Quantities derived once per run from [`PhysiologicalParameters`].
///
/// Immutable: changing any physiological parameter means resolving again.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedParameters {
    pub variant: ModelVariant,
    pub blood_plasma_ratio: f64,
    pub fu_plasma: f64,
    /// Remainder ("rest of body") volume (L).
    pub rest_volume: f64,
    /// Remainder blood flow (L/h).
    pub rest_flow: f64,
    /// Total liver perfusion (L/h).
    pub liver_flow: f64,
    /// L/h; `None` when the variant has no hepatic elimination.
    pub hepatic_clearance: Option<f64>,
    pub intestinal_clearance: Option<f64>,
    pub renal_clearance: Option<f64>,
    pub flow_balance: FlowBalance,
    pub topology: Topology,
}

impl DerivedParameters {
    pub fn layout(&self) -> &[Compartment] {
        &self.topology.layout
    }

    pub fn volume_of(&self, compartment: Compartment) -> Option<f64> {
        self.topology.volume_of(compartment)
    }

    pub fn elimination_routes(&self) -> Vec<EliminationRoute> {
        self.topology.eliminations().map(|(_, e)| e.route).collect()
    }
}

/// Resolve remainder volume and flow, liver perfusion, intrinsic clearances
/// and the organ table. Fails on any physiologically inconsistent input.
pub fn resolve(params: &PhysiologicalParameters) -> PbpkResult<DerivedParameters> {
    params.validate()?;

    let named_volume = params.named_volume();
    let rest_volume = params.body_weight - named_volume;
    if !(rest_volume > 0.0) {
        return Err(PbpkError::Parameter(format!(
            "Remainder volume must be positive: body weight {} minus named volumes {} gives {}",
            params.body_weight, named_volume, rest_volume
        )));
    }

    let named_flow = params.named_arterial_flow();
    let rest_flow = params.cardiac_output - named_flow;
    if !(rest_flow > 0.0) {
        return Err(PbpkError::Parameter(format!(
            "Remainder flow must be positive: cardiac output {} minus named flows {} gives {}",
            params.cardiac_output, named_flow, rest_flow
        )));
    }

    let mut tissues = params.tissues.clone();
    tissues.push(Tissue::new(
        Compartment::Rest,
        rest_volume,
        params.rest_partition,
        rest_flow,
    ));

    let outflows = organ_outflows(&tissues)?;
    let liver = position(&tissues, Compartment::Liver)?;
    let liver_flow = outflows[liver];
    check_stated_liver_flow(params, &tissues, liver, liver_flow)?;

    let unbound = Binding::Unbound {
        fraction: params.fu_plasma,
    };
    let hepatic_clearance = match &params.hepatic_clearance {
        HepaticClearance::None => None,
        HepaticClearance::Fixed(cl) => Some(*cl),
        HepaticClearance::InVitro(kinetics) => {
            Some(intrinsic_clearance(kinetics, tissues[liver].volume))
        }
    };
    let intestinal_clearance = match &params.intestinal_kinetics {
        Some(kinetics) => {
            let gut = position(&tissues, Compartment::Gut)?;
            Some(intrinsic_clearance(kinetics, tissues[gut].volume))
        }
        None => None,
    };
    let renal_clearance = params.renal_clearance;

    let layout = params.variant.compartments().to_vec();
    let state_index = |compartment: Compartment| -> PbpkResult<usize> {
        layout.iter().position(|c| *c == compartment).ok_or_else(|| {
            PbpkError::Configuration(format!(
                "{} has no state in the {} model",
                compartment, params.variant
            ))
        })
    };

    let mut organs = Vec::with_capacity(tissues.len());
    for (i, tissue) in tissues.iter().enumerate() {
        let clearance = match tissue.compartment {
            Compartment::Liver => hepatic_clearance.map(|cl| (EliminationRoute::Hepatic, cl)),
            Compartment::Gut => intestinal_clearance.map(|cl| (EliminationRoute::Intestinal, cl)),
            Compartment::Kidney => renal_clearance.map(|cl| (EliminationRoute::Renal, cl)),
            _ => None,
        };
        let elimination = match clearance {
            Some((route, clearance)) if clearance < 0.0 => {
                return Err(PbpkError::Parameter(format!(
                    "{} clearance must not be negative, got {}",
                    route.name(),
                    clearance
                )));
            }
            Some((route, clearance)) => Some(Elimination {
                route,
                clearance,
                binding: unbound,
            }),
            None => None,
        };

        organs.push(PerfusedOrgan {
            compartment: tissue.compartment,
            state_index: state_index(tissue.compartment)?,
            volume: tissue.volume,
            partition: tissue.partition,
            arterial_flow: tissue.arterial_flow,
            outflow: outflows[i],
            drains_to: tissue.drains_to,
            inflows: tissues
                .iter()
                .enumerate()
                .filter(|(_, t)| t.drains_to == Drain::Into(tissue.compartment))
                .map(|(j, _)| j)
                .collect(),
            elimination,
        });
    }

    let depot = match &params.absorption {
        Some(absorption) => {
            let gut = position(&tissues, Compartment::Gut)?;
            Some(Depot {
                state_index: state_index(Compartment::Depot)?,
                volume: tissues[gut].volume + absorption.lumen_volume,
                rate_constant: absorption.rate_constant,
                target: gut,
            })
        }
        None => None,
    };

    let topology = Topology {
        cardiac_output: params.cardiac_output,
        lung: Lung {
            state_index: state_index(Compartment::Lung)?,
            volume: params.lung_volume,
            partition: params.lung_partition,
        },
        arterial: BloodPool {
            state_index: state_index(Compartment::Arterial)?,
            volume: params.arterial_volume,
        },
        venous: BloodPool {
            state_index: state_index(Compartment::Venous)?,
            volume: params.venous_volume,
        },
        organs,
        depot,
        layout,
    };

    let covered = topology.organs.len() + 3 + usize::from(topology.depot.is_some());
    if covered != topology.layout.len() {
        return Err(PbpkError::Configuration(format!(
            "The {} model has {} states but its circulation covers {}",
            params.variant,
            topology.layout.len(),
            covered
        )));
    }

    let flow_balance = check_flow_balance(&topology)?;

    debug!(
        "Resolved {} model: Vre = {:.4} L, Qre = {:.4} L/h, Qli = {:.4} L/h",
        params.variant, rest_volume, rest_flow, liver_flow
    );
    if let Some(cl) = hepatic_clearance {
        debug!("Hepatic clearance {:.4} L/h", cl);
    }
    if let Some(cl) = intestinal_clearance {
        debug!("Intestinal clearance {:.4} L/h", cl);
    }

    Ok(DerivedParameters {
        variant: params.variant,
        blood_plasma_ratio: params.blood_plasma_ratio,
        fu_plasma: params.fu_plasma,
        rest_volume,
        rest_flow,
        liver_flow,
        hepatic_clearance,
        intestinal_clearance,
        renal_clearance,
        flow_balance,
        topology,
    })
}

fn position(tissues: &[Tissue], compartment: Compartment) -> PbpkResult<usize> {
    tissues
        .iter()
        .position(|t| t.compartment == compartment)
        .ok_or_else(|| PbpkError::Configuration(format!("Model has no {} compartment", compartment)))
}

/// Outflow of each tissue: its arterial supply plus the outflow of every
/// tissue draining into it.
fn organ_outflows(tissues: &[Tissue]) -> PbpkResult<Vec<f64>> {
    fn outflow(tissues: &[Tissue], i: usize, depth: usize) -> PbpkResult<f64> {
        if depth > tissues.len() {
            return Err(PbpkError::Parameter(format!(
                "Circular drainage through {}",
                tissues[i].compartment
            )));
        }
        let mut total = tissues[i].arterial_flow;
        for (j, upstream) in tissues.iter().enumerate() {
            if upstream.drains_to == Drain::Into(tissues[i].compartment) {
                total += outflow(tissues, j, depth + 1)?;
            }
        }
        Ok(total)
    }

    (0..tissues.len()).map(|i| outflow(tissues, i, 0)).collect()
}

/// A stated liver flow must agree with the sum of its afferent branches;
/// anything else would count portal blood twice.
fn check_stated_liver_flow(
    params: &PhysiologicalParameters,
    tissues: &[Tissue],
    liver: usize,
    derived: f64,
) -> PbpkResult<()> {
    let Some(stated) = params.stated_liver_flow else {
        return Ok(());
    };
    let portal = tissues
        .iter()
        .any(|t| t.drains_to == Drain::Into(Compartment::Liver));
    if !portal {
        return Ok(());
    }

    if (stated - derived).abs() > FLOW_TOLERANCE * derived.abs() {
        return Err(PbpkError::Parameter(format!(
            "Qli = {} double counts liver perfusion; it is derived as hepatic artery {} plus portal inflow, giving {}",
            stated, tissues[liver].arterial_flow, derived
        )));
    }
    warn!(
        "Qli = {} is derived from its afferent branches and need not be given",
        stated
    );
    Ok(())
}
