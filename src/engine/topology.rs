use serde::Serialize;

use crate::models::Compartment;
use crate::parameters::Drain;

/// Which elimination pathway removes drug from an organ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationRoute {
    Hepatic,
    Intestinal,
    Renal,
}

impl EliminationRoute {
    pub fn name(&self) -> &'static str {
        match self {
            EliminationRoute::Hepatic => "hepatic",
            EliminationRoute::Intestinal => "intestinal",
            EliminationRoute::Renal => "renal",
        }
    }
}

/// Concentration an elimination term acts on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Binding {
    /// Free drug only: `fu × C`.
    Unbound { fraction: f64 },
    Total,
}

impl Binding {
    pub fn factor(&self) -> f64 {
        match self {
            Binding::Unbound { fraction } => *fraction,
            Binding::Total => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Elimination {
    pub route: EliminationRoute,
    /// L/h.
    pub clearance: f64,
    pub binding: Binding,
}

impl Elimination {
    /// Rate of removal (mg/h) at the organ's outflow-equivalent concentration.
    pub fn rate(&self, equilibrium_concentration: f64) -> f64 {
        self.clearance * self.binding.factor() * equilibrium_concentration
    }
}

/// One well-stirred, perfused organ of the circulation.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfusedOrgan {
    pub compartment: Compartment,
    pub state_index: usize,
    /// L.
    pub volume: f64,
    /// Kp.
    pub partition: f64,
    /// Blood drawn from the arterial pool (L/h).
    pub arterial_flow: f64,
    /// Total venous outflow (L/h): arterial supply plus everything drained into it.
    pub outflow: f64,
    pub drains_to: Drain,
    /// Positions in [`Topology::organs`] of the organs draining into this one.
    pub inflows: Vec<usize>,
    pub elimination: Option<Elimination>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloodPool {
    pub state_index: usize,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lung {
    pub state_index: usize,
    pub volume: f64,
    pub partition: f64,
}

/// Gut-lumen depot feeding one organ by first-order absorption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Depot {
    pub state_index: usize,
    /// Volume used for reporting only (L).
    pub volume: f64,
    /// Ka (1/h).
    pub rate_constant: f64,
    /// Position in [`Topology::organs`] of the absorbing organ.
    pub target: usize,
}

/// The closed circulation: lung → arterial pool → organs → venous pool → lung.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub layout: Vec<Compartment>,
    pub cardiac_output: f64,
    pub lung: Lung,
    pub arterial: BloodPool,
    pub venous: BloodPool,
    pub organs: Vec<PerfusedOrgan>,
    pub depot: Option<Depot>,
}

impl Topology {
    pub fn organ(&self, compartment: Compartment) -> Option<&PerfusedOrgan> {
        self.organs.iter().find(|o| o.compartment == compartment)
    }

    pub fn index_of(&self, compartment: Compartment) -> Option<usize> {
        self.layout.iter().position(|c| *c == compartment)
    }

    pub fn volume_of(&self, compartment: Compartment) -> Option<f64> {
        match compartment {
            Compartment::Arterial => Some(self.arterial.volume),
            Compartment::Venous => Some(self.venous.volume),
            Compartment::Lung => Some(self.lung.volume),
            Compartment::Depot => self.depot.map(|d| d.volume),
            other => self.organ(other).map(|o| o.volume),
        }
    }

    /// Partition coefficient of a tissue; blood pools and the depot have none.
    pub fn partition_of(&self, compartment: Compartment) -> Option<f64> {
        match compartment {
            Compartment::Lung => Some(self.lung.partition),
            Compartment::Arterial | Compartment::Venous | Compartment::Depot => None,
            other => self.organ(other).map(|o| o.partition),
        }
    }

    pub fn eliminations(&self) -> impl Iterator<Item = (&PerfusedOrgan, &Elimination)> {
        self.organs
            .iter()
            .filter_map(|o| o.elimination.as_ref().map(|e| (o, e)))
    }
}
