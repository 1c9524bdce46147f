//! The compartmental mass-balance engine: parameter resolution, the organ
//! table, concentrations and the derivative function. Nothing in here does
//! I/O or advances time.

pub mod clearance;
pub mod conservation;
pub mod derivative;
pub mod resolver;
pub mod state;
pub mod topology;

pub use conservation::{check_flow_balance, total_amount, FlowBalance};
pub use derivative::{derivative, elimination_rates, evaluate};
pub use resolver::{resolve, DerivedParameters};
pub use state::{concentration, concentrations, equilibrium_concentration, CompartmentState};
pub use topology::{Binding, Elimination, EliminationRoute, PerfusedOrgan, Topology};
