//! Six-compartment model of the typical adult male: liver, lung, muscle and
//! a remainder compartment around the arterial and venous blood pools.

use super::{base_physiology, cardiac_fraction, Compartment, ModelVariant};
use crate::error::PbpkResult;
use crate::parameters::{ParameterSet, PhysiologicalParameters, Tissue};

pub const COMPARTMENTS: [Compartment; 6] = [
    Compartment::Liver,
    Compartment::Lung,
    Compartment::Muscle,
    Compartment::Rest,
    Compartment::Arterial,
    Compartment::Venous,
];

pub const PARAMETERS: &[&str] = &[
    "WEIGHT", "Qlu", "Vli", "Vlu", "Vmu", "Vve", "Var", "Vbl", "Kpli", "Kplu", "Kpmu", "Kpre",
    "BP", "fup", "Qli", "Qmu",
];

pub fn reference_parameters() -> ParameterSet {
    [
        // volumes (L)
        ("Vli", 1.8),
        ("Vlu", 0.5),
        ("Vmu", 29.0),
        ("Vve", 3.948),
        ("Var", 1.652),
        // flows (L/h)
        ("Qmu", cardiac_fraction(0.17)),
        ("Qli", cardiac_fraction(0.245)),
        ("Qlu", cardiac_fraction(1.0)),
        // partition coefficients, Poulin and Theil
        ("Kpli", 4.66),
        ("Kplu", 0.83),
        ("Kpmu", 2.94),
        ("Kpre", 4.0),
        ("BP", 1.0),
        ("WEIGHT", 73.0),
        ("fup", 0.42),
    ]
    .into_iter()
    .collect()
}

pub fn physiology(set: &ParameterSet) -> PbpkResult<PhysiologicalParameters> {
    perfusion(set, ModelVariant::Simple)
}

/// Liver and muscle both take their blood straight from the arterial pool.
pub(super) fn perfusion(
    set: &ParameterSet,
    variant: ModelVariant,
) -> PbpkResult<PhysiologicalParameters> {
    let mut params = base_physiology(set, variant)?;
    params.tissues = vec![
        Tissue::new(
            Compartment::Liver,
            set.require("Vli")?,
            set.require("Kpli")?,
            set.require("Qli")?,
        ),
        Tissue::new(
            Compartment::Muscle,
            set.require("Vmu")?,
            set.require("Kpmu")?,
            set.require("Qmu")?,
        ),
    ];
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PbpkError;
    use crate::parameters::HepaticClearance;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_flows() {
        let set = reference_parameters();
        assert_relative_eq!(set.get("Qlu").unwrap(), 390.0, epsilon = 1e-12);
        assert_relative_eq!(set.get("Qli").unwrap(), 95.55, epsilon = 1e-9);
        assert_relative_eq!(set.get("Qmu").unwrap(), 66.3, epsilon = 1e-9);
    }

    #[test]
    fn test_physiology_has_no_elimination() {
        let params = ModelVariant::Simple.physiology(&reference_parameters()).unwrap();
        assert_eq!(params.tissues.len(), 2);
        assert_eq!(params.hepatic_clearance, HepaticClearance::None);
        assert!(params.absorption.is_none());
        assert_relative_eq!(params.named_volume(), 36.9, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_flow_is_configuration_error() {
        let mut set = reference_parameters();
        set.remove("Qmu");
        assert!(matches!(
            ModelVariant::Simple.physiology(&set),
            Err(PbpkError::Configuration(_))
        ));
    }
}
