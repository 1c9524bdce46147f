//! The six-compartment model with a fixed hepatic clearance acting on the
//! unbound liver outflow concentration.

use super::{simple, ModelVariant};
use crate::error::PbpkResult;
use crate::parameters::{HepaticClearance, ParameterSet, PhysiologicalParameters};

pub const PARAMETERS: &[&str] = &[
    "WEIGHT", "Qlu", "Vli", "Vlu", "Vmu", "Vve", "Var", "Vbl", "Kpli", "Kplu", "Kpmu", "Kpre",
    "BP", "fup", "Qli", "Qmu", "CL_hepatic",
];

pub fn reference_parameters() -> ParameterSet {
    simple::reference_parameters().with("CL_hepatic", 10.0)
}

pub fn physiology(set: &ParameterSet) -> PbpkResult<PhysiologicalParameters> {
    let mut params = simple::perfusion(set, ModelVariant::Hepatic)?;
    params.hepatic_clearance = HepaticClearance::Fixed(set.require("CL_hepatic")?);
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PbpkError;

    #[test]
    fn test_clearance_is_required() {
        let mut set = reference_parameters();
        assert_eq!(
            ModelVariant::Hepatic.physiology(&set).unwrap().hepatic_clearance,
            HepaticClearance::Fixed(10.0)
        );
        set.remove("CL_hepatic");
        assert!(matches!(
            ModelVariant::Hepatic.physiology(&set),
            Err(PbpkError::Configuration(_))
        ));
    }

    #[test]
    fn test_negative_clearance_is_parameter_error() {
        let set = reference_parameters().with("CL_hepatic", -1.0);
        assert!(matches!(
            ModelVariant::Hepatic.physiology(&set),
            Err(PbpkError::Parameter(_))
        ));
    }
}
