pub mod hepatic;
pub mod simple;
pub mod whole_body;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PbpkResult;
use crate::parameters::{blood_volumes, HepaticClearance, ParameterSet, PhysiologicalParameters};

/// Cardiac output of the typical adult male (L/min).
pub const CARDIAC_OUTPUT_L_PER_MIN: f64 = 6.5;
pub const MINUTES_PER_HOUR: f64 = 60.0;

/// Blood flow (L/h) for a fraction of the reference cardiac output.
pub fn cardiac_fraction(fraction: f64) -> f64 {
    fraction * CARDIAC_OUTPUT_L_PER_MIN * MINUTES_PER_HOUR
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Six compartments, no elimination.
    Simple,
    /// Six compartments with a fixed hepatic clearance.
    Hepatic,
    /// Fourteen compartments with gut absorption and first-pass metabolism.
    WholeBody,
}

impl ModelVariant {
    pub fn name(&self) -> &'static str {
        match self {
            ModelVariant::Simple => "simple",
            ModelVariant::Hepatic => "hepatic",
            ModelVariant::WholeBody => "whole_body",
        }
    }

    /// State vector layout, in integration order.
    pub fn compartments(&self) -> &'static [Compartment] {
        match self {
            ModelVariant::Simple | ModelVariant::Hepatic => &simple::COMPARTMENTS,
            ModelVariant::WholeBody => &whole_body::COMPARTMENTS,
        }
    }

    pub fn parameter_names(&self) -> &'static [&'static str] {
        match self {
            ModelVariant::Simple => simple::PARAMETERS,
            ModelVariant::Hepatic => hepatic::PARAMETERS,
            ModelVariant::WholeBody => whole_body::PARAMETERS,
        }
    }

    pub fn has_depot(&self) -> bool {
        self.compartments().contains(&Compartment::Depot)
    }

    /// Literature parameter set of the typical 73 kg adult male.
    pub fn reference_parameters(&self) -> ParameterSet {
        match self {
            ModelVariant::Simple => simple::reference_parameters(),
            ModelVariant::Hepatic => hepatic::reference_parameters(),
            ModelVariant::WholeBody => whole_body::reference_parameters(),
        }
    }

    /// Read and validate the physiology this variant needs from `set`.
    pub fn physiology(&self, set: &ParameterSet) -> PbpkResult<PhysiologicalParameters> {
        set.check_known(self.parameter_names(), self.name())?;
        let params = match self {
            ModelVariant::Simple => simple::physiology(set)?,
            ModelVariant::Hepatic => hepatic::physiology(set)?,
            ModelVariant::WholeBody => whole_body::physiology(set)?,
        };
        params.validate()?;
        Ok(params)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Compartment {
    /// Gut lumen dosing depot.
    #[serde(rename = "D")]
    Depot,
    #[serde(rename = "ADIPOSE")]
    Adipose,
    #[serde(rename = "BRAIN")]
    Brain,
    /// Gut wall.
    #[serde(rename = "GUT")]
    Gut,
    #[serde(rename = "HEART")]
    Heart,
    #[serde(rename = "BONE")]
    Bone,
    #[serde(rename = "KIDNEY")]
    Kidney,
    #[serde(rename = "LIVER")]
    Liver,
    #[serde(rename = "LUNG")]
    Lung,
    #[serde(rename = "MUSCLE")]
    Muscle,
    #[serde(rename = "SPLEEN")]
    Spleen,
    /// Remainder of the body.
    #[serde(rename = "REST")]
    Rest,
    #[serde(rename = "ART")]
    Arterial,
    #[serde(rename = "VEN")]
    Venous,
}

impl Compartment {
    pub fn name(&self) -> &'static str {
        match self {
            Compartment::Depot => "D",
            Compartment::Adipose => "ADIPOSE",
            Compartment::Brain => "BRAIN",
            Compartment::Gut => "GUT",
            Compartment::Heart => "HEART",
            Compartment::Bone => "BONE",
            Compartment::Kidney => "KIDNEY",
            Compartment::Liver => "LIVER",
            Compartment::Lung => "LUNG",
            Compartment::Muscle => "MUSCLE",
            Compartment::Spleen => "SPLEEN",
            Compartment::Rest => "REST",
            Compartment::Arterial => "ART",
            Compartment::Venous => "VEN",
        }
    }

    pub fn is_blood_pool(&self) -> bool {
        matches!(self, Compartment::Arterial | Compartment::Venous)
    }
}

impl fmt::Display for Compartment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whole-body quantities shared by all variants; tissues are filled in by
/// the variant.
pub(crate) fn base_physiology(
    set: &ParameterSet,
    variant: ModelVariant,
) -> PbpkResult<PhysiologicalParameters> {
    let (venous_volume, arterial_volume) = blood_volumes(set)?;

    Ok(PhysiologicalParameters {
        variant,
        body_weight: set.require("WEIGHT")?,
        cardiac_output: set.require("Qlu")?,
        blood_plasma_ratio: set.require("BP")?,
        fu_plasma: set.require("fup")?,
        venous_volume,
        arterial_volume,
        lung_volume: set.require("Vlu")?,
        lung_partition: set.require("Kplu")?,
        rest_partition: set.require("Kpre")?,
        tissues: Vec::new(),
        stated_liver_flow: None,
        absorption: None,
        hepatic_clearance: HepaticClearance::None,
        intestinal_kinetics: None,
        renal_clearance: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PbpkError;

    const COMMON_PARAMETERS: &[&str] = &[
        "WEIGHT", "Qlu", "Vli", "Vlu", "Vmu", "Vve", "Var", "Vbl", "Kpli", "Kplu", "Kpmu", "Kpre",
        "BP", "fup",
    ];

    #[test]
    fn test_layouts() {
        assert_eq!(ModelVariant::Simple.compartments().len(), 6);
        assert_eq!(ModelVariant::Hepatic.compartments().len(), 6);
        assert_eq!(ModelVariant::WholeBody.compartments().len(), 14);
        assert!(ModelVariant::WholeBody.has_depot());
        assert!(!ModelVariant::Hepatic.has_depot());
    }

    #[test]
    fn test_variant_names_match_across_cli_and_json() {
        use clap::ValueEnum;
        for variant in [ModelVariant::Simple, ModelVariant::Hepatic, ModelVariant::WholeBody] {
            let json = serde_json::to_value(variant).unwrap();
            let name = json.as_str().unwrap();
            assert_eq!(ModelVariant::from_str(name, false), Ok(variant));
        }
        assert_eq!(
            ModelVariant::from_str("whole_body", false),
            Ok(ModelVariant::WholeBody)
        );
    }

    #[test]
    fn test_reference_sets_are_valid() {
        for variant in [ModelVariant::Simple, ModelVariant::Hepatic, ModelVariant::WholeBody] {
            let set = variant.reference_parameters();
            let params = variant.physiology(&set).unwrap();
            assert_eq!(params.variant, variant);
        }
    }

    #[test]
    fn test_every_variant_accepts_common_parameters() {
        for variant in [ModelVariant::Simple, ModelVariant::Hepatic, ModelVariant::WholeBody] {
            for name in COMMON_PARAMETERS {
                assert!(
                    variant.parameter_names().contains(name),
                    "{} does not accept {}",
                    variant,
                    name
                );
            }
        }
    }

    #[test]
    fn test_unknown_parameter_is_configuration_error() {
        let set = ModelVariant::Simple.reference_parameters().with("Ka", 0.849);
        assert!(matches!(
            ModelVariant::Simple.physiology(&set),
            Err(PbpkError::Configuration(_))
        ));
    }

    #[test]
    fn test_compartment_names_round_trip_through_serde() {
        let json = serde_json::to_string(&Compartment::Venous).unwrap();
        assert_eq!(json, "\"VEN\"");
        let back: Compartment = serde_json::from_str("\"D\"").unwrap();
        assert_eq!(back, Compartment::Depot);
        let variant: ModelVariant = serde_json::from_str("\"whole_body\"").unwrap();
        assert_eq!(variant, ModelVariant::WholeBody);
    }
}
