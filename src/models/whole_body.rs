//! Fourteen-compartment whole-body model (voriconazole, typical adult male).
//!
//! Gut wall and spleen drain into the liver, which also receives the hepatic
//! artery, so the liver's total perfusion is derived rather than stated. Oral
//! doses enter a gut-lumen depot and are absorbed into the gut wall with a
//! first-order rate constant. Hepatic and (optionally) intestinal clearance
//! are scaled from in-vitro microsomal kinetics; renal clearance is optional.

use super::{base_physiology, cardiac_fraction, Compartment, ModelVariant};
use crate::error::{PbpkError, PbpkResult};
use crate::parameters::{
    EnzymeKinetics, GutAbsorption, HepaticClearance, ParameterSet, PhysiologicalParameters, Tissue,
};

pub const COMPARTMENTS: [Compartment; 14] = [
    Compartment::Depot,
    Compartment::Adipose,
    Compartment::Brain,
    Compartment::Gut,
    Compartment::Heart,
    Compartment::Bone,
    Compartment::Kidney,
    Compartment::Liver,
    Compartment::Lung,
    Compartment::Muscle,
    Compartment::Spleen,
    Compartment::Rest,
    Compartment::Arterial,
    Compartment::Venous,
];

pub const PARAMETERS: &[&str] = &[
    "WEIGHT", "Qlu", "Vli", "Vlu", "Vmu", "Vve", "Var", "Vbl", "Kpli", "Kplu", "Kpmu", "Kpre",
    "BP", "fup", "Vad", "Vbo", "Vbr", "VguWall", "VguLumen", "Vhe", "Vki", "Vsp", "Qad", "Qbo",
    "Qbr", "Qgu", "Qhe", "Qki", "Qmu", "Qsp", "Qha", "Qli", "Kpad", "Kpbo", "Kpbr", "Kpgu",
    "Kphe", "Kpki", "Kpsp", "Ka", "fumic", "MPPGL", "VmaxH", "KmH", "MPPGI", "VmaxG", "KmG",
    "CLrenal",
];

const INTESTINAL_PARAMETERS: [&str; 3] = ["MPPGI", "VmaxG", "KmG"];

pub fn reference_parameters() -> ParameterSet {
    [
        // tissue volumes (L)
        ("Vad", 18.2),
        ("Vbo", 10.5),
        ("Vbr", 1.45),
        ("VguWall", 0.65),
        ("VguLumen", 0.35),
        ("Vhe", 0.33),
        ("Vki", 0.31),
        ("Vli", 1.8),
        ("Vlu", 0.5),
        ("Vmu", 29.0),
        ("Vsp", 0.15),
        ("Vbl", 5.6),
        // blood flows (L/h)
        ("Qad", cardiac_fraction(0.05)),
        ("Qbo", cardiac_fraction(0.05)),
        ("Qbr", cardiac_fraction(0.12)),
        ("Qgu", cardiac_fraction(0.15)),
        ("Qhe", cardiac_fraction(0.04)),
        ("Qki", cardiac_fraction(0.19)),
        ("Qmu", cardiac_fraction(0.17)),
        ("Qsp", cardiac_fraction(0.03)),
        ("Qha", cardiac_fraction(0.065)),
        ("Qlu", cardiac_fraction(1.0)),
        // partition coefficients, Poulin and Theil
        ("Kpad", 9.89),
        ("Kpbo", 7.91),
        ("Kpbr", 7.35),
        ("Kpgu", 5.82),
        ("Kphe", 1.95),
        ("Kpki", 2.9),
        ("Kpli", 4.66),
        ("Kplu", 0.83),
        ("Kpmu", 0.78),
        ("Kpsp", 2.96),
        ("Kpre", 4.0),
        ("BP", 1.2),
        ("WEIGHT", 73.0),
        ("Ka", 0.849),
        ("fup", 0.42),
        // in-vitro hepatic kinetics
        ("fumic", 0.711),
        ("MPPGL", 30.3),
        ("VmaxH", 40.0),
        ("KmH", 9.3),
        // in-vitro intestinal kinetics
        ("MPPGI", 30.3 / 21.0),
        ("VmaxG", 40.0),
        ("KmG", 9.3),
        ("CLrenal", 0.096),
    ]
    .into_iter()
    .collect()
}

pub fn physiology(set: &ParameterSet) -> PbpkResult<PhysiologicalParameters> {
    let mut params = base_physiology(set, ModelVariant::WholeBody)?;

    let tissue = |compartment, volume: &str, partition: &str, flow: &str| -> PbpkResult<Tissue> {
        Ok(Tissue::new(
            compartment,
            set.require(volume)?,
            set.require(partition)?,
            set.require(flow)?,
        ))
    };

    params.tissues = vec![
        tissue(Compartment::Adipose, "Vad", "Kpad", "Qad")?,
        tissue(Compartment::Brain, "Vbr", "Kpbr", "Qbr")?,
        tissue(Compartment::Gut, "VguWall", "Kpgu", "Qgu")?.draining_into(Compartment::Liver),
        tissue(Compartment::Heart, "Vhe", "Kphe", "Qhe")?,
        tissue(Compartment::Bone, "Vbo", "Kpbo", "Qbo")?,
        tissue(Compartment::Kidney, "Vki", "Kpki", "Qki")?,
        // hepatic artery only; portal inflow arrives through the drains above
        tissue(Compartment::Liver, "Vli", "Kpli", "Qha")?,
        tissue(Compartment::Muscle, "Vmu", "Kpmu", "Qmu")?,
        tissue(Compartment::Spleen, "Vsp", "Kpsp", "Qsp")?.draining_into(Compartment::Liver),
    ];
    params.stated_liver_flow = set.get("Qli");

    params.absorption = Some(GutAbsorption {
        rate_constant: set.require("Ka")?,
        lumen_volume: set.require("VguLumen")?,
    });

    let fu_microsomes = set.require("fumic")?;
    params.hepatic_clearance = HepaticClearance::InVitro(EnzymeKinetics {
        vmax: set.require("VmaxH")?,
        km: set.require("KmH")?,
        protein_density: set.require("MPPGL")?,
        fu_microsomes,
    });
    params.intestinal_kinetics = intestinal_kinetics(set, fu_microsomes)?;
    params.renal_clearance = set.get("CLrenal");

    Ok(params)
}

/// Intestinal metabolism is modelled only when all of its kinetics are given.
fn intestinal_kinetics(set: &ParameterSet, fu_microsomes: f64) -> PbpkResult<Option<EnzymeKinetics>> {
    let given = INTESTINAL_PARAMETERS
        .iter()
        .filter(|name| set.contains(name))
        .count();

    if given == 0 {
        return Ok(None);
    }
    if given < INTESTINAL_PARAMETERS.len() {
        return Err(PbpkError::Configuration(format!(
            "Intestinal metabolism needs all of {}",
            INTESTINAL_PARAMETERS.join(", ")
        )));
    }

    Ok(Some(EnzymeKinetics {
        vmax: set.require("VmaxG")?,
        km: set.require("KmG")?,
        protein_density: set.require("MPPGI")?,
        fu_microsomes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Drain;
    use approx::assert_relative_eq;

    #[test]
    fn test_portal_drainage() {
        let params = ModelVariant::WholeBody.physiology(&reference_parameters()).unwrap();
        let gut = params.tissue(Compartment::Gut).unwrap();
        let spleen = params.tissue(Compartment::Spleen).unwrap();
        let kidney = params.tissue(Compartment::Kidney).unwrap();
        assert_eq!(gut.drains_to, Drain::Into(Compartment::Liver));
        assert_eq!(spleen.drains_to, Drain::Into(Compartment::Liver));
        assert_eq!(kidney.drains_to, Drain::Venous);
        assert_relative_eq!(
            params.tissue(Compartment::Liver).unwrap().arterial_flow,
            25.35,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_named_volume_excludes_lumen() {
        let params = ModelVariant::WholeBody.physiology(&reference_parameters()).unwrap();
        // Vli+Vki+Vsp+Vhe+Vlu+Vbo+Vbr+Vmu+Vad+VguWall+Vbl
        assert_relative_eq!(params.named_volume(), 68.49, epsilon = 1e-9);
    }

    #[test]
    fn test_optional_eliminations() {
        let mut set = reference_parameters();
        set.remove("CLrenal");
        for name in INTESTINAL_PARAMETERS {
            set.remove(name);
        }
        let params = ModelVariant::WholeBody.physiology(&set).unwrap();
        assert!(params.renal_clearance.is_none());
        assert!(params.intestinal_kinetics.is_none());
    }

    #[test]
    fn test_partial_intestinal_kinetics_rejected() {
        let mut set = reference_parameters();
        set.remove("KmG");
        assert!(matches!(
            ModelVariant::WholeBody.physiology(&set),
            Err(PbpkError::Configuration(_))
        ));
    }

    #[test]
    fn test_absorption_rate_required() {
        let mut set = reference_parameters();
        set.remove("Ka");
        match ModelVariant::WholeBody.physiology(&set) {
            Err(PbpkError::Configuration(msg)) => assert!(msg.contains("Ka")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }
}
