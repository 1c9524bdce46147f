use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PbpkError, PbpkResult};
use crate::models::{Compartment, ModelVariant};

/// Share of total blood volume held in the venous pool.
pub const VENOUS_BLOOD_FRACTION: f64 = 0.705;
/// Share of total blood volume held in the arterial pool.
pub const ARTERIAL_BLOOD_FRACTION: f64 = 0.295;

/// Flat `name -> value` mapping of physiological constants, as written in a
/// run configuration (`"Vli": 1.8`, `"Qlu": 390.0`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, f64>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    /// Set `name` while keeping a single form of blood volume: `Vbl`
    /// drops `Vve` and `Var`, and `Vve` or `Var` first splits a given `Vbl`
    /// into both pools.
    pub fn with_override(mut self, name: &str, value: f64) -> PbpkResult<Self> {
        match name {
            "Vbl" => {
                self.remove("Vve");
                self.remove("Var");
            }
            "Vve" | "Var" if self.contains("Vbl") => {
                let (venous, arterial) = blood_volumes(&self)?;
                self.remove("Vbl");
                self.set("Vve", venous);
                self.set("Var", arterial);
            }
            _ => {}
        }
        self.set(name, value);
        Ok(self)
    }

    pub fn set(&mut self, name: &str, value: f64) -> Option<f64> {
        self.0.insert(name.to_string(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Value of a parameter the selected model cannot run without.
    pub fn require(&self, name: &str) -> PbpkResult<f64> {
        self.get(name).ok_or_else(|| {
            PbpkError::Configuration(format!("Missing required parameter: {}", name))
        })
    }

    /// Overlay `overrides` on top of this set.
    pub fn merge(&mut self, overrides: &ParameterSet) {
        for (name, value) in overrides.iter() {
            self.set(name, value);
        }
    }

    /// Reject any key outside `known`.
    pub fn check_known(&self, known: &[&str], model: &str) -> PbpkResult<()> {
        for name in self.0.keys() {
            if !known.contains(&name.as_str()) {
                return Err(PbpkError::Configuration(format!(
                    "Unknown parameter for {} model: {}",
                    model, name
                )));
            }
        }
        Ok(())
    }
}

impl FromIterator<(&'static str, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (&'static str, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

/// Where an organ's venous outflow goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Drain {
    Venous,
    Into(Compartment),
}

/// A named perfused tissue with its own volume and arterial supply.
#[derive(Debug, Clone, PartialEq)]
pub struct Tissue {
    pub compartment: Compartment,
    /// Volume (L).
    pub volume: f64,
    /// Tissue:plasma partition coefficient.
    pub partition: f64,
    /// Blood taken directly from the arterial pool (L/h).
    pub arterial_flow: f64,
    pub drains_to: Drain,
}

impl Tissue {
    pub fn new(compartment: Compartment, volume: f64, partition: f64, arterial_flow: f64) -> Self {
        Self {
            compartment,
            volume,
            partition,
            arterial_flow,
            drains_to: Drain::Venous,
        }
    }

    pub fn draining_into(mut self, target: Compartment) -> Self {
        self.drains_to = Drain::Into(target);
        self
    }
}

/// In-vitro Michaelis-Menten kinetics of one metabolising organ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnzymeKinetics {
    /// pmol/min/mg microsomal protein.
    pub vmax: f64,
    /// µM.
    pub km: f64,
    /// mg microsomal protein per g tissue.
    pub protein_density: f64,
    /// Fraction unbound in the microsomal incubation.
    pub fu_microsomes: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HepaticClearance {
    None,
    /// Whole-organ clearance given directly (L/h).
    Fixed(f64),
    /// Scaled from in-vitro kinetics at resolve time.
    InVitro(EnzymeKinetics),
}

/// First-order oral input from the gut lumen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GutAbsorption {
    /// Ka (1/h).
    pub rate_constant: f64,
    /// Lumen volume (L), only used to report the depot concentration.
    pub lumen_volume: f64,
}

/// Typed, validated view of a [`ParameterSet`] for one model variant.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysiologicalParameters {
    pub variant: ModelVariant,
    /// kg, read as litres of tissue at density 1.
    pub body_weight: f64,
    /// L/h; every drop of cardiac output passes the lung.
    pub cardiac_output: f64,
    pub blood_plasma_ratio: f64,
    pub fu_plasma: f64,
    pub venous_volume: f64,
    pub arterial_volume: f64,
    pub lung_volume: f64,
    pub lung_partition: f64,
    pub rest_partition: f64,
    pub tissues: Vec<Tissue>,
    /// Total liver flow if the caller stated one; whole-body models derive it.
    pub stated_liver_flow: Option<f64>,
    pub absorption: Option<GutAbsorption>,
    pub hepatic_clearance: HepaticClearance,
    pub intestinal_kinetics: Option<EnzymeKinetics>,
    /// L/h.
    pub renal_clearance: Option<f64>,
}

impl PhysiologicalParameters {
    pub fn tissue(&self, compartment: Compartment) -> Option<&Tissue> {
        self.tissues.iter().find(|t| t.compartment == compartment)
    }

    /// Every volume the parameter set names explicitly; the gut lumen is a
    /// depot and not body tissue.
    pub fn named_volume(&self) -> f64 {
        self.venous_volume
            + self.arterial_volume
            + self.lung_volume
            + self.tissues.iter().map(|t| t.volume).sum::<f64>()
    }

    /// Arterial offtake of all named organs.
    pub fn named_arterial_flow(&self) -> f64 {
        self.tissues.iter().map(|t| t.arterial_flow).sum()
    }

    pub fn validate(&self) -> PbpkResult<()> {
        positive("WEIGHT", self.body_weight)?;
        positive("cardiac output", self.cardiac_output)?;
        positive("BP", self.blood_plasma_ratio)?;
        fraction("fup", self.fu_plasma)?;
        positive("venous volume", self.venous_volume)?;
        positive("arterial volume", self.arterial_volume)?;
        positive("lung volume", self.lung_volume)?;
        positive("lung partition coefficient", self.lung_partition)?;
        positive("rest partition coefficient", self.rest_partition)?;

        for tissue in &self.tissues {
            let name = tissue.compartment.name();
            positive(&format!("{} volume", name), tissue.volume)?;
            positive(&format!("{} partition coefficient", name), tissue.partition)?;
            positive(&format!("{} blood flow", name), tissue.arterial_flow)?;
            if let Drain::Into(target) = tissue.drains_to {
                if self.tissue(target).is_none() {
                    return Err(PbpkError::Parameter(format!(
                        "{} drains into {}, which is not a perfused organ of this model",
                        name,
                        target.name()
                    )));
                }
            }
        }

        if let Some(flow) = self.stated_liver_flow {
            positive("Qli", flow)?;
        }
        if let Some(absorption) = &self.absorption {
            positive("Ka", absorption.rate_constant)?;
            positive("VguLumen", absorption.lumen_volume)?;
        }
        match &self.hepatic_clearance {
            HepaticClearance::None => {}
            HepaticClearance::Fixed(cl) => non_negative("CL_hepatic", *cl)?,
            HepaticClearance::InVitro(kinetics) => kinetics.validate("hepatic")?,
        }
        if let Some(kinetics) = &self.intestinal_kinetics {
            kinetics.validate("intestinal")?;
        }
        if let Some(cl) = self.renal_clearance {
            non_negative("CLrenal", cl)?;
        }

        Ok(())
    }
}

impl EnzymeKinetics {
    fn validate(&self, organ: &str) -> PbpkResult<()> {
        non_negative(&format!("{} Vmax", organ), self.vmax)?;
        positive(&format!("{} Km", organ), self.km)?;
        positive(&format!("{} microsomal protein density", organ), self.protein_density)?;
        fraction("fumic", self.fu_microsomes)
    }
}

/// Venous and arterial pool volumes, from `Vve` + `Var` or from total `Vbl`.
pub fn blood_volumes(set: &ParameterSet) -> PbpkResult<(f64, f64)> {
    match (set.get("Vbl"), set.get("Vve"), set.get("Var")) {
        (Some(total), None, None) => Ok((
            VENOUS_BLOOD_FRACTION * total,
            ARTERIAL_BLOOD_FRACTION * total,
        )),
        (None, Some(venous), Some(arterial)) => Ok((venous, arterial)),
        (Some(_), _, _) => Err(PbpkError::Configuration(
            "Blood volume must be given either as Vbl or as Vve and Var, not both".to_string(),
        )),
        (None, _, _) => Err(PbpkError::Configuration(
            "Missing required parameter: Vbl (or both Vve and Var)".to_string(),
        )),
    }
}

fn positive(name: &str, value: f64) -> PbpkResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PbpkError::Parameter(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}

fn non_negative(name: &str, value: f64) -> PbpkResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(PbpkError::Parameter(format!(
            "{} must not be negative, got {}",
            name, value
        )));
    }
    Ok(())
}

fn fraction(name: &str, value: f64) -> PbpkResult<()> {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(PbpkError::Parameter(format!(
            "{} must lie in (0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}
