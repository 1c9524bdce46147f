use serde::Serialize;

use super::resolver::DerivedParameters;
use crate::error::{PbpkError, PbpkResult};
use crate::models::{Compartment, ModelVariant};

/// Amounts below this (mg) are treated as an unstable integration step rather
/// than round-off around zero.
pub const NEGATIVE_AMOUNT_TOLERANCE: f64 = 1e-6;

/// Drug amount (mg) per compartment, in the variant's layout order.
///
/// Also used for derivatives (mg/h) in the same layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompartmentState {
    compartments: Vec<Compartment>,
    amounts: Vec<f64>,
}

impl CompartmentState {
    pub fn zeros(variant: ModelVariant) -> Self {
        let compartments = variant.compartments().to_vec();
        let amounts = vec![0.0; compartments.len()];
        Self {
            compartments,
            amounts,
        }
    }

    pub fn from_amounts(compartments: &[Compartment], amounts: Vec<f64>) -> PbpkResult<Self> {
        if compartments.len() != amounts.len() {
            return Err(PbpkError::Configuration(format!(
                "{} amounts given for {} compartments",
                amounts.len(),
                compartments.len()
            )));
        }
        Ok(Self {
            compartments: compartments.to_vec(),
            amounts,
        })
    }

    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    pub fn amounts(&self) -> &[f64] {
        &self.amounts
    }

    pub fn get(&self, compartment: Compartment) -> Option<f64> {
        self.index(compartment).map(|i| self.amounts[i])
    }

    pub fn set(&mut self, compartment: Compartment, amount: f64) -> PbpkResult<()> {
        let i = self.require_index(compartment)?;
        self.amounts[i] = amount;
        Ok(())
    }

    /// Instantaneous dose into one compartment.
    pub fn add_bolus(&mut self, compartment: Compartment, amount: f64) -> PbpkResult<()> {
        let i = self.require_index(compartment)?;
        self.amounts[i] += amount;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Compartment, f64)> + '_ {
        self.compartments.iter().copied().zip(self.amounts.iter().copied())
    }

    pub fn total(&self) -> f64 {
        super::conservation::total_amount(&self.amounts)
    }

    fn index(&self, compartment: Compartment) -> Option<usize> {
        self.compartments.iter().position(|c| *c == compartment)
    }

    fn require_index(&self, compartment: Compartment) -> PbpkResult<usize> {
        self.index(compartment).ok_or_else(|| {
            PbpkError::Configuration(format!("No {} compartment in this state", compartment))
        })
    }
}

/// `amount / volume`, failing on anything a well-posed state cannot produce.
pub fn concentration(compartment: Compartment, amount: f64, volume: f64) -> PbpkResult<f64> {
    if !volume.is_finite() || volume <= 0.0 {
        return Err(PbpkError::Domain(format!(
            "{} volume must be positive, got {}",
            compartment, volume
        )));
    }
    if !amount.is_finite() {
        return Err(PbpkError::Domain(format!(
            "{} amount is not finite: {}",
            compartment, amount
        )));
    }
    if amount < -NEGATIVE_AMOUNT_TOLERANCE {
        return Err(PbpkError::Domain(format!(
            "{} amount went negative: {}",
            compartment, amount
        )));
    }
    Ok(amount / volume)
}

/// Venous-outflow-equivalent (blood) concentration of a tissue under the
/// well-stirred assumption: `C_tissue / (Kp / BP)`.
pub fn equilibrium_concentration(tissue_concentration: f64, partition: f64, blood_plasma_ratio: f64) -> f64 {
    tissue_concentration / (partition / blood_plasma_ratio)
}

/// Current concentration (mg/L) of every compartment.
pub fn concentrations(
    state: &CompartmentState,
    derived: &DerivedParameters,
) -> PbpkResult<Vec<(Compartment, f64)>> {
    state
        .iter()
        .map(|(compartment, amount)| -> PbpkResult<(Compartment, f64)> {
            let volume = derived.volume_of(compartment).ok_or_else(|| {
                PbpkError::Configuration(format!(
                    "{} is not part of the {} model",
                    compartment, derived.variant
                ))
            })?;
            Ok((compartment, concentration(compartment, amount, volume)?))
        })
        .collect()
}
