//! In-vitro to in-vivo scaling of microsomal enzyme kinetics.
//!
//! `Vmax / Km` in (pmol/min/mg) / µM is an unbound intrinsic clearance in
//! µL/min per mg microsomal protein. Multiplying by the organ's microsomal
//! protein content (mg) and converting µL/min to L/h gives whole-organ
//! clearance; dividing by the microsomal unbound fraction corrects for
//! non-specific binding in the incubation.

use crate::parameters::EnzymeKinetics;

/// Tissue density of 1 kg/L turns organ volume (L) into mass (kg); this
/// turns kg into g.
pub const GRAMS_PER_KILOGRAM: f64 = 1000.0;

/// 1 µL/min = 60 µL/h = 60e-6 L/h.
pub const MICROLITRES_PER_MINUTE_TO_LITRES_PER_HOUR: f64 = 60.0 * 1e-6;

/// Microsomal protein in the whole organ (mg).
pub fn microsomal_scale_factor(protein_density_mg_per_g: f64, organ_volume_l: f64) -> f64 {
    protein_density_mg_per_g * organ_volume_l * GRAMS_PER_KILOGRAM
}

/// Whole-organ intrinsic clearance (L/h).
pub fn intrinsic_clearance(kinetics: &EnzymeKinetics, organ_volume_l: f64) -> f64 {
    let scale_factor = microsomal_scale_factor(kinetics.protein_density, organ_volume_l);
    (kinetics.vmax / kinetics.km) * scale_factor * MICROLITRES_PER_MINUTE_TO_LITRES_PER_HOUR
        / kinetics.fu_microsomes
}
