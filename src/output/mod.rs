use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

use crate::engine::concentration;
use crate::error::{PbpkError, PbpkResult};
use crate::models::{Compartment, ModelVariant};
use crate::simulation::{SimulationResult, SweepPoint};

/// Which concentration a blood pool reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Matrix {
    /// Whole blood, as stored in the ART and VEN pools.
    Blood,
    /// Blood concentration divided by the blood:plasma ratio.
    Plasma,
}

/// Concentration (mg/L) of every compartment at one sample. Tissues and the
/// depot always report their own concentration; `matrix` only affects the
/// blood pools.
pub fn sample_concentrations(
    result: &SimulationResult,
    sample: usize,
    matrix: Matrix,
) -> PbpkResult<Vec<f64>> {
    let sample = result.samples.get(sample).ok_or_else(|| {
        PbpkError::Configuration(format!("No sample {} in this result", sample))
    })?;

    result
        .compartments
        .iter()
        .zip(&result.volumes)
        .zip(&sample.amounts)
        .map(|((&compartment, &volume), &amount)| -> PbpkResult<f64> {
            let c = concentration(compartment, amount, volume)?;
            Ok(match matrix {
                Matrix::Plasma if compartment.is_blood_pool() => c / result.blood_plasma_ratio,
                _ => c,
            })
        })
        .collect()
}

/// Venous concentration time course in `matrix`.
pub fn venous_profile(result: &SimulationResult, matrix: Matrix) -> PbpkResult<Vec<f64>> {
    let venous = result.index_of(Compartment::Venous).ok_or_else(|| {
        PbpkError::Configuration("Result has no venous pool".to_string())
    })?;
    (0..result.samples.len())
        .map(|i| -> PbpkResult<f64> {
            Ok(sample_concentrations(result, i, matrix)?[venous])
        })
        .collect()
}

/// Write `TIME` plus one concentration column per compartment.
pub fn write_concentrations<W: Write>(
    result: &SimulationResult,
    matrix: Matrix,
    writer: W,
) -> PbpkResult<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = vec!["TIME".to_string()];
    header.extend(result.compartments.iter().map(|c| c.name().to_string()));
    writer.write_record(&header)?;

    for (i, sample) in result.samples.iter().enumerate() {
        let mut record = vec![sample.time.to_string()];
        record.extend(
            sample_concentrations(result, i, matrix)?
                .iter()
                .map(|c| c.to_string()),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Exposure and mass balance of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub variant: ModelVariant,
    pub matrix: Matrix,
    pub dose_total: f64,
    pub cmax: f64,
    pub tmax: f64,
    /// Trapezoidal AUC of the venous concentration over the sampled times.
    pub auc: f64,
    pub final_body_amount: f64,
    pub eliminated: BTreeMap<String, f64>,
    pub mass_balance_residual: f64,
    pub steps: usize,
    pub generated_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn from_result(result: &SimulationResult, matrix: Matrix) -> PbpkResult<Self> {
        let last = result.final_sample().ok_or_else(|| {
            PbpkError::Configuration("Cannot summarise a run without samples".to_string())
        })?;
        let profile = venous_profile(result, matrix)?;
        let times = result.times();

        let (tmax, cmax) = times
            .iter()
            .zip(&profile)
            .fold((times[0], profile[0]), |(tm, cm), (&t, &c)| {
                if c > cm {
                    (t, c)
                } else {
                    (tm, cm)
                }
            });

        let eliminated = result
            .routes
            .iter()
            .zip(&last.eliminated)
            .map(|(route, amount)| (route.name().to_string(), *amount))
            .collect();

        Ok(Self {
            variant: result.variant,
            matrix,
            dose_total: last.dosed,
            cmax,
            tmax,
            auc: trapezoid(&times, &profile),
            final_body_amount: last.total_amount(),
            eliminated,
            mass_balance_residual: last.mass_balance_residual(),
            steps: result.stats.accepted,
            generated_at: Utc::now(),
        })
    }
}

pub fn write_summary<W: Write>(summary: &RunSummary, writer: W) -> PbpkResult<()> {
    serde_json::to_writer_pretty(writer, summary)?;
    Ok(())
}

/// One row per sweep value: exposure and total elimination.
pub fn write_sweep<W: Write>(points: &[SweepPoint], matrix: Matrix, writer: W) -> PbpkResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    let parameter = points.first().map(|p| p.parameter.as_str()).unwrap_or("VALUE");
    writer.write_record([parameter, "CMAX", "TMAX", "AUC", "ELIMINATED", "RESIDUAL"])?;

    for point in points {
        let summary = RunSummary::from_result(&point.result, matrix)?;
        writer.write_record(&[
            point.value.to_string(),
            summary.cmax.to_string(),
            summary.tmax.to_string(),
            summary.auc.to_string(),
            summary.eliminated.values().sum::<f64>().to_string(),
            summary.mass_balance_residual.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn trapezoid(times: &[f64], values: &[f64]) -> f64 {
    times
        .windows(2)
        .zip(values.windows(2))
        .map(|(t, c)| (t[1] - t[0]) * (c[0] + c[1]) / 2.0)
        .sum()
}
