use serde::Serialize;

use crate::engine::EliminationRoute;
use crate::models::{Compartment, ModelVariant};
use crate::solver::StepStats;

/// State recorded at one output time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub time: f64,
    /// Cumulative dose given up to and including this time (mg).
    pub dosed: f64,
    /// Amount per compartment (mg), in layout order.
    pub amounts: Vec<f64>,
    /// Cumulative amount removed per elimination route (mg).
    pub eliminated: Vec<f64>,
}

impl Sample {
    pub fn total_amount(&self) -> f64 {
        self.amounts.iter().sum()
    }

    pub fn total_eliminated(&self) -> f64 {
        self.eliminated.iter().sum()
    }

    /// `dosed − in body − eliminated`; zero up to integration error.
    pub fn mass_balance_residual(&self) -> f64 {
        self.dosed - self.total_amount() - self.total_eliminated()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub variant: ModelVariant,
    pub compartments: Vec<Compartment>,
    /// Volume (L) of each compartment, in layout order.
    pub volumes: Vec<f64>,
    pub blood_plasma_ratio: f64,
    pub routes: Vec<EliminationRoute>,
    pub samples: Vec<Sample>,
    pub stats: StepStats,
}

impl SimulationResult {
    pub fn index_of(&self, compartment: Compartment) -> Option<usize> {
        self.compartments.iter().position(|c| *c == compartment)
    }

    pub fn amount(&self, sample: usize, compartment: Compartment) -> Option<f64> {
        let i = self.index_of(compartment)?;
        self.samples.get(sample).map(|s| s.amounts[i])
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    /// Amount time course of one compartment.
    pub fn amounts_of(&self, compartment: Compartment) -> Option<Vec<f64>> {
        let i = self.index_of(compartment)?;
        Some(self.samples.iter().map(|s| s.amounts[i]).collect())
    }

    /// Cumulative amount removed by one route at the last sample.
    pub fn eliminated_by(&self, route: EliminationRoute) -> Option<f64> {
        let i = self.routes.iter().position(|r| *r == route)?;
        self.samples.last().map(|s| s.eliminated[i])
    }

    pub fn final_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }
}
