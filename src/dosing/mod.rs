use log::warn;
use serde::Serialize;

use crate::config::{DosingConfig, DosingRoute};
use crate::error::{PbpkError, PbpkResult};
use crate::models::{Compartment, ModelVariant};

/// Where a dose enters the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DoseRoute {
    IvBolus { target: Compartment },
    /// Into the gut lumen depot, absorbed first-order.
    Oral,
}

impl DoseRoute {
    pub fn compartment(&self) -> Compartment {
        match self {
            DoseRoute::IvBolus { target } => *target,
            DoseRoute::Oral => Compartment::Depot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DoseEvent {
    pub time: f64,
    pub amount: f64,
    pub route: DoseRoute,
}

/// Time-ordered dose events, each an instantaneous change of one
/// compartment's amount.
#[derive(Debug, Clone, PartialEq)]
pub struct DosingRegimen {
    events: Vec<DoseEvent>,
}

impl DosingRegimen {
    pub fn from_config(config: &DosingConfig, variant: ModelVariant) -> PbpkResult<Self> {
        let route = match config.route {
            DosingRoute::Oral => DoseRoute::Oral,
            DosingRoute::IvBolus => DoseRoute::IvBolus {
                target: config.target.unwrap_or(Compartment::Venous),
            },
        };

        let events = config
            .times
            .iter()
            .map(|&time| DoseEvent {
                time,
                amount: config.amount,
                route,
            })
            .collect();

        Self::new(events, variant)
    }

    pub fn new(mut events: Vec<DoseEvent>, variant: ModelVariant) -> PbpkResult<Self> {
        for event in &events {
            if !event.time.is_finite() || event.time < 0.0 {
                return Err(PbpkError::Configuration(format!(
                    "Dose time must be finite and non-negative, got {}",
                    event.time
                )));
            }
            if !event.amount.is_finite() || event.amount <= 0.0 {
                return Err(PbpkError::Configuration(format!(
                    "Dose amount must be positive, got {}",
                    event.amount
                )));
            }
            let compartment = event.route.compartment();
            if !variant.compartments().contains(&compartment) {
                return Err(PbpkError::Configuration(format!(
                    "The {} model has no {} compartment to dose into",
                    variant, compartment
                )));
            }
        }

        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Self { events })
    }

    pub fn events(&self) -> &[DoseEvent] {
        &self.events
    }

    /// Total amount given at or before `time`.
    pub fn dosed_by(&self, time: f64) -> f64 {
        self.events
            .iter()
            .filter(|event| event.time <= time)
            .map(|event| event.amount)
            .sum()
    }

    pub fn total(&self) -> f64 {
        self.events.iter().map(|event| event.amount).sum()
    }

    /// Warn about doses no sample will ever see.
    pub fn check_horizon(&self, end: f64) {
        let late = self.events.iter().filter(|event| event.time > end).count();
        if late > 0 {
            warn!(
                "{} dose(s) after the last time point ({} h) will not be simulated",
                late, end
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(route: DosingRoute, times: Vec<f64>) -> DosingConfig {
        DosingConfig {
            route,
            amount: 100.0,
            times,
            target: None,
        }
    }

    #[test]
    fn test_dosing_regimen_creation() {
        let config = config(DosingRoute::IvBolus, vec![12.0, 0.0, 24.0]);
        let regimen = DosingRegimen::from_config(&config, ModelVariant::Simple).unwrap();
        let times: Vec<f64> = regimen.events().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0.0, 12.0, 24.0]);
        assert_eq!(regimen.events()[0].route.compartment(), Compartment::Venous);
        assert_eq!(regimen.total(), 300.0);
        assert_eq!(regimen.dosed_by(12.0), 200.0);
        assert_eq!(regimen.dosed_by(11.9), 100.0);
    }

    #[test]
    fn test_oral_regimen_targets_depot() {
        let config = config(DosingRoute::Oral, vec![0.0]);
        let regimen = DosingRegimen::from_config(&config, ModelVariant::WholeBody).unwrap();
        assert_eq!(regimen.events()[0].route, DoseRoute::Oral);
        assert_eq!(regimen.events()[0].route.compartment(), Compartment::Depot);

        assert!(matches!(
            DosingRegimen::from_config(&config, ModelVariant::Simple),
            Err(PbpkError::Configuration(_))
        ));
    }

    #[test]
    fn test_arterial_bolus() {
        let mut config = config(DosingRoute::IvBolus, vec![0.0]);
        config.target = Some(Compartment::Arterial);
        let regimen = DosingRegimen::from_config(&config, ModelVariant::Hepatic).unwrap();
        assert_eq!(
            regimen.events()[0].route,
            DoseRoute::IvBolus {
                target: Compartment::Arterial
            }
        );
    }

    #[test]
    fn test_invalid_events_rejected() {
        let bad_time = DoseEvent {
            time: -1.0,
            amount: 10.0,
            route: DoseRoute::Oral,
        };
        assert!(DosingRegimen::new(vec![bad_time], ModelVariant::WholeBody).is_err());

        let bad_amount = DoseEvent {
            time: 0.0,
            amount: f64::NAN,
            route: DoseRoute::Oral,
        };
        assert!(DosingRegimen::new(vec![bad_amount], ModelVariant::WholeBody).is_err());
    }
}
