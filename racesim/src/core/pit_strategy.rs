use crate::pre::sim_config::PitPars;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitStopType {
    Energy,
    Repair,
    DriveThrough,
}

/// One executed pit stop. The advisor only books the stop; resetting the car's
/// energy, adding the duration to its elapsed time and incrementing its stop
/// counter is the caller's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PitStopRecord {
    pub car_id: usize,
    pub pit_type: PitStopType,
    pub lap: u32,
    pub entry_time: f64,
    pub exit_time: f64,
    pub duration: f64,
}

/// PitStrategyAdvisor answers two questions per car: should it pit, and how
/// long does the stop take. The decision functions are pure; only
/// `execute_pit_stop` consumes from the owned seeded stream.
#[derive(Debug)]
pub struct PitStrategyAdvisor {
    pars: PitPars,
    track_length: f64,
    rng: ChaCha8Rng,
    stops: Vec<PitStopRecord>,
}

impl PitStrategyAdvisor {
    pub fn new(pars: PitPars, track_length: f64, rng: ChaCha8Rng) -> PitStrategyAdvisor {
        PitStrategyAdvisor {
            pars,
            track_length,
            rng,
            stops: Vec::new(),
        }
    }

    /// The method decides whether the car needs an energy stop: either the
    /// level is below the absolute floor, or projecting the average consumption
    /// so far over the remaining distance lands below zero at the finish.
    pub fn should_pit_energy(
        &self,
        _car: usize,
        energy_remaining: f64,
        initial_energy: f64,
        race_distance_remaining: f64,
        lap: u32,
    ) -> (bool, String) {
        if energy_remaining < self.pars.energy_floor {
            return (
                true,
                format!(
                    "energy {:.1} kWh is below the {:.1} kWh floor",
                    energy_remaining, self.pars.energy_floor
                ),
            );
        }

        // average consumption so far; before the first completed lap there is
        // no usable rate, the floor check above has to carry that phase
        if lap > 0 {
            let distance_covered = lap as f64 * self.track_length;
            let rate_per_m = (initial_energy - energy_remaining) / distance_covered;
            let projected = energy_remaining - rate_per_m * race_distance_remaining;

            if projected < 0.0 {
                return (
                    true,
                    format!(
                        "projected energy at the finish is {:.1} kWh",
                        projected
                    ),
                );
            }
        }

        (false, "sufficient energy".to_owned())
    }

    /// The method decides whether the car needs a repair stop. The incident
    /// flag is raised by the caller for non-fatal contact; a car that was
    /// marked DNF never reaches this point.
    pub fn should_pit_repair(&self, _car: usize, incident_flag: bool) -> bool {
        incident_flag
    }

    /// The method books a pit stop and returns its record. The duration is
    /// drawn from the configured band of the stop type.
    pub fn execute_pit_stop(
        &mut self,
        car: usize,
        pit_type: PitStopType,
        lap: u32,
        race_time: f64,
    ) -> PitStopRecord {
        let range = match pit_type {
            PitStopType::Energy => self.pars.energy_stop_range_s,
            PitStopType::Repair => self.pars.repair_stop_range_s,
            PitStopType::DriveThrough => self.pars.drive_through_range_s,
        };
        let duration = self.rng.gen_range(range[0]..=range[1]);

        let record = PitStopRecord {
            car_id: car,
            pit_type,
            lap,
            entry_time: race_time,
            exit_time: race_time + duration,
            duration,
        };
        self.stops.push(record.clone());

        record
    }

    pub fn pit_stop_count(&self, car: usize) -> u32 {
        self.stops.iter().filter(|s| s.car_id == car).count() as u32
    }

    pub fn total_pit_time(&self, car: usize) -> f64 {
        self.stops
            .iter()
            .filter(|s| s.car_id == car)
            .map(|s| s.duration)
            .sum()
    }

    pub fn stops(&self) -> &[PitStopRecord] {
        &self.stops
    }

    pub fn energy_floor(&self) -> f64 {
        self.pars.energy_floor
    }
}
