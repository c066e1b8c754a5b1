use crate::core::pit_strategy::PitStopType;
use serde::{Deserialize, Serialize};

/// Pace and energy temperament of a car, fixed for the whole race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyProfile {
    Aggressive,
    Balanced,
    Conservative,
}

impl StrategyProfile {
    /// The method returns the relative pace target of the profile. Aggressive
    /// cars run faster laps and pay for it in consumption, conservative cars
    /// run slower and save energy.
    pub fn pace_factor(&self) -> f64 {
        match self {
            StrategyProfile::Aggressive => 1.08,
            StrategyProfile::Balanced => 1.00,
            StrategyProfile::Conservative => 0.92,
        }
    }

    /// The method returns the default grid assignment when no explicit profile
    /// list is configured.
    pub fn from_grid_slot(slot: usize) -> StrategyProfile {
        match slot % 3 {
            0 => StrategyProfile::Aggressive,
            1 => StrategyProfile::Balanced,
            _ => StrategyProfile::Conservative,
        }
    }
}

/// Reason a car dropped out of the race. DNF is a normal terminal condition,
/// not an error: the car stays in the entity set for the final classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnfReason {
    Crash,
    Other,
}

/// CarState is the complete per-car state, stored in one array indexed by car
/// id and owned exclusively by the race orchestrator. The engines only ever see
/// copies of individual fields and return outcome values; all writes happen in
/// the orchestrator.
#[derive(Debug, Clone)]
pub struct CarState {
    pub id: usize,
    pub position_rank: u32,
    pub distance_along_track: f64,
    pub lap: u32,
    pub total_elapsed_time: f64,
    pub expected_lap_time: f64,
    pub current_speed: f64,
    pub energy_remaining: f64,
    pub active: bool,
    pub dnf_reason: Option<DnfReason>,
    pub attack_mode_activations_used: u32,
    pub pit_stop_count: u32,
    pub skill_multiplier: f64,
    pub strategy_profile: StrategyProfile,
    // decided stops wait here until the car next crosses the finish line
    pub pit_pending: Option<PitStopType>,
    // set after a failed slipstream lunge, consumed by the repair advisor
    pub incident_flag: bool,
    // armed by the per-lap activation policy, fires inside the activation zone
    pub attack_intent: bool,
}

impl CarState {
    pub fn new(
        id: usize,
        strategy_profile: StrategyProfile,
        expected_lap_time: f64,
        skill_multiplier: f64,
        initial_energy: f64,
    ) -> CarState {
        CarState {
            id,
            position_rank: id as u32 + 1,
            distance_along_track: 0.0,
            lap: 0,
            total_elapsed_time: 0.0,
            expected_lap_time,
            current_speed: 0.0,
            energy_remaining: initial_energy,
            active: true,
            dnf_reason: None,
            attack_mode_activations_used: 0,
            pit_stop_count: 0,
            skill_multiplier,
            strategy_profile,
            pit_pending: None,
            incident_flag: false,
            attack_intent: false,
        }
    }

    /// The method returns the total race progress in meters (laps completed
    /// plus the distance into the current lap). The ranking is a single stable
    /// sort over this value.
    pub fn progress(&self, track_length: f64) -> f64 {
        self.lap as f64 * track_length + self.distance_along_track
    }

    /// The method places the car at the given total progress, keeping
    /// `distance_along_track` within [0, track_length).
    pub fn set_progress(&mut self, progress: f64, track_length: f64) {
        let lap = (progress / track_length).floor();
        self.lap = lap as u32;
        self.distance_along_track = progress - lap * track_length;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn progress_combines_lap_and_distance() {
        let mut car = CarState::new(3, StrategyProfile::Balanced, 64.0, 1.0, 52.0);
        car.lap = 2;
        car.distance_along_track = 500.0;
        assert_relative_eq!(car.progress(2400.0), 5300.0);
    }

    #[test]
    fn set_progress_keeps_distance_on_track() {
        let mut car = CarState::new(0, StrategyProfile::Balanced, 64.0, 1.0, 52.0);
        car.set_progress(5300.0, 2400.0);
        assert_eq!(car.lap, 2);
        assert_relative_eq!(car.distance_along_track, 500.0);
        assert!(car.distance_along_track < 2400.0);
    }
}
