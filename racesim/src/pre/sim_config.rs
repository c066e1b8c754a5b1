use crate::core::car::StrategyProfile;
use crate::core::track::TrackPars;
use serde::Deserialize;
use thiserror::Error;

// Hard limits checked before any simulation state is created.
pub const NUM_CARS_MIN: usize = 10;
pub const NUM_CARS_MAX: usize = 20;
pub const TIMESTEP_MIN: f64 = 0.1;
pub const TIMESTEP_MAX: f64 = 0.5;

/// ConfigError covers every way the inserted parameters can be rejected up front.
/// Validation runs before the race is constructed, so a rejected parameter set
/// never leaves partial state behind.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("number of cars must be within [{min}, {max}], but is {given}")]
    NumCars { given: usize, min: usize, max: usize },

    #[error("timestep size must be within [{min:.1}, {max:.1}] s, but is {given:.3} s")]
    TimestepSize { given: f64, min: f64, max: f64 },

    #[error("race duration must be positive, but is {0:.1} min")]
    RaceDuration(f64),

    #[error("{name} interval must be positive, but is {given:.3} s")]
    Interval { name: &'static str, given: f64 },

    #[error("unknown track {0:?}")]
    UnknownTrack(String),

    #[error("attack zone [{0:.1} m, {1:.1} m] does not fit on a {2:.1} m track")]
    AttackZone(f64, f64, f64),
}

/// * `num_cars` - Number of cars on the grid
/// * `track_name` - Track to load from input/tracks/ when no inline track parameters are given
/// * `race_duration_min` - (min) Race duration; the race ends at the first tick past this limit
/// * `random_seed` - Master seed; all subsystem random streams are derived from it
/// * `overtaking_interval_s` - (s) Spacing between overtaking passes
/// * `history_interval_s` - (s) Spacing between position history snapshots
/// * `skill_spread` - Half-width of the uniform per-car skill multiplier band around 1.0
/// * `lap_time_jitter` - Relative standard deviation of the per-car lap time perturbation
/// * `strategy_profiles` - Grid assignment of strategy profiles; cycled when shorter than the grid
#[derive(Debug, Deserialize, Clone)]
pub struct RacePars {
    pub num_cars: usize,
    #[serde(default)]
    pub track_name: Option<String>,
    pub race_duration_min: f64,
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    #[serde(default = "default_overtaking_interval")]
    pub overtaking_interval_s: f64,
    #[serde(default = "default_history_interval")]
    pub history_interval_s: f64,
    #[serde(default = "default_skill_spread")]
    pub skill_spread: f64,
    #[serde(default = "default_lap_time_jitter")]
    pub lap_time_jitter: f64,
    #[serde(default)]
    pub strategy_profiles: Vec<StrategyProfile>,
}

fn default_random_seed() -> u64 {
    42
}

fn default_overtaking_interval() -> f64 {
    5.0
}

fn default_history_interval() -> f64 {
    10.0
}

fn default_skill_spread() -> f64 {
    0.02
}

fn default_lap_time_jitter() -> f64 {
    0.01
}

/// * `p_safety_car` - Per-lap deployment probability while no safety car is out
/// * `sc_laps_min`/`sc_laps_max` - (laps) Deployment duration band
/// * `sc_speed` - (m/s) Pace every running car is clamped to while deployed
/// * `p_crash` - Per-car per-lap crash probability
/// * `p_crash_triggers_sc` - Secondary deployment probability after a crash
/// * `p_weather_change` - Per-lap probability of the weather toggling
/// * `grip_loss_min`/`grip_loss_max` - Friction reduction band applied when it starts raining
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EventPars {
    pub p_safety_car: f64,
    pub sc_laps_min: u32,
    pub sc_laps_max: u32,
    pub sc_speed: f64,
    pub p_crash: f64,
    pub p_crash_triggers_sc: f64,
    pub p_weather_change: f64,
    pub grip_loss_min: f64,
    pub grip_loss_max: f64,
}

impl Default for EventPars {
    fn default() -> Self {
        EventPars {
            p_safety_car: 0.03,
            sc_laps_min: 3,
            sc_laps_max: 8,
            sc_speed: 80.0 / 3.6,
            p_crash: 0.015,
            p_crash_triggers_sc: 0.5,
            p_weather_change: 0.02,
            grip_loss_min: 0.15,
            grip_loss_max: 0.30,
        }
    }
}

/// * `min_speed_diff_kmh` - (km/h) Below this closing speed no attempt is resolved
/// * `attempt_window_s` - (s) Maximum gap at which the orchestrator raises an attempt
/// * `slipstream_window_s` - (s) Gap within which the slipstream bonus applies
/// * `slipstream_bonus` - Relative increase of the effective speed differential in the slipstream
/// * `p_band_low`/`p_band_mid`/`p_band_high` - Success probability per differential band
/// * `attack_mode_shift` - Flat probability shift when exactly one side runs attack mode
/// * `p_cap`/`p_floor` - Clamp of the final success probability
/// * `time_gain_min_s`/`time_gain_max_s` - (s) Band the attacker's gain is drawn from on success
/// * `overtake_margin_m` - (m) Forward distance adjustment placing the attacker past the defender
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OvertakePars {
    pub min_speed_diff_kmh: f64,
    pub attempt_window_s: f64,
    pub slipstream_window_s: f64,
    pub slipstream_bonus: f64,
    pub p_band_low: f64,
    pub p_band_mid: f64,
    pub p_band_high: f64,
    pub attack_mode_shift: f64,
    pub p_cap: f64,
    pub p_floor: f64,
    pub time_gain_min_s: f64,
    pub time_gain_max_s: f64,
    pub overtake_margin_m: f64,
}

impl Default for OvertakePars {
    fn default() -> Self {
        OvertakePars {
            min_speed_diff_kmh: 5.0,
            attempt_window_s: 2.0,
            slipstream_window_s: 1.0,
            slipstream_bonus: 0.05,
            p_band_low: 0.20,
            p_band_mid: 0.50,
            p_band_high: 0.80,
            attack_mode_shift: 0.15,
            p_cap: 0.95,
            p_floor: 0.05,
            time_gain_min_s: 0.3,
            time_gain_max_s: 0.8,
            overtake_margin_m: 1.5,
        }
    }
}

/// * `max_activations` - Activations available per car per race
/// * `duration_s` - (s) Boost duration of a single activation
/// * `speed_bonus` - Relative speed increase while the boost is running
/// * `power_boost_kw` - (kW) Nominal extra power, reported in activation records
/// * `energy_surcharge` - Relative extra energy consumption while boosted
/// * `time_loss_min_s`/`time_loss_max_s` - (s) One-time deployment cost band, fixed per car
/// * `cooldown_s` - (s) Mandatory gap between expiry and the next activation (0 = back-to-back)
/// * `p_activate_base`/`p_activate_midfield`/`p_activate_leader` - Per-lap arming chance by position
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AttackModePars {
    pub max_activations: u32,
    pub duration_s: f64,
    pub speed_bonus: f64,
    pub power_boost_kw: f64,
    pub energy_surcharge: f64,
    pub time_loss_min_s: f64,
    pub time_loss_max_s: f64,
    pub cooldown_s: f64,
    pub p_activate_base: f64,
    pub p_activate_midfield: f64,
    pub p_activate_leader: f64,
}

impl Default for AttackModePars {
    fn default() -> Self {
        AttackModePars {
            max_activations: 2,
            duration_s: 240.0,
            speed_bonus: 0.08,
            power_boost_kw: 50.0,
            energy_surcharge: 0.40,
            time_loss_min_s: 0.5,
            time_loss_max_s: 1.0,
            cooldown_s: 0.0,
            p_activate_base: 0.30,
            p_activate_midfield: 0.45,
            p_activate_leader: 0.15,
        }
    }
}

/// * `energy_floor` - (kWh) Absolute level below which a stop is always advised
/// * `energy_stop_range_s`/`repair_stop_range_s`/`drive_through_range_s` - (s) Duration bands
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PitPars {
    pub energy_floor: f64,
    pub energy_stop_range_s: [f64; 2],
    pub repair_stop_range_s: [f64; 2],
    pub drive_through_range_s: [f64; 2],
}

impl Default for PitPars {
    fn default() -> Self {
        PitPars {
            energy_floor: 3.0,
            energy_stop_range_s: [30.0, 40.0],
            repair_stop_range_s: [25.0, 35.0],
            drive_through_range_s: [10.0, 15.0],
        }
    }
}

/// * `initial_energy` - (kWh) Battery level every car starts with
/// * `reset_ceiling` - (kWh) Level an energy stop restores
/// * `base_rate_per_min` - (kWh/min) Consumption of a nominal car at the reference speed
/// * `reference_speed` - (m/s) Speed the base rate is calibrated at
/// * `low_energy_threshold` - (kWh) Soft level triggering the speed penalty and pit evaluation
/// * `low_energy_penalty` - Relative speed reduction below the soft threshold
/// * `aggressive_surcharge`/`conservative_discount` - Consumption shift per strategy profile
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EnergyPars {
    pub initial_energy: f64,
    pub reset_ceiling: f64,
    pub base_rate_per_min: f64,
    pub reference_speed: f64,
    pub low_energy_threshold: f64,
    pub low_energy_penalty: f64,
    pub aggressive_surcharge: f64,
    pub conservative_discount: f64,
}

impl Default for EnergyPars {
    fn default() -> Self {
        EnergyPars {
            initial_energy: 52.0,
            reset_ceiling: 52.0,
            base_rate_per_min: 0.75,
            reference_speed: 50.0,
            low_energy_threshold: 8.0,
            low_energy_penalty: 0.08,
            aggressive_surcharge: 0.10,
            conservative_discount: 0.10,
        }
    }
}

/// SimPars bundles all parameter structs of a single simulation run. It is
/// constructed once, validated once and then only passed by reference.
#[derive(Debug, Deserialize, Clone)]
pub struct SimPars {
    pub race_pars: RacePars,
    pub track_pars: TrackPars,
    #[serde(default)]
    pub event_pars: EventPars,
    #[serde(default)]
    pub overtake_pars: OvertakePars,
    #[serde(default)]
    pub attack_pars: AttackModePars,
    #[serde(default)]
    pub pit_pars: PitPars,
    #[serde(default)]
    pub energy_pars: EnergyPars,
}

impl SimPars {
    /// The method checks all parameter ranges that would otherwise corrupt the
    /// simulation. It must be called before a race is created.
    pub fn validate(&self, timestep_size: f64) -> Result<(), ConfigError> {
        if self.race_pars.num_cars < NUM_CARS_MIN || self.race_pars.num_cars > NUM_CARS_MAX {
            return Err(ConfigError::NumCars {
                given: self.race_pars.num_cars,
                min: NUM_CARS_MIN,
                max: NUM_CARS_MAX,
            });
        }

        if timestep_size < TIMESTEP_MIN || timestep_size > TIMESTEP_MAX {
            return Err(ConfigError::TimestepSize {
                given: timestep_size,
                min: TIMESTEP_MIN,
                max: TIMESTEP_MAX,
            });
        }

        if self.race_pars.race_duration_min <= 0.0 {
            return Err(ConfigError::RaceDuration(self.race_pars.race_duration_min));
        }

        if self.race_pars.overtaking_interval_s <= 0.0 {
            return Err(ConfigError::Interval {
                name: "overtaking",
                given: self.race_pars.overtaking_interval_s,
            });
        }

        if self.race_pars.history_interval_s <= 0.0 {
            return Err(ConfigError::Interval {
                name: "history",
                given: self.race_pars.history_interval_s,
            });
        }

        let zone = self.track_pars.attack_zone;
        let length = self.track_pars.length;
        if zone[0] < 0.0 || zone[0] >= length || zone[1] < 0.0 || zone[1] >= length {
            return Err(ConfigError::AttackZone(zone[0], zone[1], length));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::track::TrackPars;

    fn valid_pars() -> SimPars {
        SimPars {
            race_pars: RacePars {
                num_cars: 12,
                track_name: None,
                race_duration_min: 45.0,
                random_seed: 42,
                overtaking_interval_s: 5.0,
                history_interval_s: 10.0,
                skill_spread: 0.02,
                lap_time_jitter: 0.01,
                strategy_profiles: Vec::new(),
            },
            track_pars: TrackPars {
                name: "Tempelhof".to_owned(),
                length: 2400.0,
                reference_lap_time: 64.0,
                attack_zone: [480.0, 600.0],
                friction_profile: Vec::new(),
                friction_csv: None,
            },
            event_pars: EventPars::default(),
            overtake_pars: OvertakePars::default(),
            attack_pars: AttackModePars::default(),
            pit_pars: PitPars::default(),
            energy_pars: EnergyPars::default(),
        }
    }

    #[test]
    fn accepts_valid_parameters() {
        assert!(valid_pars().validate(0.2).is_ok());
    }

    #[test]
    fn rejects_grid_outside_allowed_range() {
        let mut pars = valid_pars();
        pars.race_pars.num_cars = 5;
        assert!(matches!(
            pars.validate(0.2),
            Err(ConfigError::NumCars { given: 5, .. })
        ));
    }

    #[test]
    fn rejects_timestep_outside_allowed_range() {
        let pars = valid_pars();
        assert!(matches!(
            pars.validate(0.05),
            Err(ConfigError::TimestepSize { .. })
        ));
        assert!(matches!(
            pars.validate(0.8),
            Err(ConfigError::TimestepSize { .. })
        ));
    }

    #[test]
    fn rejects_attack_zone_off_track() {
        let mut pars = valid_pars();
        pars.track_pars.attack_zone = [2300.0, 2600.0];
        assert!(matches!(
            pars.validate(0.2),
            Err(ConfigError::AttackZone(..))
        ));
    }
}
