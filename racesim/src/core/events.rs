use crate::post::race_result::RaceEvent;
use crate::pre::sim_config::EventPars;
use log::{info, warn};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

// hard bounds of the weather friction multiplier, violated draws are dropped
const FRICTION_MIN: f64 = 0.7;
const FRICTION_MAX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Dry,
    Wet,
}

/// EventReport is the outcome of one lap's event resolution. It carries no
/// references into the engine; marking crashed cars inactive and updating the
/// shared race state is the caller's responsibility.
#[derive(Debug, Clone)]
pub struct EventReport {
    pub safety_car_deployed: bool,
    pub crashed_cars: Vec<usize>,
    pub weather_changed: bool,
    pub new_friction: f64,
}

/// Cumulative event counts for the result record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub total_safety_cars: u32,
    pub total_crashes: u32,
    pub total_weather_changes: u32,
}

/// RaceEventEngine resolves the per-lap random events: safety car deployment,
/// crashes and weather changes. It owns the safety car timer, the weather state
/// and one seeded random stream. The draw order within a lap is fixed (safety
/// car, then crashes in ascending car id order, then weather), so a given seed
/// replays bit-identically.
#[derive(Debug)]
pub struct RaceEventEngine {
    pars: EventPars,
    rng: ChaCha8Rng,
    safety_car_active: bool,
    sc_remaining_laps: u32,
    weather: Weather,
    friction_multiplier: f64,
    total_safety_cars: u32,
    total_crashes: u32,
    total_weather_changes: u32,
    event_log: Vec<RaceEvent>,
}

impl RaceEventEngine {
    pub fn new(pars: EventPars, rng: ChaCha8Rng) -> RaceEventEngine {
        RaceEventEngine {
            pars,
            rng,
            safety_car_active: false,
            sc_remaining_laps: 0,
            weather: Weather::Dry,
            friction_multiplier: 1.0,
            total_safety_cars: 0,
            total_crashes: 0,
            total_weather_changes: 0,
            event_log: Vec::new(),
        }
    }

    /// The method resolves the random events of one race lap. It must be called
    /// exactly once per lap of the race (not per car).
    pub fn check_lap_events(
        &mut self,
        lap: u32,
        race_time: f64,
        active_car_ids: &[usize],
    ) -> EventReport {
        let mut report = EventReport {
            safety_car_deployed: false,
            crashed_cars: Vec::new(),
            weather_changed: false,
            new_friction: self.friction_multiplier,
        };

        // 1) safety car deployment (only while none is out)
        if !self.safety_car_active && self.rng.gen::<f64>() < self.pars.p_safety_car {
            self.deploy_safety_car(lap, race_time);
            report.safety_car_deployed = true;
        }

        // 2) crashes, one independent draw per active car in ascending id order
        for &car_id in active_car_ids {
            if self.rng.gen::<f64>() < self.pars.p_crash {
                self.total_crashes += 1;
                self.event_log.push(RaceEvent {
                    kind: "Crash".to_owned(),
                    lap,
                    time_s: race_time,
                    cars: vec![car_id],
                });
                report.crashed_cars.push(car_id);

                // crash debris can bring the safety car out as well
                if !self.safety_car_active
                    && self.rng.gen::<f64>() < self.pars.p_crash_triggers_sc
                {
                    self.deploy_safety_car(lap, race_time);
                    report.safety_car_deployed = true;
                }
            }
        }

        // 3) weather toggle
        if self.rng.gen::<f64>() < self.pars.p_weather_change {
            if let Some(new_friction) = self.resolve_weather_change(lap, race_time) {
                report.weather_changed = true;
                report.new_friction = new_friction;
            }
        }

        report
    }

    /// The method advances the safety car timer by one race lap and clears the
    /// deployment when its drawn duration is over.
    pub fn update_safety_car(&mut self, lap: u32) {
        if !self.safety_car_active {
            return;
        }

        self.sc_remaining_laps = self.sc_remaining_laps.saturating_sub(1);

        if self.sc_remaining_laps == 0 {
            self.safety_car_active = false;
            info!("safety car returns to the pits on lap {}", lap);
            self.event_log.push(RaceEvent {
                kind: "SC_IN".to_owned(),
                lap,
                time_s: 0.0,
                cars: Vec::new(),
            });
        }
    }

    /// The method returns the pace every running car is clamped to while the
    /// safety car is deployed.
    pub fn get_safety_car_speed(&self) -> f64 {
        self.pars.sc_speed
    }

    pub fn safety_car_active(&self) -> bool {
        self.safety_car_active
    }

    pub fn safety_car_remaining_laps(&self) -> u32 {
        self.sc_remaining_laps
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    pub fn friction_multiplier(&self) -> f64 {
        self.friction_multiplier
    }

    pub fn summary(&self) -> EventSummary {
        EventSummary {
            total_safety_cars: self.total_safety_cars,
            total_crashes: self.total_crashes,
            total_weather_changes: self.total_weather_changes,
        }
    }

    pub fn event_log(&self) -> &[RaceEvent] {
        &self.event_log
    }

    fn deploy_safety_car(&mut self, lap: u32, race_time: f64) {
        if self.pars.sc_laps_min > self.pars.sc_laps_max {
            // malformed duration band, skip this deployment for the lap
            warn!(
                "safety car duration band [{}, {}] is malformed, deployment skipped",
                self.pars.sc_laps_min, self.pars.sc_laps_max
            );
            return;
        }

        self.safety_car_active = true;
        self.sc_remaining_laps = self
            .rng
            .gen_range(self.pars.sc_laps_min..=self.pars.sc_laps_max);
        self.total_safety_cars += 1;

        info!(
            "safety car deployed on lap {} for {} laps",
            lap, self.sc_remaining_laps
        );
        self.event_log.push(RaceEvent {
            kind: "SC_DEPLOYED".to_owned(),
            lap,
            time_s: race_time,
            cars: Vec::new(),
        });
    }

    fn resolve_weather_change(&mut self, lap: u32, race_time: f64) -> Option<f64> {
        let (new_weather, new_friction, kind) = match self.weather {
            Weather::Dry => {
                let grip_loss = self
                    .rng
                    .gen_range(self.pars.grip_loss_min..=self.pars.grip_loss_max);
                (Weather::Wet, 1.0 - grip_loss, "WeatherRainStart")
            }
            Weather::Wet => (Weather::Dry, 1.0, "WeatherDryStart"),
        };

        // a friction value outside the hard band would corrupt the whole race,
        // drop the single event and keep going
        if !(FRICTION_MIN..=FRICTION_MAX).contains(&new_friction) {
            warn!(
                "drawn friction multiplier {:.3} is outside [{:.2}, {:.2}], weather change skipped",
                new_friction, FRICTION_MIN, FRICTION_MAX
            );
            return None;
        }

        self.weather = new_weather;
        self.friction_multiplier = new_friction;
        self.total_weather_changes += 1;

        info!(
            "weather change on lap {}: now {:?}, friction multiplier {:.2}",
            lap, new_weather, new_friction
        );
        self.event_log.push(RaceEvent {
            kind: kind.to_owned(),
            lap,
            time_s: race_time,
            cars: Vec::new(),
        });

        Some(new_friction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn engine(pars: EventPars) -> RaceEventEngine {
        RaceEventEngine::new(pars, ChaCha8Rng::seed_from_u64(42))
    }

    fn silent_pars() -> EventPars {
        EventPars {
            p_safety_car: 0.0,
            p_crash: 0.0,
            p_crash_triggers_sc: 0.0,
            p_weather_change: 0.0,
            ..EventPars::default()
        }
    }

    #[test]
    fn zero_probabilities_produce_no_events() {
        let mut engine = engine(silent_pars());
        let ids: Vec<usize> = (0..20).collect();

        for lap in 1..=50 {
            let report = engine.check_lap_events(lap, lap as f64 * 64.0, &ids);
            assert!(!report.safety_car_deployed);
            assert!(report.crashed_cars.is_empty());
            assert!(!report.weather_changed);
        }

        let summary = engine.summary();
        assert_eq!(summary.total_safety_cars, 0);
        assert_eq!(summary.total_crashes, 0);
        assert_eq!(summary.total_weather_changes, 0);
        assert!(engine.event_log().is_empty());
    }

    #[test]
    fn certain_crash_hits_exactly_the_active_cars() {
        let mut pars = silent_pars();
        pars.p_crash = 1.0;
        let mut engine = engine(pars);

        let report = engine.check_lap_events(3, 200.0, &[5]);
        assert_eq!(report.crashed_cars, vec![5]);
        assert_eq!(engine.summary().total_crashes, 1);
    }

    #[test]
    fn safety_car_runs_its_drawn_duration_and_clears() {
        let mut pars = silent_pars();
        pars.p_safety_car = 1.0;
        let mut engine = engine(pars.clone());

        let report = engine.check_lap_events(1, 0.0, &[]);
        assert!(report.safety_car_deployed);
        assert!(engine.safety_car_active());

        let duration = engine.safety_car_remaining_laps();
        assert!((pars.sc_laps_min..=pars.sc_laps_max).contains(&duration));

        for _ in 0..duration - 1 {
            engine.update_safety_car(2);
            assert!(engine.safety_car_active());
        }
        engine.update_safety_car(2);
        assert!(!engine.safety_car_active());
    }

    #[test]
    fn weather_toggles_between_dry_and_wet() {
        let mut pars = silent_pars();
        pars.p_weather_change = 1.0;
        let mut engine = engine(pars.clone());

        let report = engine.check_lap_events(1, 0.0, &[]);
        assert!(report.weather_changed);
        assert_eq!(engine.weather(), Weather::Wet);
        assert!(report.new_friction >= 1.0 - pars.grip_loss_max);
        assert!(report.new_friction <= 1.0 - pars.grip_loss_min);

        let report = engine.check_lap_events(2, 64.0, &[]);
        assert!(report.weather_changed);
        assert_eq!(engine.weather(), Weather::Dry);
        assert_eq!(report.new_friction, 1.0);
    }

    #[test]
    fn out_of_band_friction_draw_is_skipped() {
        let mut pars = silent_pars();
        pars.p_weather_change = 1.0;
        pars.grip_loss_min = 0.5;
        pars.grip_loss_max = 0.6;
        let mut engine = engine(pars);

        let report = engine.check_lap_events(1, 0.0, &[]);
        assert!(!report.weather_changed);
        assert_eq!(engine.weather(), Weather::Dry);
        assert_eq!(engine.summary().total_weather_changes, 0);
    }

    #[test]
    fn identical_seed_replays_identical_reports() {
        let pars = EventPars::default();
        let mut a = RaceEventEngine::new(pars.clone(), ChaCha8Rng::seed_from_u64(7));
        let mut b = RaceEventEngine::new(pars, ChaCha8Rng::seed_from_u64(7));
        let ids: Vec<usize> = (0..20).collect();

        for lap in 1..=100 {
            let ra = a.check_lap_events(lap, lap as f64 * 64.0, &ids);
            let rb = b.check_lap_events(lap, lap as f64 * 64.0, &ids);
            assert_eq!(ra.safety_car_deployed, rb.safety_car_deployed);
            assert_eq!(ra.crashed_cars, rb.crashed_cars);
            assert_eq!(ra.weather_changed, rb.weather_changed);
            assert_eq!(ra.new_friction, rb.new_friction);
            a.update_safety_car(lap);
            b.update_safety_car(lap);
        }
    }
}
