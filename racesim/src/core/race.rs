use crate::core::attack_mode::AttackModeController;
use crate::core::car::{CarState, DnfReason, StrategyProfile};
use crate::core::events::{RaceEventEngine, Weather};
use crate::core::overtaking::OvertakingResolver;
use crate::core::pit_strategy::{PitStopType, PitStrategyAdvisor};
use crate::core::track::TrackProfile;
use crate::post::race_result::{ClassificationEntry, DnfEntry, PositionSnapshot, RaceResult};
use crate::pre::sim_config::{AttackModePars, EnergyPars, OvertakePars, SimPars};
use helpers::general::{argsort, SortOrder};
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

// Fixed offsets applied to the master seed, one per random stream. Each stream
// consumes draws in a documented order, so a given seed and parameter set
// replays bit-identically no matter how the per-car kinematics are computed.
const SEED_OFFSET_EVENTS: u64 = 1;
const SEED_OFFSET_OVERTAKING: u64 = 2;
const SEED_OFFSET_STRATEGY: u64 = 3;
const SEED_OFFSET_PIT: u64 = 4;
const SEED_OFFSET_GRID: u64 = 5;

/// Shared race-wide state, mutated only by event outcomes and lap bookkeeping.
#[derive(Debug, Clone)]
pub struct RaceState {
    pub race_time: f64,
    pub safety_car_active: bool,
    pub safety_car_remaining_laps: u32,
    pub weather: Weather,
    pub friction_multiplier: f64,
    pub leader_id: usize,
    pub current_lap: u32,
}

/// Race owns all car and race state and drives the time-step loop. The four
/// engines never hold references into this state: they receive inputs per call
/// and return outcome values, and the orchestrator applies every mutation.
#[derive(Debug)]
pub struct Race {
    pub timestep_size: f64,
    race_duration: f64,
    overtaking_interval: f64,
    history_interval: f64,
    random_seed: u64,
    pub track: TrackProfile,
    pub cars_list: Vec<CarState>,
    pub race_state: RaceState,
    events: RaceEventEngine,
    overtaking: OvertakingResolver,
    attack_modes: AttackModeController,
    pit_advisor: PitStrategyAdvisor,
    strategy_rng: ChaCha8Rng,
    overtake_pars: OvertakePars,
    attack_pars: AttackModePars,
    energy_pars: EnergyPars,
    next_overtake_time: f64,
    next_history_time: f64,
    history: Vec<PositionSnapshot>,
}

impl Race {
    pub fn new(sim_pars: &SimPars, timestep_size: f64) -> Race {
        let track = TrackProfile::new(&sim_pars.track_pars);
        let race_pars = &sim_pars.race_pars;
        let master_seed = race_pars.random_seed;

        let events = RaceEventEngine::new(
            sim_pars.event_pars.clone(),
            ChaCha8Rng::seed_from_u64(master_seed.wrapping_add(SEED_OFFSET_EVENTS)),
        );
        let overtaking = OvertakingResolver::new(
            sim_pars.overtake_pars.clone(),
            ChaCha8Rng::seed_from_u64(master_seed.wrapping_add(SEED_OFFSET_OVERTAKING)),
        );
        let pit_advisor = PitStrategyAdvisor::new(
            sim_pars.pit_pars.clone(),
            track.length,
            ChaCha8Rng::seed_from_u64(master_seed.wrapping_add(SEED_OFFSET_PIT)),
        );
        let strategy_rng =
            ChaCha8Rng::seed_from_u64(master_seed.wrapping_add(SEED_OFFSET_STRATEGY));
        let mut grid_rng = ChaCha8Rng::seed_from_u64(master_seed.wrapping_add(SEED_OFFSET_GRID));

        // create cars in grid order, drawing each car's fixed traits
        let mut cars_list: Vec<CarState> = Vec::with_capacity(race_pars.num_cars);

        for id in 0..race_pars.num_cars {
            let profile = if race_pars.strategy_profiles.is_empty() {
                StrategyProfile::from_grid_slot(id)
            } else {
                race_pars.strategy_profiles[id % race_pars.strategy_profiles.len()]
            };

            let spread = race_pars.skill_spread;
            let skill_multiplier = if spread > 0.0 {
                grid_rng.gen_range(1.0 - spread..=1.0 + spread)
            } else {
                1.0
            };

            let jitter = if race_pars.lap_time_jitter > 0.0 {
                let normal = Normal::new(0.0, race_pars.lap_time_jitter).unwrap();
                normal.sample(&mut grid_rng)
            } else {
                0.0
            };

            let expected_lap_time =
                track.reference_lap_time / profile.pace_factor() * (1.0 + jitter);

            cars_list.push(CarState::new(
                id,
                profile,
                expected_lap_time,
                skill_multiplier,
                sim_pars.energy_pars.initial_energy,
            ));
        }

        let attack_modes = AttackModeController::new(
            race_pars.num_cars,
            track.attack_zone,
            sim_pars.attack_pars.clone(),
            &mut grid_rng,
        );

        Race {
            timestep_size,
            race_duration: race_pars.race_duration_min * 60.0,
            overtaking_interval: race_pars.overtaking_interval_s,
            history_interval: race_pars.history_interval_s,
            random_seed: master_seed,
            track,
            cars_list,
            race_state: RaceState {
                race_time: 0.0,
                safety_car_active: false,
                safety_car_remaining_laps: 0,
                weather: Weather::Dry,
                friction_multiplier: 1.0,
                leader_id: 0,
                current_lap: 0,
            },
            events,
            overtaking,
            attack_modes,
            pit_advisor,
            strategy_rng,
            overtake_pars: sim_pars.overtake_pars.clone(),
            attack_pars: sim_pars.attack_pars.clone(),
            energy_pars: sim_pars.energy_pars.clone(),
            next_overtake_time: race_pars.overtaking_interval_s,
            next_history_time: 0.0,
            history: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// The method simulates one time step. The sub-steps run in a fixed order;
    /// only the event engine, the overtaking resolver and the activation policy
    /// consume random draws, each from its own stream.
    pub fn simulate_timestep(&mut self) {
        // increment discretization variable
        self.race_state.race_time += self.timestep_size;

        // expire attack mode boosts that ran their full duration
        self.attack_modes.update_all(self.race_state.race_time);

        // 1) per-car kinematics (mutually independent, no draws consumed)
        self.update_kinematics();

        // 2) lap transitions: queued pit stops and the activation policy
        let leader_lap_advanced = self.handle_lap_transitions();
        self.handle_attack_activation();

        // 3) energy integration and pit decisions
        self.update_energy();

        // 4) overtaking pass
        if self.race_state.race_time >= self.next_overtake_time {
            self.next_overtake_time += self.overtaking_interval;
            if !self.race_state.safety_car_active {
                self.handle_overtaking();
            }
        }

        // 5) event resolution, once per lap of the race
        if leader_lap_advanced {
            self.handle_lap_events();
        }

        // 6) ranking
        self.update_ranking();

        // 7) history snapshot
        if self.race_state.race_time >= self.next_history_time {
            self.next_history_time += self.history_interval;
            self.store_history();
        }

        self.check_invariants();
    }

    /// The method returns whether the race distance is covered.
    pub fn finished(&self) -> bool {
        self.race_state.race_time >= self.race_duration
    }

    // ---------------------------------------------------------------------------------------------
    // RACE SIMULATOR PARTS ------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// Advances every running car. The modifiers apply in fixed precedence: the
    /// safety car pace overrides everything, then the attack mode bonus, the
    /// low-energy penalty and the grip multipliers.
    fn update_kinematics(&mut self) {
        let t = self.race_state.race_time;
        let sc_active = self.race_state.safety_car_active;
        let sc_speed = self.events.get_safety_car_speed();
        let weather_friction = self.race_state.friction_multiplier;
        let attack_multiplier = self.attack_modes.speed_multiplier();
        let attack_modes = &self.attack_modes;
        let track = &self.track;
        let energy_pars = &self.energy_pars;

        for car in self.cars_list.iter_mut() {
            if !car.active {
                continue;
            }

            let mut speed = track.length / car.expected_lap_time * car.skill_multiplier;

            if sc_active {
                speed = speed.min(sc_speed);
            } else {
                if attack_modes.is_active(car.id, t) {
                    speed *= attack_multiplier;
                }
                if car.energy_remaining < energy_pars.low_energy_threshold {
                    speed *= 1.0 - energy_pars.low_energy_penalty;
                }
                speed *= weather_friction * track.local_friction(car.distance_along_track);
            }

            car.current_speed = speed;
            car.distance_along_track += speed * self.timestep_size;
            car.total_elapsed_time += self.timestep_size;
        }
    }

    /// Handles finish line crossings: lap counters, queued pit stops and the
    /// position-dependent attack mode policy. Returns whether the race lap
    /// advanced.
    fn handle_lap_transitions(&mut self) -> bool {
        let track_length = self.track.length;

        for idx in 0..self.cars_list.len() {
            if !self.cars_list[idx].active {
                continue;
            }
            if self.cars_list[idx].distance_along_track < track_length {
                continue;
            }

            {
                let car = &mut self.cars_list[idx];
                car.distance_along_track -= track_length;
                car.lap += 1;
            }

            // a stop decided during the lap is taken at the line
            if let Some(pit_type) = self.cars_list[idx].pit_pending.take() {
                self.apply_pit_stop(idx, pit_type);
            }

            // arm the boost for this lap; leading cars save it, midfield runners
            // spend it. One draw per crossing keeps the stream position fixed.
            let rank = self.cars_list[idx].position_rank;
            let p_activate = if rank == 1 {
                self.attack_pars.p_activate_leader
            } else if rank <= 3 {
                self.attack_pars.p_activate_base
            } else {
                self.attack_pars.p_activate_midfield
            };
            let draw = self.strategy_rng.gen::<f64>();
            self.cars_list[idx].attack_intent = draw < p_activate;
        }

        let mut advanced = false;
        for car in self.cars_list.iter().filter(|c| c.active) {
            if car.lap > self.race_state.current_lap {
                self.race_state.current_lap = car.lap;
                advanced = true;
            }
        }
        advanced
    }

    /// Engages armed boosts once the car reaches the activation zone.
    fn handle_attack_activation(&mut self) {
        let t = self.race_state.race_time;

        for idx in 0..self.cars_list.len() {
            if !self.cars_list[idx].active || !self.cars_list[idx].attack_intent {
                continue;
            }

            let lap = self.cars_list[idx].lap;
            let distance = self.cars_list[idx].distance_along_track;
            let (ok, reason) = self.attack_modes.can_activate(idx, lap, t, distance);

            if ok {
                if self.attack_modes.activate(idx, lap, t, distance) {
                    let time_loss = self.attack_modes.activation_time_loss(idx);
                    let car = &mut self.cars_list[idx];
                    car.attack_intent = false;
                    car.total_elapsed_time += time_loss;
                    car.attack_mode_activations_used += 1;
                    debug!(
                        "car {} engages attack mode on lap {} (deployment cost {:.2}s)",
                        idx, lap, time_loss
                    );
                }
            } else if reason != "outside activation zone" {
                // blocked for this lap; the policy re-arms at the next crossing
                self.cars_list[idx].attack_intent = false;
            }
        }
    }

    /// Integrates energy consumption and routes low-energy and repair decisions
    /// to the pit advisor. Decisions only queue a stop; it is applied at the
    /// car's next finish line crossing.
    fn update_energy(&mut self) {
        let t = self.race_state.race_time;
        let dt_min = self.timestep_size / 60.0;
        let remaining_race_distance =
            (self.race_duration - t).max(0.0) / self.track.reference_lap_time * self.track.length;

        for idx in 0..self.cars_list.len() {
            if !self.cars_list[idx].active {
                continue;
            }

            let boosted = self.attack_modes.is_active(idx, t);
            let car = &mut self.cars_list[idx];

            let mut rate = self.energy_pars.base_rate_per_min
                * (car.current_speed / self.energy_pars.reference_speed);
            if boosted {
                rate *= 1.0 + self.attack_pars.energy_surcharge;
            }
            match car.strategy_profile {
                StrategyProfile::Aggressive => {
                    rate *= 1.0 + self.energy_pars.aggressive_surcharge
                }
                StrategyProfile::Conservative => {
                    rate *= 1.0 - self.energy_pars.conservative_discount
                }
                StrategyProfile::Balanced => {}
            }

            car.energy_remaining = (car.energy_remaining - rate * dt_min).max(0.0);

            if car.pit_pending.is_none() {
                if car.incident_flag && self.pit_advisor.should_pit_repair(idx, true) {
                    car.incident_flag = false;
                    car.pit_pending = Some(PitStopType::Repair);
                    info!("car {} will pit for repairs", idx);
                } else if car.energy_remaining < self.energy_pars.low_energy_threshold {
                    let (pit, reason) = self.pit_advisor.should_pit_energy(
                        idx,
                        car.energy_remaining,
                        self.energy_pars.initial_energy,
                        remaining_race_distance,
                        car.lap,
                    );
                    if pit {
                        car.pit_pending = Some(PitStopType::Energy);
                        info!("car {} will pit: {}", idx, reason);
                    }
                }
            }

            // a drained car with no stop on the way is stranded
            if car.energy_remaining <= 0.0 && car.pit_pending.is_none() {
                car.active = false;
                car.dnf_reason = Some(DnfReason::Other);
                car.current_speed = 0.0;
                warn!("car {} retired: energy exhausted on lap {}", idx, car.lap);
            }
        }
    }

    /// Books a queued pit stop: the duration goes onto the car's elapsed time,
    /// an energy stop restores the battery to the configured ceiling. The
    /// distance trace is unaffected (the stop is a pure time penalty).
    fn apply_pit_stop(&mut self, idx: usize, pit_type: PitStopType) {
        let lap = self.cars_list[idx].lap;
        let record =
            self.pit_advisor
                .execute_pit_stop(idx, pit_type, lap, self.race_state.race_time);

        let car = &mut self.cars_list[idx];
        car.total_elapsed_time += record.duration;
        car.pit_stop_count += 1;
        if pit_type == PitStopType::Energy {
            car.energy_remaining = self.energy_pars.reset_ceiling;
        }

        info!(
            "car {} pit stop ({:?}) on lap {}: {:.1}s",
            idx, pit_type, lap, record.duration
        );
    }

    /// Runs one overtaking pass over all adjacent pairs of the running order.
    /// A successful attempt moves the attacker just past the defender; the rank
    /// change itself falls out of the next sort.
    fn handle_overtaking(&mut self) {
        let order = self.active_order();
        if order.len() < 2 {
            return;
        }

        let track_length = self.track.length;
        let t = self.race_state.race_time;

        for i in 0..order.len() - 1 {
            let front = order[i];
            let rear = order[i + 1];

            let front_speed = self.cars_list[front].current_speed;
            let rear_speed = self.cars_list[rear].current_speed;
            if rear_speed <= 0.0 {
                continue;
            }

            let speed_diff_kmh = (rear_speed - front_speed) * 3.6;
            if speed_diff_kmh <= self.overtake_pars.min_speed_diff_kmh {
                continue;
            }

            let gap_m = self.cars_list[front].progress(track_length)
                - self.cars_list[rear].progress(track_length);
            let gap_seconds = gap_m / rear_speed;
            if gap_seconds > self.overtake_pars.attempt_window_s {
                continue;
            }

            let outcome = self.overtaking.attempt_overtake(
                rear,
                front,
                rear_speed,
                front_speed,
                gap_seconds,
                self.cars_list[rear].distance_along_track / track_length,
                self.attack_modes.is_active(rear, t),
                self.attack_modes.is_active(front, t),
                t,
            );

            if outcome.success {
                let new_progress = self.cars_list[front].progress(track_length)
                    + self.overtake_pars.overtake_margin_m;
                self.cars_list[rear].set_progress(new_progress, track_length);
                debug!(
                    "car {} passes car {} ({:+.1} km/h, gain {:.2}s)",
                    rear, front, outcome.speed_differential_kmh, outcome.time_gain
                );
            } else if outcome.slipstream_active {
                // failed lunge out of the tow counts as light contact
                self.cars_list[rear].incident_flag = true;
            }
        }
    }

    /// Resolves the random events of the lap the leader just started and
    /// applies the outcomes to car and race state.
    fn handle_lap_events(&mut self) {
        let lap = self.race_state.current_lap;

        // run down the current deployment before drawing new events
        self.events.update_safety_car(lap);

        let active_ids: Vec<usize> = self
            .cars_list
            .iter()
            .filter(|c| c.active)
            .map(|c| c.id)
            .collect();
        let report = self
            .events
            .check_lap_events(lap, self.race_state.race_time, &active_ids);

        for &id in &report.crashed_cars {
            let car = &mut self.cars_list[id];
            car.active = false;
            car.dnf_reason = Some(DnfReason::Crash);
            car.current_speed = 0.0;
            car.pit_pending = None;
            car.attack_intent = false;
            warn!("car {} crashed out on lap {}", id, lap);
        }

        if report.weather_changed {
            self.race_state.weather = self.events.weather();
            self.race_state.friction_multiplier = report.new_friction;
        }

        self.race_state.safety_car_active = self.events.safety_car_active();
        self.race_state.safety_car_remaining_laps = self.events.safety_car_remaining_laps();
    }

    /// Assigns contiguous position ranks from a single stable sort over total
    /// race progress. Retired cars line up behind the field, best mileage
    /// first.
    fn update_ranking(&mut self) {
        let order = self.active_order();
        let active_count = order.len();

        for (rank, &id) in order.iter().enumerate() {
            self.cars_list[id].position_rank = rank as u32 + 1;
        }
        for (i, &id) in self.dnf_order().iter().enumerate() {
            self.cars_list[id].position_rank = (active_count + i) as u32 + 1;
        }

        if let Some(&leader) = order.first() {
            self.race_state.leader_id = leader;
        }
    }

    fn store_history(&mut self) {
        let mut ranking = self.active_order();
        ranking.extend(self.dnf_order());

        self.history.push(PositionSnapshot {
            race_time: self.race_state.race_time,
            ranking,
            distances: self
                .cars_list
                .iter()
                .map(|c| c.distance_along_track)
                .collect(),
            energy: self.cars_list.iter().map(|c| c.energy_remaining).collect(),
        });
    }

    /// Hard consistency check over the whole car set. A violation here means an
    /// internal defect; continuing silently would corrupt the determinism and
    /// fairness guarantees, so the race stops immediately.
    fn check_invariants(&self) {
        let active_count = self.cars_list.iter().filter(|c| c.active).count();
        let mut rank_seen = vec![false; active_count];

        for car in self.cars_list.iter().filter(|c| c.active) {
            let rank = car.position_rank as usize;
            if rank < 1 || rank > active_count {
                panic!(
                    "Position rank {} of car {} is outside 1..={}!",
                    rank, car.id, active_count
                );
            }
            if rank_seen[rank - 1] {
                panic!("Position rank {} is assigned twice among active cars!", rank);
            }
            rank_seen[rank - 1] = true;
        }

        for car in self.cars_list.iter() {
            if car.energy_remaining < 0.0 {
                panic!(
                    "Energy of car {} is negative ({:.3} kWh)!",
                    car.id, car.energy_remaining
                );
            }
            if !(0.0 <= car.distance_along_track && car.distance_along_track < self.track.length) {
                panic!(
                    "Distance {:.3} m of car {} is outside [0.0, {:.1} m)!",
                    car.distance_along_track, car.id, self.track.length
                );
            }
            if car.attack_mode_activations_used > self.attack_modes.max_activations() {
                panic!(
                    "Car {} used {} attack mode activations, maximum is {}!",
                    car.id,
                    car.attack_mode_activations_used,
                    self.attack_modes.max_activations()
                );
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// The method returns the running cars sorted by total race progress, best
    /// first. The underlying sort is stable, so equal progress falls back to
    /// ascending car id.
    fn active_order(&self) -> Vec<usize> {
        let progress: Vec<f64> = self
            .cars_list
            .iter()
            .map(|car| {
                if car.active {
                    car.progress(self.track.length)
                } else {
                    f64::NEG_INFINITY
                }
            })
            .collect();

        argsort(&progress, SortOrder::Descending)
            .into_iter()
            .filter(|&idx| self.cars_list[idx].active)
            .collect()
    }

    /// The method returns the retired cars ordered by mileage at retirement.
    fn dnf_order(&self) -> Vec<usize> {
        let mut dnf: Vec<usize> = self
            .cars_list
            .iter()
            .filter(|c| !c.active)
            .map(|c| c.id)
            .collect();
        dnf.sort_by(|&a, &b| {
            self.cars_list[b]
                .lap
                .cmp(&self.cars_list[a].lap)
                .then(a.cmp(&b))
        });
        dnf
    }

    pub fn attack_modes(&self) -> &AttackModeController {
        &self.attack_modes
    }

    pub fn events(&self) -> &RaceEventEngine {
        &self.events
    }

    pub fn overtaking(&self) -> &OvertakingResolver {
        &self.overtaking
    }

    pub fn get_race_result(&self) -> RaceResult {
        // finishers by laps, then distance, then elapsed time; retired cars
        // behind them by mileage at retirement
        let mut finishers = self.active_order();
        finishers.sort_by(|&a, &b| {
            let ca = &self.cars_list[a];
            let cb = &self.cars_list[b];
            cb.lap
                .cmp(&ca.lap)
                .then(
                    cb.distance_along_track
                        .partial_cmp(&ca.distance_along_track)
                        .unwrap(),
                )
                .then(
                    ca.total_elapsed_time
                        .partial_cmp(&cb.total_elapsed_time)
                        .unwrap(),
                )
                .then(a.cmp(&b))
        });

        let mut final_order = finishers;
        final_order.extend(self.dnf_order());

        let mut classification = Vec::with_capacity(self.cars_list.len());
        let mut final_positions = vec![0u32; self.cars_list.len()];
        let mut final_times = vec![0.0; self.cars_list.len()];
        let mut laps_completed = vec![0u32; self.cars_list.len()];

        for (i, &id) in final_order.iter().enumerate() {
            let car = &self.cars_list[id];
            let position = i as u32 + 1;

            classification.push(ClassificationEntry {
                position,
                car_id: id,
                strategy: car.strategy_profile,
                laps_completed: car.lap,
                total_time: car.total_elapsed_time,
                energy_remaining: car.energy_remaining,
                pit_stops: car.pit_stop_count,
                attack_mode_activations: car.attack_mode_activations_used,
                dnf_reason: car.dnf_reason,
            });
            final_positions[id] = position;
            final_times[id] = car.total_elapsed_time;
            laps_completed[id] = car.lap;
        }

        let dnf_list = self
            .dnf_order()
            .into_iter()
            .map(|id| {
                let car = &self.cars_list[id];
                DnfEntry {
                    car_id: id,
                    reason: car.dnf_reason.unwrap_or(DnfReason::Other),
                    laps_completed: car.lap,
                }
            })
            .collect();

        RaceResult {
            track_name: self.track.name.to_owned(),
            num_cars: self.cars_list.len(),
            random_seed: self.random_seed,
            classification,
            final_positions,
            final_times,
            laps_completed,
            dnf_list,
            race_events_summary: self.events.summary(),
            overtaking_stats: self.overtaking.stats(),
            pit_stops: self.pit_advisor.stops().to_vec(),
            events: self.events.event_log().to_vec(),
            position_history: self.history.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::track::TrackPars;
    use crate::pre::sim_config::{EventPars, PitPars, RacePars};
    use approx::assert_relative_eq;

    fn silent_events() -> EventPars {
        EventPars {
            p_safety_car: 0.0,
            p_crash: 0.0,
            p_crash_triggers_sc: 0.0,
            p_weather_change: 0.0,
            ..EventPars::default()
        }
    }

    fn test_pars(num_cars: usize, seed: u64) -> SimPars {
        SimPars {
            race_pars: RacePars {
                num_cars,
                track_name: None,
                race_duration_min: 5.0,
                random_seed: seed,
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
            event_pars: silent_events(),
            overtake_pars: OvertakePars::default(),
            attack_pars: AttackModePars::default(),
            pit_pars: PitPars::default(),
            energy_pars: EnergyPars::default(),
        }
    }

    fn assert_rank_permutation(race: &Race) {
        let mut ranks: Vec<u32> = race
            .cars_list
            .iter()
            .filter(|c| c.active)
            .map(|c| c.position_rank)
            .collect();
        ranks.sort_unstable();
        let expected: Vec<u32> = (1..=ranks.len() as u32).collect();
        assert_eq!(ranks, expected);

        // every id appears exactly once across active and retired cars
        let mut ids: Vec<usize> = race.cars_list.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), race.cars_list.len());
    }

    #[test]
    fn ranks_stay_a_contiguous_permutation() {
        let mut race = Race::new(&test_pars(12, 42), 0.2);

        for _ in 0..600 {
            race.simulate_timestep();
            assert_rank_permutation(&race);
        }
    }

    #[test]
    fn identical_seed_produces_identical_results() {
        let pars = SimPars {
            event_pars: EventPars::default(),
            ..test_pars(12, 7)
        };

        let run = |pars: &SimPars| {
            let mut race = Race::new(pars, 0.2);
            while !race.finished() {
                race.simulate_timestep();
            }
            serde_json::to_string(&race.get_race_result()).unwrap()
        };

        assert_eq!(run(&pars), run(&pars));
    }

    #[test]
    fn different_seeds_diverge() {
        let run = |seed: u64| {
            let mut race = Race::new(&test_pars(12, seed), 0.2);
            while !race.finished() {
                race.simulate_timestep();
            }
            serde_json::to_string(&race.get_race_result()).unwrap()
        };

        assert_ne!(run(3), run(4));
    }

    #[test]
    fn safety_car_clamps_the_whole_field() {
        let mut pars = test_pars(12, 42);
        pars.event_pars.p_safety_car = 1.0;
        let sc_speed = pars.event_pars.sc_speed;
        let mut race = Race::new(&pars, 0.2);

        // without a deployment every car runs clearly above the safety car pace
        race.simulate_timestep();
        for car in race.cars_list.iter().filter(|c| c.active) {
            assert!(car.current_speed > sc_speed);
        }

        // the certain deployment arrives at the first lap boundary
        for _ in 0..2000 {
            race.simulate_timestep();
            if race.race_state.safety_car_active {
                break;
            }
        }
        assert!(race.race_state.safety_car_active);

        for _ in 0..50 {
            race.simulate_timestep();
            if !race.race_state.safety_car_active {
                break;
            }
            for car in race.cars_list.iter().filter(|c| c.active) {
                assert_relative_eq!(car.current_speed, sc_speed);
            }
        }
    }

    #[test]
    fn certain_crashes_retire_the_field_permanently() {
        let mut pars = test_pars(10, 42);
        pars.event_pars.p_crash = 1.0;
        pars.event_pars.p_crash_triggers_sc = 0.0;
        let mut race = Race::new(&pars, 0.2);

        for _ in 0..2000 {
            race.simulate_timestep();
            if race.cars_list.iter().all(|c| !c.active) {
                break;
            }
        }
        assert!(race.cars_list.iter().all(|c| !c.active));
        assert!(race
            .cars_list
            .iter()
            .all(|c| c.dnf_reason == Some(DnfReason::Crash)));

        // retired cars never move again
        let distances: Vec<f64> = race
            .cars_list
            .iter()
            .map(|c| c.distance_along_track)
            .collect();
        let laps: Vec<u32> = race.cars_list.iter().map(|c| c.lap).collect();
        for _ in 0..100 {
            race.simulate_timestep();
        }
        for (car, (d, l)) in race.cars_list.iter().zip(distances.iter().zip(laps.iter())) {
            assert_relative_eq!(car.distance_along_track, *d);
            assert_eq!(car.lap, *l);
        }

        let result = race.get_race_result();
        assert_eq!(result.dnf_list.len(), 10);
        assert!(result
            .dnf_list
            .iter()
            .all(|e| e.reason == DnfReason::Crash));
    }

    #[test]
    fn low_energy_forces_a_stop_that_refills_the_battery() {
        let mut pars = test_pars(10, 42);
        pars.race_pars.race_duration_min = 12.0;
        pars.energy_pars.initial_energy = 6.0;
        pars.energy_pars.reset_ceiling = 52.0;
        let ceiling = pars.energy_pars.reset_ceiling;
        let mut race = Race::new(&pars, 0.2);

        let mut prev_energy: Vec<f64> = race
            .cars_list
            .iter()
            .map(|c| c.energy_remaining)
            .collect();
        let mut prev_elapsed: Vec<f64> = vec![0.0; race.cars_list.len()];
        let mut prev_stops: Vec<u32> = vec![0; race.cars_list.len()];
        let mut refills = 0;

        while !race.finished() {
            race.simulate_timestep();
            for car in race.cars_list.iter() {
                assert!(car.total_elapsed_time >= prev_elapsed[car.id]);
                prev_elapsed[car.id] = car.total_elapsed_time;

                if car.energy_remaining > prev_energy[car.id] {
                    // the only way up is an energy stop at the line
                    assert!(car.pit_stop_count > prev_stops[car.id]);
                    assert!(car.energy_remaining > ceiling - 1.0);
                    refills += 1;
                }
                prev_energy[car.id] = car.energy_remaining;
                prev_stops[car.id] = car.pit_stop_count;
            }
        }

        assert!(refills > 0, "no car ever refilled");
        let result = race.get_race_result();
        assert!(result.classification.iter().any(|e| e.pit_stops > 0));
    }

    #[test]
    fn silent_race_reports_zero_event_counts() {
        let mut race = Race::new(&test_pars(20, 42), 0.2);
        while !race.finished() {
            race.simulate_timestep();
        }

        let result = race.get_race_result();
        assert_eq!(result.race_events_summary.total_safety_cars, 0);
        assert_eq!(result.race_events_summary.total_crashes, 0);
        assert_eq!(result.race_events_summary.total_weather_changes, 0);
        assert!(result.dnf_list.is_empty());
        assert!(result.events.is_empty());

        // classification covers the whole grid with contiguous positions
        let mut positions: Vec<u32> = result.final_positions.clone();
        positions.sort_unstable();
        assert_eq!(positions, (1..=20).collect::<Vec<u32>>());
        assert!(!result.position_history.is_empty());
    }

    #[test]
    fn attack_mode_activations_respect_the_limit() {
        let mut pars = test_pars(12, 42);
        pars.race_pars.race_duration_min = 10.0;
        pars.attack_pars.duration_s = 30.0;
        pars.attack_pars.p_activate_base = 1.0;
        pars.attack_pars.p_activate_midfield = 1.0;
        pars.attack_pars.p_activate_leader = 1.0;
        let mut race = Race::new(&pars, 0.2);

        while !race.finished() {
            race.simulate_timestep();
        }

        let result = race.get_race_result();
        assert!(result
            .classification
            .iter()
            .all(|e| e.attack_mode_activations <= 2));
        // with a certain arming policy the boosts actually get used
        assert!(result
            .classification
            .iter()
            .any(|e| e.attack_mode_activations == 2));
    }
}
