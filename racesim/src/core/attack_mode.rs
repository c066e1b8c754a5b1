use crate::pre::sim_config::AttackModePars;
use log::debug;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackModeState {
    Available,
    Active,
    Exhausted,
}

/// Per-car attack mode bookkeeping. `active_since` and `expiry_time` are only
/// meaningful while the state is Active. The deployment time loss is drawn once
/// at construction, so every transition afterwards is fully deterministic.
#[derive(Debug, Clone)]
pub struct AttackModeRecord {
    pub state: AttackModeState,
    pub activations_remaining: u32,
    pub active_since: f64,
    pub expiry_time: f64,
    activation_time_loss: f64,
    last_expiry: f64,
}

/// AttackModeController is the power boost state machine for the whole grid:
/// Available -> Active -> Available (activations left) or Exhausted (none
/// left). A boost always runs its full duration; there is no transition out of
/// Active before the expiry time.
#[derive(Debug)]
pub struct AttackModeController {
    pars: AttackModePars,
    zone: [f64; 2],
    records: Vec<AttackModeRecord>,
}

impl AttackModeController {
    /// `rng` is only used here, to fix each car's one-time deployment cost; the
    /// controller itself never draws.
    pub fn new(
        num_cars: usize,
        zone: [f64; 2],
        pars: AttackModePars,
        rng: &mut ChaCha8Rng,
    ) -> AttackModeController {
        let records = (0..num_cars)
            .map(|_| AttackModeRecord {
                state: AttackModeState::Available,
                activations_remaining: pars.max_activations,
                active_since: 0.0,
                expiry_time: 0.0,
                activation_time_loss: rng.gen_range(pars.time_loss_min_s..=pars.time_loss_max_s),
                last_expiry: f64::NEG_INFINITY,
            })
            .collect();

        AttackModeController {
            pars,
            zone,
            records,
        }
    }

    /// The method checks whether the car may engage the boost right now. The
    /// returned reason names the first failed precondition.
    pub fn can_activate(
        &self,
        car: usize,
        _lap: u32,
        time: f64,
        distance: f64,
    ) -> (bool, &'static str) {
        let record = &self.records[car];

        match record.state {
            AttackModeState::Active => return (false, "already active"),
            AttackModeState::Exhausted => return (false, "all activations used"),
            AttackModeState::Available => {}
        }

        if record.activations_remaining == 0 {
            return (false, "all activations used");
        }

        if time < record.last_expiry + self.pars.cooldown_s {
            return (false, "cooldown not elapsed");
        }

        if !self.is_in_zone(distance) {
            return (false, "outside activation zone");
        }

        (true, "can activate")
    }

    /// The method engages the boost after re-validating all preconditions.
    /// Returns false without any state change when they fail. The caller
    /// applies the deployment time loss to the car's elapsed time.
    pub fn activate(&mut self, car: usize, lap: u32, time: f64, distance: f64) -> bool {
        let (ok, reason) = self.can_activate(car, lap, time, distance);
        if !ok {
            debug!("car {} attack mode activation rejected: {}", car, reason);
            return false;
        }

        let record = &mut self.records[car];
        record.state = AttackModeState::Active;
        record.active_since = time;
        record.expiry_time = time + self.pars.duration_s;
        record.activations_remaining -= 1;

        debug!(
            "car {} engages attack mode on lap {} until t={:.1}s ({} activations left)",
            car, lap, record.expiry_time, record.activations_remaining
        );
        true
    }

    /// The method returns whether the car's boost is running at the given time.
    /// Callers apply the speed multiplier and the energy surcharge while true.
    pub fn is_active(&self, car: usize, time: f64) -> bool {
        let record = &self.records[car];
        record.state == AttackModeState::Active && time < record.expiry_time
    }

    /// The method expires boosts that have run their full duration. Each car
    /// makes at most one transition per call.
    pub fn update_all(&mut self, time: f64) {
        for record in self.records.iter_mut() {
            if record.state == AttackModeState::Active && time >= record.expiry_time {
                record.last_expiry = record.expiry_time;
                record.state = if record.activations_remaining > 0 {
                    AttackModeState::Available
                } else {
                    AttackModeState::Exhausted
                };
            }
        }
    }

    pub fn activation_time_loss(&self, car: usize) -> f64 {
        self.records[car].activation_time_loss
    }

    pub fn activations_remaining(&self, car: usize) -> u32 {
        self.records[car].activations_remaining
    }

    pub fn record(&self, car: usize) -> &AttackModeRecord {
        &self.records[car]
    }

    pub fn speed_multiplier(&self) -> f64 {
        1.0 + self.pars.speed_bonus
    }

    pub fn energy_surcharge(&self) -> f64 {
        self.pars.energy_surcharge
    }

    pub fn max_activations(&self) -> u32 {
        self.pars.max_activations
    }

    fn is_in_zone(&self, distance: f64) -> bool {
        if self.zone[0] <= self.zone[1] {
            distance >= self.zone[0] && distance <= self.zone[1]
        } else {
            // zone wraps around the finish line
            distance >= self.zone[0] || distance <= self.zone[1]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const ZONE: [f64; 2] = [480.0, 600.0];
    const IN_ZONE: f64 = 520.0;

    fn controller(pars: AttackModePars) -> AttackModeController {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        AttackModeController::new(4, ZONE, pars, &mut rng)
    }

    fn assert_state_invariant(ctrl: &AttackModeController, car: usize) {
        let record = ctrl.record(car);
        let exhausted = record.state == AttackModeState::Exhausted;
        let spent_and_idle =
            record.activations_remaining == 0 && record.state != AttackModeState::Active;
        assert_eq!(exhausted, spent_and_idle);
    }

    #[test]
    fn full_lifecycle_available_active_exhausted() {
        let pars = AttackModePars::default();
        let duration = pars.duration_s;
        let mut ctrl = controller(pars);

        assert!(ctrl.activate(0, 1, 100.0, IN_ZONE));
        assert!(ctrl.is_active(0, 100.0));
        assert_eq!(ctrl.activations_remaining(0), 1);
        assert_state_invariant(&ctrl, 0);

        // a running boost cannot be re-engaged
        assert!(!ctrl.activate(0, 1, 150.0, IN_ZONE));
        assert_eq!(ctrl.activations_remaining(0), 1);

        // runs its full duration, then drops back to Available
        assert!(ctrl.is_active(0, 100.0 + duration - 0.1));
        assert!(!ctrl.is_active(0, 100.0 + duration));
        ctrl.update_all(100.0 + duration);
        assert_eq!(ctrl.record(0).state, AttackModeState::Available);
        assert_state_invariant(&ctrl, 0);

        // second and last activation ends in Exhausted
        assert!(ctrl.activate(0, 5, 400.0, IN_ZONE));
        ctrl.update_all(400.0 + duration);
        assert_eq!(ctrl.record(0).state, AttackModeState::Exhausted);
        assert_state_invariant(&ctrl, 0);

        let (ok, reason) = ctrl.can_activate(0, 9, 700.0, IN_ZONE);
        assert!(!ok);
        assert_eq!(reason, "all activations used");
        assert!(!ctrl.activate(0, 9, 700.0, IN_ZONE));
    }

    #[test]
    fn activation_is_gated_to_the_zone() {
        let mut ctrl = controller(AttackModePars::default());

        let (ok, reason) = ctrl.can_activate(1, 1, 50.0, 10.0);
        assert!(!ok);
        assert_eq!(reason, "outside activation zone");
        assert!(!ctrl.activate(1, 1, 50.0, 10.0));
        assert_eq!(ctrl.activations_remaining(1), 2);

        assert!(ctrl.activate(1, 1, 50.0, IN_ZONE));
    }

    #[test]
    fn cooldown_blocks_back_to_back_activations() {
        let mut pars = AttackModePars::default();
        pars.cooldown_s = 30.0;
        let duration = pars.duration_s;
        let mut ctrl = controller(pars);

        assert!(ctrl.activate(2, 1, 0.0, IN_ZONE));
        ctrl.update_all(duration);

        let (ok, reason) = ctrl.can_activate(2, 4, duration + 10.0, IN_ZONE);
        assert!(!ok);
        assert_eq!(reason, "cooldown not elapsed");

        assert!(ctrl.activate(2, 4, duration + 30.0, IN_ZONE));
    }

    #[test]
    fn zero_cooldown_allows_back_to_back_activations() {
        let pars = AttackModePars::default();
        let duration = pars.duration_s;
        let mut ctrl = controller(pars);

        assert!(ctrl.activate(3, 1, 0.0, IN_ZONE));
        ctrl.update_all(duration);
        assert!(ctrl.activate(3, 4, duration, IN_ZONE));
    }

    #[test]
    fn deployment_cost_is_fixed_within_the_configured_band() {
        let pars = AttackModePars::default();
        let ctrl = controller(pars.clone());

        for car in 0..4 {
            let loss = ctrl.activation_time_loss(car);
            assert!(loss >= pars.time_loss_min_s && loss <= pars.time_loss_max_s);
            // stable across queries
            assert_eq!(loss, ctrl.activation_time_loss(car));
        }
    }
}
