use crate::pre::sim_config::OvertakePars;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Outcome of a single overtaking attempt.
#[derive(Debug, Clone)]
pub struct OvertakeOutcome {
    pub success: bool,
    pub speed_differential_kmh: f64,
    pub time_gain: f64,
    pub slipstream_active: bool,
}

/// One resolved attempt, kept for post-race analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvertakeAttempt {
    pub attacker: usize,
    pub defender: usize,
    pub success: bool,
    pub speed_differential_kmh: f64,
    pub time_gain: f64,
    pub track_fraction: f64,
    pub timestamp: f64,
}

/// Cumulative overtaking statistics for the result record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvertakingStats {
    pub total_attempts: u64,
    pub total_successes: u64,
    pub success_rate: f64,
    pub avg_speed_differential_kmh: f64,
}

/// OvertakingResolver decides pairwise overtaking attempts. Each call is a pure
/// function of its inputs plus the owned seeded stream; no car state is held
/// between calls, only cumulative statistics. An attempt below the minimum
/// closing speed is rejected without consuming a draw, which keeps the stream
/// position independent of hopeless attempts.
#[derive(Debug)]
pub struct OvertakingResolver {
    pars: OvertakePars,
    rng: ChaCha8Rng,
    draws_consumed: u64,
    total_attempts: u64,
    total_successes: u64,
    speed_diff_sum: f64,
    history: Vec<OvertakeAttempt>,
}

impl OvertakingResolver {
    pub fn new(pars: OvertakePars, rng: ChaCha8Rng) -> OvertakingResolver {
        OvertakingResolver {
            pars,
            rng,
            draws_consumed: 0,
            total_attempts: 0,
            total_successes: 0,
            speed_diff_sum: 0.0,
            history: Vec::new(),
        }
    }

    /// The method returns the success probability for the given effective speed
    /// differential, shifted when exactly one side runs attack mode.
    pub fn success_probability(
        &self,
        effective_diff_kmh: f64,
        attacker_attack_mode: bool,
        defender_attack_mode: bool,
    ) -> f64 {
        let mut prob = if effective_diff_kmh < 10.0 {
            self.pars.p_band_low
        } else if effective_diff_kmh < 15.0 {
            self.pars.p_band_mid
        } else {
            self.pars.p_band_high
        };

        if attacker_attack_mode && !defender_attack_mode {
            prob += self.pars.attack_mode_shift;
        } else if defender_attack_mode && !attacker_attack_mode {
            prob -= self.pars.attack_mode_shift;
        }

        prob.max(self.pars.p_floor).min(self.pars.p_cap)
    }

    /// The method resolves one overtaking attempt of the attacker against the
    /// car directly ahead. Speeds are in m/s, the gap in seconds.
    #[allow(clippy::too_many_arguments)]
    pub fn attempt_overtake(
        &mut self,
        attacker: usize,
        defender: usize,
        attacker_speed: f64,
        defender_speed: f64,
        gap_seconds: f64,
        track_fraction: f64,
        attacker_attack_mode: bool,
        defender_attack_mode: bool,
        timestamp: f64,
    ) -> OvertakeOutcome {
        let speed_diff_kmh = (attacker_speed - defender_speed) * 3.6;
        let slipstream_active = gap_seconds <= self.pars.slipstream_window_s;

        // hopeless attempt, rejected without touching the random stream
        if speed_diff_kmh <= self.pars.min_speed_diff_kmh {
            return OvertakeOutcome {
                success: false,
                speed_differential_kmh: speed_diff_kmh,
                time_gain: 0.0,
                slipstream_active,
            };
        }

        // the tow raises the effective differential used for the band lookup
        let effective_diff_kmh = if slipstream_active {
            speed_diff_kmh * (1.0 + self.pars.slipstream_bonus)
        } else {
            speed_diff_kmh
        };

        let prob =
            self.success_probability(effective_diff_kmh, attacker_attack_mode, defender_attack_mode);

        let success = self.rng.gen::<f64>() < prob;
        self.draws_consumed += 1;

        let time_gain = if success {
            self.draws_consumed += 1;
            self.rng
                .gen_range(self.pars.time_gain_min_s..=self.pars.time_gain_max_s)
        } else {
            0.0
        };

        self.total_attempts += 1;
        if success {
            self.total_successes += 1;
        }
        self.speed_diff_sum += speed_diff_kmh;
        self.history.push(OvertakeAttempt {
            attacker,
            defender,
            success,
            speed_differential_kmh: speed_diff_kmh,
            time_gain,
            track_fraction,
            timestamp,
        });

        OvertakeOutcome {
            success,
            speed_differential_kmh: speed_diff_kmh,
            time_gain,
            slipstream_active,
        }
    }

    pub fn stats(&self) -> OvertakingStats {
        let success_rate = if self.total_attempts > 0 {
            self.total_successes as f64 / self.total_attempts as f64
        } else {
            0.0
        };
        let avg_speed_differential_kmh = if self.total_attempts > 0 {
            self.speed_diff_sum / self.total_attempts as f64
        } else {
            0.0
        };

        OvertakingStats {
            total_attempts: self.total_attempts,
            total_successes: self.total_successes,
            success_rate,
            avg_speed_differential_kmh,
        }
    }

    pub fn history(&self) -> &[OvertakeAttempt] {
        &self.history
    }

    pub fn draws_consumed(&self) -> u64 {
        self.draws_consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    fn resolver() -> OvertakingResolver {
        OvertakingResolver::new(OvertakePars::default(), ChaCha8Rng::seed_from_u64(42))
    }

    #[test]
    fn below_minimum_differential_fails_without_a_draw() {
        let mut resolver = resolver();

        for _ in 0..100 {
            let outcome =
                resolver.attempt_overtake(2, 1, 46.0, 45.0, 0.8, 0.5, false, false, 0.0);
            assert!(!outcome.success);
            assert_relative_eq!(outcome.time_gain, 0.0);
        }

        assert_eq!(resolver.draws_consumed(), 0);
        assert_eq!(resolver.stats().total_attempts, 0);
    }

    #[test]
    fn band_probabilities_with_attack_mode_shift() {
        let resolver = resolver();

        assert_relative_eq!(resolver.success_probability(7.0, false, false), 0.20);
        assert_relative_eq!(resolver.success_probability(12.0, false, false), 0.50);
        assert_relative_eq!(resolver.success_probability(20.0, false, false), 0.80);

        // one-sided attack mode shifts the probability, clamped to the band
        assert_relative_eq!(resolver.success_probability(20.0, true, false), 0.95);
        assert_relative_eq!(resolver.success_probability(7.0, false, true), 0.05);
        // both sides boosted cancels out
        assert_relative_eq!(resolver.success_probability(12.0, true, true), 0.50);
    }

    #[test]
    fn high_band_with_slipstream_succeeds_about_eighty_percent() {
        let mut resolver = resolver();
        let trials = 10_000;

        for i in 0..trials {
            // 18 km/h closing speed inside the slipstream window
            resolver.attempt_overtake(2, 1, 50.0, 45.0, 0.5, 0.5, false, false, i as f64);
        }

        let stats = resolver.stats();
        assert_eq!(stats.total_attempts, trials);
        assert!(
            (stats.success_rate - 0.80).abs() < 0.02,
            "observed success rate {} is not within 0.80 +- 0.02",
            stats.success_rate
        );
    }

    #[test]
    fn slipstream_promotes_the_effective_band() {
        // 14.4 km/h sits in the middle band, the 5% tow pushes it past 15 km/h
        let mut resolver = resolver();
        let trials = 10_000;

        for i in 0..trials {
            resolver.attempt_overtake(2, 1, 49.0, 45.0, 0.5, 0.5, false, false, i as f64);
        }

        let rate = resolver.stats().success_rate;
        assert!(
            (rate - 0.80).abs() < 0.02,
            "observed success rate {} is not within 0.80 +- 0.02",
            rate
        );
    }

    #[test]
    fn time_gain_is_drawn_within_the_configured_band_on_success() {
        let mut resolver = resolver();
        let pars = OvertakePars::default();
        let mut successes = 0;

        for i in 0..1000 {
            let outcome =
                resolver.attempt_overtake(2, 1, 52.0, 45.0, 0.5, 0.5, false, false, i as f64);
            if outcome.success {
                successes += 1;
                assert!(outcome.time_gain >= pars.time_gain_min_s);
                assert!(outcome.time_gain <= pars.time_gain_max_s);
            } else {
                assert_relative_eq!(outcome.time_gain, 0.0);
            }
        }

        assert!(successes > 0);
    }

    #[test]
    fn identical_seed_replays_identical_attempts() {
        let mut a = resolver();
        let mut b = resolver();

        for i in 0..200 {
            let oa = a.attempt_overtake(2, 1, 50.0, 45.0, 0.5, 0.5, i % 2 == 0, false, i as f64);
            let ob = b.attempt_overtake(2, 1, 50.0, 45.0, 0.5, 0.5, i % 2 == 0, false, i as f64);
            assert_eq!(oa.success, ob.success);
            assert_eq!(oa.time_gain, ob.time_gain);
        }
    }
}
