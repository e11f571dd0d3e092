//! Humanized drag trajectory synthesis.
//!
//! Constant-speed motion is trivially distinguishable from human input, so
//! the generator simulates discrete kinematics: an acceleration phase over a
//! fixed fraction of the distance, a deceleration phase over the remainder,
//! per-step jitter that shrinks near the target, and an overshoot-and-correct
//! tail. The step sum always equals the requested distance exactly.

use rand::RngExt;

/// Kinematic constants for trajectory synthesis.
///
/// The values are empirically tuned against the live challenge widget and
/// have no documented physical derivation; override them, don't re-derive.
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryProfile {
    /// Fraction of the total distance covered while accelerating.
    pub accel_ratio: f64,
    /// Time quantum per step, seconds.
    pub time_quantum: f64,
    /// Acceleration, px/step².
    pub accel: f64,
    /// Deceleration, px/step² (negative).
    pub decel: f64,
    /// Symmetric per-step jitter, px.
    pub jitter: f64,
    /// Reduced jitter applied within `fine_threshold` of the target, px.
    pub fine_jitter: f64,
    /// Remaining distance below which jitter shrinks to `fine_jitter`, px.
    pub fine_threshold: f64,
}

impl Default for TrajectoryProfile {
    fn default() -> Self {
        Self {
            accel_ratio: 0.65,
            time_quantum: 0.6,
            accel: 10.0,
            decel: -3.0,
            jitter: 0.5,
            fine_jitter: 0.2,
            fine_threshold: 10.0,
        }
    }
}

/// Smallest forward step, px. Keeps the deceleration loop terminating when
/// velocity has decayed to zero with distance still remaining; a stalled
/// slider creeps forward, it never reverses.
const MIN_STEP: f64 = 0.1;

impl TrajectoryProfile {
    /// Generate the ordered step sequence for `target_distance` pixels.
    ///
    /// A zero (or negative) target yields an empty trajectory. Otherwise the
    /// sequence is non-empty and its sum equals `target_distance` to within
    /// floating error.
    pub fn generate(&self, target_distance: f64) -> Vec<f64> {
        if target_distance <= 0.0 {
            return Vec::new();
        }

        let mut rng = rand::rng();
        let mut track: Vec<f64> = Vec::new();
        let mut current = 0.0_f64;
        let mut velocity = 0.0_f64;
        let t = self.time_quantum;

        // Acceleration covers a fixed fraction of the distance; the last step
        // of the phase is clamped to land exactly on the boundary.
        let accel_boundary = target_distance * self.accel_ratio;
        while current < accel_boundary {
            let mut s = velocity * t + 0.5 * self.accel * t * t;
            s += rng.random_range(-self.jitter..=self.jitter);
            // max-then-min: the remainder may already be below MIN_STEP.
            s = s.max(MIN_STEP).min(accel_boundary - current);

            velocity += self.accel * t;
            track.push(s);
            current += s;
        }

        // Deceleration covers the remainder. Velocity floors at zero.
        while current < target_distance {
            let remaining = target_distance - current;
            let mut s = velocity * t + 0.5 * self.decel * t * t;
            s += if remaining > self.fine_threshold {
                rng.random_range(-self.jitter..=self.jitter)
            } else {
                rng.random_range(-self.fine_jitter..=self.fine_jitter)
            };
            s = s.max(MIN_STEP).min(remaining);

            velocity = (velocity + self.decel * t).max(0.0);
            track.push(s);
            current += s;
        }

        // Overshoot-and-correct tail: shave a little off the last step, then
        // append the exact residual so the sum lands on the target.
        if track.len() > 3 {
            if let Some(last) = track.last_mut() {
                let pull_back = rng.random_range(0.0..1.0_f64).min(*last);
                *last -= pull_back;
                current -= pull_back;
            }
        }
        let residual = target_distance - current;
        if residual.abs() > f64::EPSILON {
            track.push(residual);
        }

        track
    }
}

/// Generate a trajectory with the default profile.
pub fn generate_trajectory(target_distance: f64) -> Vec<f64> {
    TrajectoryProfile::default().generate(target_distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_sums_to(track: &[f64], distance: f64) {
        let total: f64 = track.iter().sum();
        assert!(
            (total - distance).abs() < 1e-6,
            "trajectory for {distance} sums to {total}"
        );
    }

    #[test]
    fn sum_matches_target_exactly() {
        for distance in [1.0, 5.5, 37.2, 80.0, 123.456, 300.0, 1000.0] {
            for _ in 0..20 {
                let track = generate_trajectory(distance);
                assert!(!track.is_empty());
                assert_sums_to(&track, distance);
            }
        }
    }

    #[test]
    fn zero_distance_yields_empty_trajectory() {
        assert!(generate_trajectory(0.0).is_empty());
        assert!(generate_trajectory(-4.0).is_empty());
    }

    #[test]
    fn steps_never_reverse() {
        for _ in 0..50 {
            let track = generate_trajectory(200.0);
            // The pull-back can shrink the last real step but every emitted
            // delta stays non-negative: a stalled slider does not move back.
            for (i, s) in track.iter().enumerate() {
                assert!(*s >= 0.0, "step {i} is {s}");
            }
        }
    }

    #[test]
    fn acceleration_phase_lands_exactly_on_boundary() {
        let profile = TrajectoryProfile::default();
        for _ in 0..50 {
            let distance = 150.0;
            let boundary = distance * profile.accel_ratio;
            let track = profile.generate(distance);
            // The last acceleration step is clamped, so some cumulative
            // position equals the phase boundary exactly and none exceeds it
            // before that point.
            let mut cumulative = 0.0;
            let mut landed = false;
            for s in &track {
                cumulative += s;
                if (cumulative - boundary).abs() < 1e-6 {
                    landed = true;
                    break;
                }
                assert!(
                    cumulative < boundary,
                    "overshot acceleration boundary: {cumulative} vs {boundary}"
                );
            }
            assert!(landed);
        }
    }

    #[test]
    fn terminates_on_adversarial_distances() {
        // Tiny and fractional distances exercise the MIN_STEP floor that
        // keeps the deceleration loop from stalling.
        for distance in [0.05, 0.3, 1.0001, 2.7, 9.99, 10.01] {
            let track = generate_trajectory(distance);
            assert_sums_to(&track, distance);
            assert!(track.len() < 10_000);
        }
    }

    #[test]
    fn pull_back_correction_keeps_exact_sum() {
        // Long trajectories shave the final step and append the residual;
        // the corrective tail never exceeds the pull-back range and the sum
        // still lands exactly.
        for _ in 0..20 {
            let track = generate_trajectory(400.0);
            assert!(track.len() > 3);
            assert_sums_to(&track, 400.0);
            let last = *track.last().unwrap();
            assert!((0.0..=1.0 + 1e-9).contains(&last), "tail step {last}");
        }
    }
}
