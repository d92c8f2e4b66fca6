//! Closed-loop waypoint-following stepper.
//!
//! Each call to [`PathFollower::step`] takes the manipulator's current
//! Cartesian position and velocity and returns the commanded velocity for
//! the next cycle, the acceleration needed to reach it, and whether the
//! path has been fully walked. The algorithm blends a speed term that
//! slows through sharp corners with a proportional off-path correction,
//! then clips the result to the configured velocity bounds.

use std::f64::consts::PI;

/// A point or vector in the manipulator's three-axis workspace.
pub type Vector3 = [f64; 3];

fn sub(a: Vector3, b: Vector3) -> Vector3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add(a: Vector3, b: Vector3) -> Vector3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn scale(a: Vector3, k: f64) -> Vector3 {
    [a[0] * k, a[1] * k, a[2] * k]
}

fn dot(a: Vector3, b: Vector3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: Vector3) -> f64 {
    dot(a, a).sqrt()
}

fn max_abs_component(a: Vector3) -> f64 {
    a[0].abs().max(a[1].abs()).max(a[2].abs())
}

/// Unit vector along `a`, or the zero vector if `a` is (numerically) zero.
fn unit_or_zero(a: Vector3) -> Vector3 {
    let n = norm(a);
    if n == 0.0 {
        [0.0, 0.0, 0.0]
    } else {
        scale(a, 1.0 / n)
    }
}

/// Tunable weights for [`PathFollower`], split out of the constructor so
/// callers only need to name the defaults they're overriding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathFollowerConfig {
    pub max_acceleration: f64,
    pub min_velocity: f64,
    pub aggregation_weight: f64,
    pub future_weight: f64,
    pub off_path_weight: f64,
    pub next_target_tol: f64,
    pub end_vector_weight: f64,
    pub soft_corner_weight: f64,
    pub sharp_corner_weight: f64,
}

impl Default for PathFollowerConfig {
    fn default() -> Self {
        PathFollowerConfig {
            max_acceleration: 10.0,
            min_velocity: 0.001,
            aggregation_weight: 1.0,
            future_weight: 0.5,
            off_path_weight: 1.0,
            next_target_tol: 0.001,
            end_vector_weight: 1.0,
            soft_corner_weight: 0.2,
            sharp_corner_weight: 0.2,
        }
    }
}

/// Progress through the waypoint polyline, lazily seeded on the first
/// [`PathFollower::step`] call (the teacher's equivalent would be an
/// `Option` field checked with `hasattr`).
#[derive(Debug, Clone, Copy)]
struct Progress {
    target_index: usize,
    target: Vector3,
    previous_target: Vector3,
}

/// Stateful stepper over one waypoint polyline.
#[derive(Debug, Clone)]
pub struct PathFollower {
    keypoints: Vec<Vector3>,
    connecting_vectors: Vec<Vector3>,
    segment_lengths: Vec<f64>,
    max_velocity: f64,
    config: PathFollowerConfig,
    progress: Option<Progress>,
}

impl PathFollower {
    /// Build a follower over `waypoints`, appending a synthetic waypoint
    /// past the last one so the aggregation term decelerates into the
    /// endpoint instead of stopping dead against it.
    ///
    /// Panics if `waypoints` has fewer than two points; the synthetic
    /// end-vector needs a final segment to extend.
    pub fn new(waypoints: &[Vector3], max_velocity: f64, config: PathFollowerConfig) -> Self {
        assert!(waypoints.len() >= 2, "path follower needs at least two waypoints");

        let mut keypoints = waypoints.to_vec();
        let last = keypoints[keypoints.len() - 1];
        let second_last = keypoints[keypoints.len() - 2];
        let end_vector = sub(second_last, last);
        let end_unit = unit_or_zero(end_vector);
        keypoints.push(add(last, scale(end_unit, config.end_vector_weight)));

        let n = keypoints.len() - 1;
        let mut connecting_vectors = Vec::with_capacity(n);
        let mut segment_lengths = Vec::with_capacity(n);
        for i in 0..n {
            let v = sub(keypoints[i + 1], keypoints[i]);
            segment_lengths.push(norm(v));
            connecting_vectors.push(v);
        }

        PathFollower {
            keypoints,
            connecting_vectors,
            segment_lengths,
            max_velocity,
            config,
            progress: None,
        }
    }

    /// Convenience constructor for moving to a single destination point
    /// with no intermediate corners, built on the same stepper core.
    pub fn to_single_point(from: Vector3, to: Vector3, max_velocity: f64, config: PathFollowerConfig) -> Self {
        Self::new(&[from, to], max_velocity, config)
    }

    /// Solve `3(a-b+1/3)t^3 + 3(b-2a)t^2 + 3a*t = normalized_angle` for
    /// `t` in `[0, 1]` by bisection, then remap through the cubic
    /// smoothstep `3t^2 - 2t^3`.
    fn non_linearize_angle(&self, normalized_angle: f64) -> f64 {
        let a = 1.0 - self.config.soft_corner_weight;
        let b = 1.0 - self.config.sharp_corner_weight;
        let f = |t: f64| 3.0 * (a - b + 1.0 / 3.0) * t.powi(3) + 3.0 * (b - 2.0 * a) * t.powi(2) + 3.0 * a * t - normalized_angle;

        let (mut lo, mut hi) = (0.0f64, 1.0f64);
        let mut f_lo = f(lo);
        if f_lo != 0.0 {
            for _ in 0..100 {
                let mid = 0.5 * (lo + hi);
                let f_mid = f(mid);
                if f_mid == 0.0 {
                    lo = mid;
                    hi = mid;
                    break;
                }
                if (f_lo < 0.0) == (f_mid < 0.0) {
                    lo = mid;
                    f_lo = f_mid;
                } else {
                    hi = mid;
                }
                if hi - lo < 1e-12 {
                    break;
                }
            }
        } else {
            hi = lo;
        }
        let t = 0.5 * (lo + hi);
        3.0 * t * t - 2.0 * t.powi(3)
    }

    fn off_path_term(&self, previous_target: Vector3, target: Vector3, position: Vector3) -> Vector3 {
        let d = sub(target, previous_target);
        let w = sub(position, previous_target);
        let d_dot_d = dot(d, d);
        let t = if d_dot_d == 0.0 { 0.0 } else { dot(w, d) / d_dot_d };
        let foot = add(previous_target, scale(d, t));
        let normal = sub(foot, position);
        scale(normal, self.config.off_path_weight)
    }

    fn angle_dependent_velocity(&self, position: Vector3, target_index: usize, target: Vector3) -> Vector3 {
        let p_k = sub(target, position);
        let p_k_dist = norm(p_k);
        let p_k_unit = unit_or_zero(p_k);

        let n = self.keypoints.len();
        let mut future_points_sum = 0.0f64;

        for i in target_index..n - 1 {
            let leg = if i == target_index { p_k } else { self.connecting_vectors[i - 1] };
            let next_leg = self.connecting_vectors[i];

            let cos_theta = (dot(leg, next_leg) / (norm(leg) * norm(next_leg))).clamp(-0.9999999, 0.999999);
            let theta = cos_theta.acos();
            let weight = self.non_linearize_angle(theta / PI);

            let mut exponent_sum = p_k_dist;
            for j in (target_index + 1)..=i {
                exponent_sum += self.segment_lengths[j - 1];
            }

            future_points_sum += weight * (-(1.0 / self.config.future_weight) * exponent_sum).exp();
        }

        let aggregation = self.config.aggregation_weight * future_points_sum;
        let alpha = 1.0 - aggregation.min(1.0);

        scale(p_k_unit, alpha * self.max_velocity)
    }

    /// Advance to the next target while `t >= 1` or we're within tolerance
    /// of the current one; returns `true` once the (synthetic) endpoint is
    /// reached.
    fn advance_target(&self, progress: &mut Progress, position: Vector3) -> bool {
        loop {
            let previous_to_target = sub(progress.target, progress.previous_target);
            let previous_to_current = sub(position, progress.previous_target);
            let denom = dot(previous_to_target, previous_to_target);
            let t = if denom == 0.0 { 1.0 } else { dot(previous_to_current, previous_to_target) / denom };

            if t >= 1.0 || norm(sub(progress.target, position)) <= self.config.next_target_tol {
                progress.target_index += 1;
                if progress.target_index + 1 >= self.keypoints.len() {
                    return true;
                }
                progress.previous_target = progress.target;
                progress.target = self.keypoints[progress.target_index];
            } else {
                return false;
            }
        }
    }

    /// Compute the next commanded velocity and acceleration, and whether
    /// the path has been completely walked.
    pub fn step(&mut self, position: Vector3, velocity: Vector3) -> (Vector3, Vector3, bool) {
        let progress = self.progress.get_or_insert(Progress {
            target_index: 0,
            target: self.keypoints[0],
            previous_target: position,
        });
        let (progress_target, progress_previous_target, progress_target_index) =
            (progress.target, progress.previous_target, progress.target_index);

        let off_path = self.off_path_term(progress_previous_target, progress_target, position);
        let agg = self.angle_dependent_velocity(position, progress_target_index, progress_target);

        let mut v_final = add(agg, off_path);
        let p_k_unit = unit_or_zero(sub(progress_target, position));
        if max_abs_component(v_final) > self.max_velocity {
            v_final = scale(unit_or_zero(v_final), self.max_velocity);
        } else if norm(agg) < self.config.min_velocity {
            v_final = scale(p_k_unit, self.config.min_velocity);
        }

        let velocity_error = sub(velocity, v_final);
        let error_norm = norm(velocity_error);
        let a_demand = if error_norm == 0.0 {
            [0.0, 0.0, 0.0]
        } else {
            scale(velocity_error, self.config.max_acceleration / error_norm)
        };

        let mut progress = self.progress.take().expect("seeded above");
        let done = self.advance_target(&mut progress, position);
        self.progress = Some(progress);

        (v_final, a_demand, done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_line_config() -> PathFollowerConfig {
        PathFollowerConfig::default()
    }

    #[test]
    fn straight_line_converges_without_off_path_correction() {
        let waypoints = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let mut follower = PathFollower::new(&waypoints, 0.05, straight_line_config());

        let mut position = [0.0, 0.0, 0.0];
        let mut velocity = [0.0, 0.0, 0.0];
        let mut done = false;
        for _ in 0..5000 {
            let (v, _a, complete) = follower.step(position, velocity);
            position = add(position, scale(v, 0.01));
            velocity = v;
            if complete {
                done = true;
                break;
            }
        }
        assert!(done, "follower never reported completion");
    }

    #[test]
    fn commanded_speed_never_exceeds_max_velocity() {
        let waypoints = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
        let mut follower = PathFollower::new(&waypoints, 0.02, straight_line_config());

        let mut position = [0.0, 0.0, 0.0];
        for _ in 0..200 {
            let (v, _a, complete) = follower.step(position, [0.0, 0.0, 0.0]);
            assert!(max_abs_component(v) <= 0.02 + 1e-9);
            position = add(position, scale(v, 0.01));
            if complete {
                break;
            }
        }
    }

    #[test]
    fn off_path_position_gets_pulled_back_toward_the_line() {
        let waypoints = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let mut follower = PathFollower::new(&waypoints, 0.05, straight_line_config());

        // Seed progress at the origin (also advances onto the first real
        // segment, since the origin coincides with the first waypoint).
        follower.step([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);

        // Displaced off the X axis: the off-path term should pull the
        // commanded velocity toward negative Y.
        let (v, _a, _done) = follower.step([0.1, 0.2, 0.0], [0.0, 0.0, 0.0]);
        assert!(v[1] < 0.0);
    }

    #[test]
    fn non_linearize_angle_is_identity_at_the_endpoints() {
        let follower = PathFollower::new(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            0.05,
            PathFollowerConfig {
                soft_corner_weight: 0.0,
                sharp_corner_weight: 0.0,
                ..straight_line_config()
            },
        );
        assert!((follower.non_linearize_angle(0.0) - 0.0).abs() < 1e-6);
        assert!((follower.non_linearize_angle(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn to_single_point_builds_a_two_keypoint_follower() {
        let mut follower = PathFollower::to_single_point([0.0, 0.0, 0.0], [0.0, 0.0, 0.05], 0.02, straight_line_config());
        // First call seeds progress at the starting point, which coincides
        // with the first waypoint and immediately advances onto the real
        // target; the second call is where motion toward it actually shows.
        follower.step([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let (v, _a, _done) = follower.step([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        assert!(v[2] > 0.0);
    }
}
