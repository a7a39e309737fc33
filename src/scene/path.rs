// Closed patrol paths and the per-agent follower that walks them.
//
// Movement is distance-based: each frame adds `speed * dt` to the progress
// along the current segment, so the result does not depend on frame rate.
// Heading is the direction of the current segment and snaps at corners.

use bevy_ecs::prelude::*;
use glam::Vec3;

use crate::errors::PathError;

/// Segments shorter than this are treated as degenerate and skipped.
pub const MIN_SEGMENT_LENGTH: f32 = 1e-4;

/// Ordered, closed loop of waypoints on the ground plane.
#[derive(Debug, Clone, PartialEq)]
pub struct PatrolPath {
    waypoints: Vec<Vec3>,
    /// `lengths[i]` is the distance from waypoint i to waypoint i+1 (wrapping).
    lengths: Vec<f32>,
    perimeter: f32,
}

impl PatrolPath {
    pub fn new(waypoints: Vec<Vec3>) -> Result<Self, PathError> {
        if waypoints.len() < 3 {
            return Err(PathError::TooFewWaypoints(waypoints.len()));
        }
        let n = waypoints.len();
        let lengths: Vec<f32> = (0..n)
            .map(|i| waypoints[i].distance(waypoints[(i + 1) % n]))
            .collect();
        // At least one segment must be long enough for a follower to rest on.
        if !lengths.iter().any(|l| *l >= MIN_SEGMENT_LENGTH) {
            return Err(PathError::ZeroPerimeter);
        }
        let perimeter: f32 = lengths.iter().sum();
        Ok(Self { waypoints, lengths, perimeter })
    }

    /// Four corners of a `width` x `depth` rectangle around `center`,
    /// starting at (+x, -z) and running counter-clockwise seen from above.
    pub fn rectangle(center: Vec3, width: f32, depth: f32) -> Result<Self, PathError> {
        let hw = width / 2.0;
        let hd = depth / 2.0;
        Self::new(vec![
            Vec3::new(center.x + hw, center.y, center.z - hd),
            Vec3::new(center.x + hw, center.y, center.z + hd),
            Vec3::new(center.x - hw, center.y, center.z + hd),
            Vec3::new(center.x - hw, center.y, center.z - hd),
        ])
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn perimeter(&self) -> f32 {
        self.perimeter
    }

    /// Start point, end point and length of segment `i` (wrapping).
    pub fn segment(&self, i: usize) -> (Vec3, Vec3, f32) {
        let n = self.waypoints.len();
        let i = i % n;
        (self.waypoints[i], self.waypoints[(i + 1) % n], self.lengths[i])
    }
}

// Arc-length queries, used to check the incremental follower.
#[cfg(test)]
impl PatrolPath {
    /// Closed-form point at arc length `distance` from waypoint 0.
    pub fn point_at_distance(&self, distance: f32) -> Vec3 {
        let mut remaining = distance.rem_euclid(self.perimeter);
        for i in 0..self.len() {
            let (start, end, length) = self.segment(i);
            if remaining <= length {
                if length < MIN_SEGMENT_LENGTH {
                    return start;
                }
                return start.lerp(end, remaining / length);
            }
            remaining -= length;
        }
        self.waypoints[0]
    }

    /// Arc length from waypoint 0 to the start of segment `i`.
    fn distance_to_segment(&self, i: usize) -> f32 {
        self.lengths[..i % self.len()].iter().sum()
    }
}

/// Per-agent traversal state: which segment, and how far along it.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct PathFollower {
    pub current_segment: usize,
    pub progress: f32,
}

impl PathFollower {
    pub fn advance(&mut self, path: &PatrolPath, speed: f32, dt: f32) {
        let step = speed * dt;
        if !step.is_finite() || step <= 0.0 {
            return;
        }
        self.progress += step;

        // Whole laps land back on the same segment.
        if self.progress >= path.perimeter() {
            self.progress %= path.perimeter();
        }

        // A single step may cross several short segments.
        loop {
            let (_, _, length) = path.segment(self.current_segment);
            if length >= MIN_SEGMENT_LENGTH && self.progress <= length {
                break;
            }
            self.progress -= length;
            self.current_segment = (self.current_segment + 1) % path.len();
        }
    }

    /// Interpolated position and heading (radians, `atan2(dz, dx)`).
    pub fn sample(&self, path: &PatrolPath) -> (Vec3, f32) {
        let (start, end, length) = path.segment(self.current_segment);
        let t = (self.progress / length.max(MIN_SEGMENT_LENGTH)).clamp(0.0, 1.0);
        let direction = end - start;
        (start.lerp(end, t), direction.z.atan2(direction.x))
    }
}

#[cfg(test)]
impl PathFollower {
    /// Start at arc length `distance` from waypoint 0.
    pub fn at_distance(path: &PatrolPath, distance: f32) -> Self {
        let mut follower = Self::default();
        follower.advance(path, 1.0, distance);
        follower
    }

    /// Arc length from waypoint 0 to the follower's current point.
    pub fn distance_along(&self, path: &PatrolPath) -> f32 {
        path.distance_to_segment(self.current_segment) + self.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    const EPSILON: f32 = 1e-3;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_vec(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < EPSILON
    }

    fn lap_path() -> PatrolPath {
        PatrolPath::rectangle(Vec3::new(30.0, 0.0, 0.0), 40.0, 50.0).unwrap()
    }

    #[test]
    fn rectangle_perimeter() {
        let path = lap_path();
        assert_eq!(path.len(), 4);
        assert!(approx(path.perimeter(), 180.0));
        assert_eq!(path.segment(0).0, Vec3::new(50.0, 0.0, -25.0));
    }

    #[test]
    fn rejects_degenerate_paths() {
        assert_eq!(
            PatrolPath::new(vec![Vec3::ZERO, Vec3::X]).unwrap_err(),
            PathError::TooFewWaypoints(2)
        );
        assert_eq!(
            PatrolPath::new(vec![Vec3::ONE; 4]).unwrap_err(),
            PathError::ZeroPerimeter
        );
        // Positive perimeter, but every segment is below the skip threshold.
        let speck = PatrolPath::rectangle(Vec3::ZERO, 5e-5, 5e-5);
        assert_eq!(speck.unwrap_err(), PathError::ZeroPerimeter);
    }

    #[test]
    fn thousand_steps_match_closed_form() {
        let path = lap_path();
        let mut follower = PathFollower::default();
        for _ in 0..1000 {
            follower.advance(&path, 5.0, 0.1);
        }
        // 500 units travelled, 500 mod 180 = 140 → the fourth corner.
        let (position, _) = follower.sample(&path);
        let expected = path.point_at_distance(500.0);
        assert!(approx_vec(position, expected), "{position} vs {expected}");
        assert!(approx_vec(expected, Vec3::new(10.0, 0.0, -25.0)));
    }

    #[test]
    fn cumulative_progress_is_speed_times_time_mod_perimeter() {
        let path = lap_path();
        let steps = [0.016, 0.033, 0.25, 1.7, 0.0, 0.5, 3.9, 0.07];
        let speed = 7.5;
        let mut follower = PathFollower::default();
        let mut total = 0.0_f32;
        for dt in steps.iter().cycle().take(200) {
            follower.advance(&path, speed, *dt);
            total += speed * dt;
            let expected = total.rem_euclid(path.perimeter());
            let actual = follower.distance_along(&path);
            // Both ends of the seam are the same point on a closed loop.
            let diff = (actual - expected).abs();
            assert!(diff < 0.05 || (path.perimeter() - diff) < 0.05, "{actual} vs {expected}");
        }
    }

    #[test]
    fn one_step_can_cross_several_segments() {
        let path = PatrolPath::new(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 1.0),
        ])
        .unwrap();
        let mut follower = PathFollower::default();
        follower.advance(&path, 2.5, 1.0);
        assert_eq!(follower.current_segment, 2);
        assert!(approx(follower.progress, 0.5));
        let (position, _) = follower.sample(&path);
        assert!(approx_vec(position, Vec3::new(0.5, 0.0, 1.0)));
    }

    #[test]
    fn zero_length_segments_are_skipped() {
        let path = PatrolPath::new(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 3.0),
        ])
        .unwrap();
        let mut follower = PathFollower::default();
        follower.advance(&path, 1.0, 5.0);
        assert_eq!(follower.current_segment, 2);
        let (position, heading) = follower.sample(&path);
        assert!(position.is_finite());
        assert!(approx_vec(position, Vec3::new(4.0, 0.0, 1.0)));
        assert!(approx(heading, FRAC_PI_2));
    }

    #[test]
    fn heading_follows_segment_direction() {
        let path = lap_path();
        let mut follower = PathFollower::default();
        follower.advance(&path, 1.0, 10.0);
        assert!(approx(follower.sample(&path).1, FRAC_PI_2));

        // Into the second segment: heading -x.
        follower.advance(&path, 1.0, 45.0);
        assert_eq!(follower.current_segment, 1);
        assert!(approx(follower.sample(&path).1.abs(), PI));
    }

    #[test]
    fn large_steps_wrap_whole_laps() {
        let path = lap_path();
        let mut follower = PathFollower::default();
        follower.advance(&path, 1.0, 180.0 * 1000.0 + 20.0);
        assert_eq!(follower.current_segment, 0);
        assert!(approx(follower.progress, 20.0));
    }

    #[test]
    fn non_positive_steps_are_ignored() {
        let path = lap_path();
        let mut follower = PathFollower::default();
        follower.advance(&path, -3.0, 1.0);
        follower.advance(&path, f32::NAN, 1.0);
        assert_eq!(follower, PathFollower::default());
    }

    #[test]
    fn at_distance_places_follower() {
        let path = lap_path();
        let follower = PathFollower::at_distance(&path, 95.0);
        assert_eq!(follower.current_segment, 2);
        assert!(approx(follower.progress, 5.0));
    }
}
