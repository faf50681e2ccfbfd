//! Hit-Test Geometry
//!
//! Pure functions for the three hit shapes used by combat:
//! radius (projectiles, explosions), line (beams) and cone (melee swings).
//! All tests run on the horizontal X/Z plane.

use super::vec3::Vec3;

/// Radius test: hit if the 2D distance from `center` to `target` is at most `radius`.
#[inline]
pub fn check_radius_collision(center: Vec3, radius: f32, target: Vec3) -> bool {
    (target - center).horizontal_length_squared() <= radius * radius
}

/// Line test for beam abilities.
///
/// The target is projected onto the cast direction. It is hit when the
/// projection lies in `[0, range]` and the perpendicular distance from the
/// beam axis is at most `width`.
pub fn check_line_collision(
    origin: Vec3,
    direction: Vec3,
    range: f32,
    width: f32,
    target: Vec3,
) -> bool {
    let dir = direction.normalize_2d();
    if dir == Vec3::ZERO {
        return false;
    }

    let to_target = (target - origin).horizontal();
    let projection = to_target.dot(dir);
    if projection < 0.0 || projection > range {
        return false;
    }

    let closest = dir.scale(projection);
    (to_target - closest).horizontal_length() <= width
}

/// Cone test for melee swings.
///
/// Hit iff the target is within `range` and the angle between `direction`
/// and the vector to the target is at most `angle_deg / 2`. The angle is
/// compared through the normalized dot product against `cos(half_angle)`.
/// A target standing exactly on the origin is always hit.
pub fn check_cone_collision(
    origin: Vec3,
    direction: Vec3,
    range: f32,
    angle_deg: f32,
    target: Vec3,
) -> bool {
    let to_target = (target - origin).horizontal();
    let distance = to_target.horizontal_length();
    if distance > range {
        return false;
    }
    if distance <= f32::EPSILON {
        return true;
    }

    let dir = direction.normalize_2d();
    if dir == Vec3::ZERO {
        return false;
    }

    let half_angle = (angle_deg * 0.5).to_radians();
    let cos_angle = to_target.scale(1.0 / distance).dot(dir);
    cos_angle >= half_angle.cos()
}

/// Angle in degrees (-180..=180) from `facing` to the direction of `target`,
/// positive to the right.
pub fn relative_angle_deg(origin: Vec3, facing_yaw: f32, target: Vec3) -> f32 {
    let to_target = target - origin;
    if to_target.horizontal_length_squared() <= f32::EPSILON {
        return 0.0;
    }
    let mut delta = (to_target.yaw() - facing_yaw).to_degrees();
    while delta > 180.0 {
        delta -= 360.0;
    }
    while delta < -180.0 {
        delta += 360.0;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_radius_ignores_height() {
        let center = Vec3::ZERO;
        // 3 units away horizontally, 10 units above
        let target = Vec3::new(3.0, 10.0, 0.0);
        assert!(check_radius_collision(center, 3.0, target));
        assert!(!check_radius_collision(center, 2.9, target));
    }

    #[test]
    fn test_line_collision() {
        let origin = Vec3::ZERO;
        let dir = Vec3::Z;

        // On axis, inside range
        assert!(check_line_collision(origin, dir, 10.0, 1.0, Vec3::flat(0.0, 5.0)));
        // Off axis but within width
        assert!(check_line_collision(origin, dir, 10.0, 1.0, Vec3::flat(0.9, 5.0)));
        // Too wide
        assert!(!check_line_collision(origin, dir, 10.0, 1.0, Vec3::flat(1.5, 5.0)));
        // Behind the caster
        assert!(!check_line_collision(origin, dir, 10.0, 1.0, Vec3::flat(0.0, -1.0)));
        // Past the range
        assert!(!check_line_collision(origin, dir, 10.0, 1.0, Vec3::flat(0.0, 10.5)));
        // Degenerate direction
        assert!(!check_line_collision(origin, Vec3::ZERO, 10.0, 1.0, Vec3::flat(0.0, 5.0)));
    }

    #[test]
    fn test_cone_collision() {
        let origin = Vec3::ZERO;
        let dir = Vec3::Z;

        // Straight ahead
        assert!(check_cone_collision(origin, dir, 3.0, 90.0, Vec3::flat(0.0, 2.0)));
        // 30 degrees off axis, inside a 90 degree cone
        let thirty = Vec3::from_yaw(30f32.to_radians()).scale(2.0);
        assert!(check_cone_collision(origin, dir, 3.0, 90.0, thirty));
        // 60 degrees off axis, outside a 90 degree cone
        let sixty = Vec3::from_yaw(60f32.to_radians()).scale(2.0);
        assert!(!check_cone_collision(origin, dir, 3.0, 90.0, sixty));
        // Out of range
        assert!(!check_cone_collision(origin, dir, 3.0, 90.0, Vec3::flat(0.0, 3.5)));
        // Behind
        assert!(!check_cone_collision(origin, dir, 3.0, 90.0, Vec3::flat(0.0, -1.0)));
        // Standing on the origin
        assert!(check_cone_collision(origin, dir, 3.0, 10.0, origin));
    }

    #[test]
    fn test_relative_angle() {
        let origin = Vec3::ZERO;
        assert!(relative_angle_deg(origin, 0.0, Vec3::flat(0.0, 5.0)).abs() < 1e-3);
        assert!((relative_angle_deg(origin, 0.0, Vec3::flat(5.0, 0.0)) - 90.0).abs() < 1e-3);
        assert!((relative_angle_deg(origin, 0.0, Vec3::flat(-5.0, 0.0)) + 90.0).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn prop_cone_matches_angle_definition(
            dir_yaw in -3.14f32..3.14,
            target_yaw in -3.14f32..3.14,
            distance in 0.1f32..20.0,
            range in 0.5f32..15.0,
            angle_deg in 1.0f32..359.0,
        ) {
            let origin = Vec3::new(1.0, 0.0, -2.0);
            let dir = Vec3::from_yaw(dir_yaw);
            let target = origin + Vec3::from_yaw(target_yaw).scale(distance);

            let to_target = (target - origin).normalize_2d();
            let angle = to_target.dot(dir).clamp(-1.0, 1.0).acos().to_degrees();
            let dist = origin.distance_2d(target);

            // Skip float-boundary cases where either comparison is ambiguous
            prop_assume!((angle - angle_deg / 2.0).abs() > 0.01);
            prop_assume!((dist - range).abs() > 1e-3);

            let expected = dist <= range && angle <= angle_deg / 2.0;
            prop_assert_eq!(check_cone_collision(origin, dir, range, angle_deg, target), expected);
        }
    }
}
