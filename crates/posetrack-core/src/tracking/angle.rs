//! Joint angle

use super::Point;

/// Angle at `vertex` between the rays towards `a` and `c`, in degrees.
///
/// Always within 0..=180; reflex angles are folded back.
pub fn joint_angle(a: Point, vertex: Point, c: Point) -> f64 {
    let radians = (c.y - vertex.y).atan2(c.x - vertex.x) - (a.y - vertex.y).atan2(a.x - vertex.x);
    let angle = radians.to_degrees().abs();
    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_straight_arm() {
        let angle = joint_angle(
            Point::new(0.0, 0.0),
            Point::new(0.5, 0.0),
            Point::new(1.0, 0.0),
        );
        assert_close(angle, 180.0);
    }

    #[test]
    fn test_right_angle() {
        let angle = joint_angle(
            Point::new(0.5, 0.0),
            Point::new(0.5, 0.5),
            Point::new(1.0, 0.5),
        );
        assert_close(angle, 90.0);
    }

    #[test]
    fn test_reflex_angle_is_folded() {
        // 270 degrees one way is 90 degrees the other
        let angle = joint_angle(
            Point::new(0.0, 0.5),
            Point::new(0.5, 0.5),
            Point::new(0.5, 0.0),
        );
        assert_close(angle, 90.0);
    }

    #[test]
    fn test_folded_back_arm() {
        let angle = joint_angle(
            Point::new(0.5, 0.0),
            Point::new(0.5, 0.5),
            Point::new(0.5, 0.1),
        );
        assert_close(angle, 0.0);
    }

    #[test]
    fn test_degenerate_points_stay_in_range() {
        let p = Point::new(0.3, 0.3);
        let angle = joint_angle(p, p, p);
        assert!((0.0..=180.0).contains(&angle));
    }
}
