/// 2D vector utilities for screen-space physics.
/// Screen coordinates: x grows to the right, y grows downward.

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Shorthand constructor
pub fn vec2(x: f64, y: f64) -> Vec2 {
    Vec2::new(x, y)
}

/// Dot product
pub fn dot(a: Vec2, b: Vec2) -> f64 {
    a.x * b.x + a.y * b.y
}

/// Vector length
pub fn length(v: Vec2) -> f64 {
    (v.x * v.x + v.y * v.y).sqrt()
}

/// Distance between two points
pub fn distance(a: Vec2, b: Vec2) -> f64 {
    length(sub(a, b))
}

/// Normalize vector to unit length. Zero-length input stays zero.
pub fn normalize(v: Vec2) -> Vec2 {
    let len = length(v);
    if len < 1e-10 {
        return Vec2::ZERO;
    }
    Vec2::new(v.x / len, v.y / len)
}

/// Scale vector by scalar
pub fn scale(v: Vec2, s: f64) -> Vec2 {
    Vec2::new(v.x * s, v.y * s)
}

/// Add two vectors
pub fn add(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x + b.x, a.y + b.y)
}

/// Subtract vectors (a - b)
pub fn sub(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x - b.x, a.y - b.y)
}

/// Unit vector for a heading in degrees, counter-clockwise from +x.
/// y is negated because screen y points down, so 90 degrees faces up.
pub fn from_heading_deg(angle_deg: f64) -> Vec2 {
    let rad = angle_deg.to_radians();
    Vec2::new(rad.cos(), -rad.sin())
}

/// Limit vector magnitude to `max`, keeping its direction.
pub fn clamp_length(v: Vec2, max: f64) -> Vec2 {
    let len = length(v);
    if len > max && len > 0.0 {
        scale(v, max / len)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_vec2_close(actual: Vec2, expected: Vec2) {
        assert!(
            (actual.x - expected.x).abs() < EPS && (actual.y - expected.y).abs() < EPS,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn length_of_3_4_is_5() {
        assert!((length(vec2(3.0, 4.0)) - 5.0).abs() < EPS);
    }

    #[test]
    fn dot_orthogonal_is_zero() {
        assert_eq!(dot(vec2(1.0, 0.0), vec2(0.0, 1.0)), 0.0);
    }

    #[test]
    fn normalize_returns_unit_vector() {
        let n = normalize(vec2(10.0, -4.0));
        assert!((length(n) - 1.0).abs() < EPS);
    }

    #[test]
    fn normalize_zero_stays_zero() {
        assert_eq!(normalize(Vec2::ZERO), Vec2::ZERO);
    }

    #[test]
    fn heading_90_points_up_on_screen() {
        assert_vec2_close(from_heading_deg(90.0), vec2(0.0, -1.0));
    }

    #[test]
    fn heading_0_points_right() {
        assert_vec2_close(from_heading_deg(0.0), vec2(1.0, 0.0));
    }

    #[test]
    fn clamp_length_limits_magnitude() {
        let v = clamp_length(vec2(30.0, 40.0), 5.0);
        assert!((length(v) - 5.0).abs() < EPS);
        assert_vec2_close(v, vec2(3.0, 4.0));
    }

    #[test]
    fn clamp_length_leaves_short_vectors() {
        let v = vec2(1.0, 1.0);
        assert_eq!(clamp_length(v, 5.0), v);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = vec2(1.0, 2.0);
        let b = vec2(-3.0, 5.0);
        assert!((distance(a, b) - distance(b, a)).abs() < EPS);
        assert!((distance(a, b) - 5.0).abs() < EPS);
    }
}
