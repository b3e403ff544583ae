/// 2D vector utilities for the table plane.
/// Screen coordinates: x grows to the right, y grows downwards.

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector at `angle` radians from the +x axis.
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Dot product
pub fn dot(a: Vec2, b: Vec2) -> f64 {
    a.x * b.x + a.y * b.y
}

/// Vector length
pub fn length(v: Vec2) -> f64 {
    dot(v, v).sqrt()
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

/// Reflect `v` about a surface with unit normal `n`.
pub fn reflect(v: Vec2, n: Vec2) -> Vec2 {
    sub(v, scale(n, 2.0 * dot(v, n)))
}
