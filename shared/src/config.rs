/// Physics configuration for the table.
///
/// Lengths are in world units (pixels of an 800x600 table), time in seconds.
/// The same values apply to every room; clients receive them in `welcome`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PhysicsConfig {
    pub world_width: f64,
    pub world_height: f64,
    /// Distance from each side edge to the paddle's outer face
    pub paddle_offset: f64,
    pub paddle_width: f64,
    pub paddle_height: f64,
    /// Speed set by a single move command (units/s)
    pub paddle_speed: f64,
    pub paddle_max_speed: f64,
    /// Fraction of paddle velocity left after one second without input
    pub paddle_velocity_retention: f64,
    pub ball_radius: f64,
    pub ball_mass: f64,
    /// Energy kept by the ball when it bounces off a paddle
    pub paddle_restitution: f64,
    /// Energy kept by the ball when it bounces off the top/bottom edge
    pub boundary_restitution: f64,
    pub net_height: f64,
    pub net_thickness: f64,
    pub net_restitution: f64,
    /// Linear drag coefficient; deceleration is `air_resistance / ball_mass` per second
    pub air_resistance: f64,
    /// Fraction of spin left after one second
    pub spin_decay: f64,
    /// Lateral acceleration per unit of spin while the ball is in flight
    pub spin_curve: f64,
    /// Spin picked up per unit of paddle velocity on contact
    pub spin_transfer: f64,
    /// Velocity kick per unit of spin applied when the ball leaves a paddle
    pub spin_multiplier: f64,
    pub serve_speed: f64,
    /// Maximum serve angle off the horizontal (radians)
    pub serve_max_angle: f64,
    /// Largest dt a single step may integrate (seconds)
    pub max_dt: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            world_width: 800.0,
            world_height: 600.0,
            paddle_offset: 50.0,
            paddle_width: 20.0,
            paddle_height: 100.0,
            paddle_speed: 300.0,
            paddle_max_speed: 600.0,
            paddle_velocity_retention: 0.001,
            ball_radius: 10.0,
            ball_mass: 0.0027,
            paddle_restitution: 0.8,
            boundary_restitution: 1.0,
            net_height: 100.0,
            net_thickness: 2.0,
            net_restitution: 0.5,
            air_resistance: 0.0001,
            spin_decay: 0.99,
            spin_curve: 0.5,
            spin_transfer: 0.2,
            spin_multiplier: 0.1,
            serve_speed: 300.0,
            serve_max_angle: std::f64::consts::FRAC_PI_4,
            max_dt: 0.05,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.world_width.is_finite() || self.world_width <= 0.0 {
            return Err("world_width must be finite and > 0".to_string());
        }
        if !self.world_height.is_finite() || self.world_height <= 0.0 {
            return Err("world_height must be finite and > 0".to_string());
        }
        if !self.paddle_height.is_finite()
            || self.paddle_height <= 0.0
            || self.paddle_height > self.world_height
        {
            return Err("paddle_height must be in (0, world_height]".to_string());
        }
        if !self.paddle_width.is_finite() || self.paddle_width <= 0.0 {
            return Err("paddle_width must be finite and > 0".to_string());
        }
        if self.paddle_offset < 0.0
            || 2.0 * (self.paddle_offset + self.paddle_width) >= self.world_width
        {
            return Err("paddles must fit on their own half of the table".to_string());
        }
        if !self.ball_radius.is_finite()
            || self.ball_radius <= 0.0
            || 2.0 * self.ball_radius >= self.world_height
        {
            return Err("ball_radius must be > 0 and fit between the boundaries".to_string());
        }
        if !self.ball_mass.is_finite() || self.ball_mass <= 0.0 {
            return Err("ball_mass must be finite and > 0".to_string());
        }
        for (name, value) in [
            ("paddle_restitution", self.paddle_restitution),
            ("boundary_restitution", self.boundary_restitution),
            ("net_restitution", self.net_restitution),
            ("spin_decay", self.spin_decay),
            ("paddle_velocity_retention", self.paddle_velocity_retention),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be in [0, 1]", name));
            }
        }
        if self.net_height < 0.0 || self.net_height > self.world_height {
            return Err("net_height must be in [0, world_height]".to_string());
        }
        if !self.paddle_speed.is_finite()
            || self.paddle_speed <= 0.0
            || self.paddle_speed > self.paddle_max_speed
        {
            return Err("paddle_speed must be in (0, paddle_max_speed]".to_string());
        }
        if !self.serve_speed.is_finite() || self.serve_speed <= 0.0 {
            return Err("serve_speed must be finite and > 0".to_string());
        }
        if !(0.0..std::f64::consts::FRAC_PI_2).contains(&self.serve_max_angle) {
            return Err("serve_max_angle must be in [0, PI/2)".to_string());
        }
        if !self.max_dt.is_finite() || self.max_dt <= 0.0 {
            return Err("max_dt must be finite and > 0".to_string());
        }
        // A ball at max_dt must not jump across a paddle in one step.
        if self.serve_speed * self.max_dt >= self.paddle_width + self.ball_radius {
            return Err("max_dt too large for paddle_width at serve speed".to_string());
        }
        Ok(())
    }
}
