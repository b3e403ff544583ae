//! Minimal 2D rigid-body world for the table.
//!
//! Integrates the ball and both paddles, then resolves the fixed collision set:
//! ball vs paddle, ball vs top/bottom boundary and ball vs net. Crossing the
//! left or right edge is not a collision; the simulation scores it.
//!
//! `step` is pure and deterministic for a given input. Callers must pass a
//! finite `0 < dt <= max_dt`.

use pong_shared::config::PhysicsConfig;
use pong_shared::protocol::Side;
use pong_shared::vec2::{add, dot, reflect, scale, sub, Vec2};

const EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    /// Centre of the ball
    pub position: Vec2,
    pub velocity: Vec2,
    pub spin: Vec2,
}

impl Ball {
    pub fn at_rest(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            spin: Vec2::ZERO,
        }
    }
}

/// Paddles only move vertically; `position` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub side: Side,
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddles {
    pub left: Paddle,
    pub right: Paddle,
}

impl Paddles {
    pub fn get(&self, side: Side) -> &Paddle {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut Paddle {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

/// What the ball touched during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    Paddle(Side),
    Boundary,
    Net,
}

pub struct World {
    config: PhysicsConfig,
}

impl World {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.config.world_width / 2.0, self.config.world_height / 2.0)
    }

    /// Top-left corner of a paddle resting at vertical centre.
    pub fn paddle_home(&self, side: Side) -> Vec2 {
        let c = &self.config;
        let x = match side {
            Side::Left => c.paddle_offset,
            Side::Right => c.world_width - c.paddle_offset - c.paddle_width,
        };
        Vec2::new(x, (c.world_height - c.paddle_height) / 2.0)
    }

    pub fn spawn_paddles(&self) -> Paddles {
        let paddle = |side| Paddle {
            side,
            position: self.paddle_home(side),
            velocity: Vec2::ZERO,
        };
        Paddles {
            left: paddle(Side::Left),
            right: paddle(Side::Right),
        }
    }

    /// Highest y a paddle's top edge may reach.
    pub fn paddle_max_y(&self) -> f64 {
        self.config.world_height - self.config.paddle_height
    }

    /// Advance all bodies by `dt` seconds and report the ball's contacts.
    pub fn step(&self, ball: Option<&mut Ball>, paddles: &mut Paddles, dt: f64) -> Vec<Contact> {
        debug_assert!(dt.is_finite() && dt > 0.0, "dt must be finite and positive");

        self.step_paddle(&mut paddles.left, dt);
        self.step_paddle(&mut paddles.right, dt);

        let mut contacts = Vec::new();
        let Some(ball) = ball else {
            return contacts;
        };

        let previous = ball.position;
        self.integrate_ball(ball, dt);

        if self.collide_boundary(ball) {
            contacts.push(Contact::Boundary);
        }
        if self.collide_net(ball, previous) {
            contacts.push(Contact::Net);
        }
        for side in Side::ALL {
            if self.collide_paddle(ball, paddles.get(side)) {
                contacts.push(Contact::Paddle(side));
            }
        }
        contacts
    }

    fn step_paddle(&self, paddle: &mut Paddle, dt: f64) {
        let c = &self.config;
        paddle.velocity.x = 0.0;
        paddle.velocity.y = paddle.velocity.y.clamp(-c.paddle_max_speed, c.paddle_max_speed);
        paddle.position.y += paddle.velocity.y * dt;

        let max_y = self.paddle_max_y();
        if paddle.position.y <= 0.0 {
            paddle.position.y = 0.0;
            paddle.velocity.y = paddle.velocity.y.max(0.0);
        } else if paddle.position.y >= max_y {
            paddle.position.y = max_y;
            paddle.velocity.y = paddle.velocity.y.min(0.0);
        }

        paddle.velocity.y *= c.paddle_velocity_retention.powf(dt);
    }

    fn integrate_ball(&self, ball: &mut Ball, dt: f64) {
        let c = &self.config;
        let drag = (-(c.air_resistance / c.ball_mass) * dt).exp();
        ball.velocity = scale(ball.velocity, drag);
        ball.velocity = add(ball.velocity, scale(ball.spin, c.spin_curve * dt));
        ball.spin = scale(ball.spin, c.spin_decay.powf(dt));
        ball.position = add(ball.position, scale(ball.velocity, dt));
    }

    fn collide_boundary(&self, ball: &mut Ball) -> bool {
        let c = &self.config;
        let r = c.ball_radius;
        if ball.position.y - r < 0.0 {
            ball.position.y = r;
            ball.velocity.y = ball.velocity.y.abs() * c.boundary_restitution;
            true
        } else if ball.position.y + r > c.world_height {
            ball.position.y = c.world_height - r;
            ball.velocity.y = -ball.velocity.y.abs() * c.boundary_restitution;
            true
        } else {
            false
        }
    }

    /// The net only blocks a ball that crosses one of its faces during this
    /// step, so a ball resting on the midline can always be served.
    fn collide_net(&self, ball: &mut Ball, previous: Vec2) -> bool {
        let c = &self.config;
        if c.net_height <= 0.0 {
            return false;
        }
        let r = c.ball_radius;
        let mid_x = c.world_width / 2.0;
        let half_thickness = c.net_thickness / 2.0;
        let top = (c.world_height - c.net_height) / 2.0 - r;
        let bottom = (c.world_height + c.net_height) / 2.0 + r;
        if ball.position.y < top || ball.position.y > bottom {
            return false;
        }

        let left_face = mid_x - half_thickness;
        let right_face = mid_x + half_thickness;
        if ball.velocity.x > 0.0
            && previous.x + r <= left_face
            && ball.position.x + r > left_face
        {
            ball.position.x = left_face - r;
        } else if ball.velocity.x < 0.0
            && previous.x - r >= right_face
            && ball.position.x - r < right_face
        {
            ball.position.x = right_face + r;
        } else {
            return false;
        }
        ball.velocity.x = -ball.velocity.x * c.net_restitution;
        true
    }

    fn collide_paddle(&self, ball: &mut Ball, paddle: &Paddle) -> bool {
        let c = &self.config;
        let r = c.ball_radius;
        let min = paddle.position;
        let max = Vec2::new(min.x + c.paddle_width, min.y + c.paddle_height);

        let closest = Vec2::new(
            ball.position.x.clamp(min.x, max.x),
            ball.position.y.clamp(min.y, max.y),
        );
        let offset = sub(ball.position, closest);
        let dist_sq = dot(offset, offset);
        if dist_sq >= r * r {
            return false;
        }

        // Centre inside the paddle: push out through the face towards the table.
        let (normal, resolved) = if dist_sq > EPSILON {
            let normal = scale(offset, 1.0 / dist_sq.sqrt());
            (normal, add(closest, scale(normal, r)))
        } else {
            match paddle.side {
                Side::Left => (Vec2::new(1.0, 0.0), Vec2::new(max.x + r, ball.position.y)),
                Side::Right => (Vec2::new(-1.0, 0.0), Vec2::new(min.x - r, ball.position.y)),
            }
        };
        if dot(ball.velocity, normal) >= 0.0 {
            return false;
        }

        ball.velocity = scale(reflect(ball.velocity, normal), c.paddle_restitution);
        ball.spin = add(ball.spin, scale(paddle.velocity, c.spin_transfer));
        ball.velocity = add(ball.velocity, scale(ball.spin, c.spin_multiplier));
        ball.position = resolved;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pong_shared::vec2::length;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn world() -> World {
        World::new(PhysicsConfig::default())
    }

    fn moving_ball(x: f64, y: f64, vx: f64, vy: f64) -> Ball {
        Ball {
            position: Vec2::new(x, y),
            velocity: Vec2::new(vx, vy),
            spin: Vec2::ZERO,
        }
    }

    #[test]
    fn paddles_spawn_centred_at_side_offsets() {
        let w = world();
        let p = w.spawn_paddles();
        assert_eq!(p.left.position, Vec2::new(50.0, 250.0));
        assert_eq!(p.right.position, Vec2::new(730.0, 250.0));
    }

    #[test]
    fn ball_moves_along_velocity() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        let mut ball = moving_ball(400.0, 100.0, 120.0, 60.0);
        w.step(Some(&mut ball), &mut paddles, 0.01);
        assert!(ball.position.x > 401.0 && ball.position.x < 401.3);
        assert!(ball.position.y > 100.5 && ball.position.y < 100.7);
    }

    #[test]
    fn top_boundary_reflects_vertical_velocity() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        let mut ball = moving_ball(300.0, 11.0, 0.0, -200.0);
        let contacts = w.step(Some(&mut ball), &mut paddles, 0.02);
        assert!(contacts.contains(&Contact::Boundary));
        assert_eq!(ball.position.y, 10.0);
        assert!(ball.velocity.y > 0.0);
    }

    #[test]
    fn bottom_boundary_reflects_vertical_velocity() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        let mut ball = moving_ball(300.0, 589.0, 10.0, 200.0);
        w.step(Some(&mut ball), &mut paddles, 0.02);
        assert_eq!(ball.position.y, 590.0);
        assert!(ball.velocity.y < 0.0);
    }

    #[test]
    fn side_edges_are_not_collisions() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        // Above the left paddle's reach, heading off the table.
        paddles.left.position.y = 400.0;
        let mut ball = moving_ball(5.0, 100.0, -300.0, 0.0);
        let contacts = w.step(Some(&mut ball), &mut paddles, 0.05);
        assert!(contacts.is_empty());
        assert!(ball.position.x < 0.0);
    }

    #[test]
    fn ball_bounces_off_left_paddle_with_restitution() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        // Left paddle face at x = 70, spans y 250..350.
        let mut ball = moving_ball(82.0, 300.0, -300.0, 0.0);
        let contacts = w.step(Some(&mut ball), &mut paddles, 0.02);
        assert!(contacts.contains(&Contact::Paddle(Side::Left)));
        assert!(ball.velocity.x > 0.0);
        let expected = 300.0 * 0.8;
        assert!((ball.velocity.x - expected).abs() < 1.0, "vx = {}", ball.velocity.x);
        assert!(ball.position.x >= 80.0 - 1e-9);
    }

    #[test]
    fn ball_bounces_off_right_paddle() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        // Right paddle face at x = 730.
        let mut ball = moving_ball(718.0, 300.0, 300.0, 0.0);
        let contacts = w.step(Some(&mut ball), &mut paddles, 0.02);
        assert!(contacts.contains(&Contact::Paddle(Side::Right)));
        assert!(ball.velocity.x < 0.0);
        assert!(ball.position.x <= 720.0 + 1e-9);
    }

    #[test]
    fn moving_paddle_imparts_spin_and_deflection() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        paddles.left.velocity.y = 300.0;
        let mut ball = moving_ball(82.0, 300.0, -300.0, 0.0);
        w.step(Some(&mut ball), &mut paddles, 0.02);
        assert!(ball.spin.y > 0.0);
        assert!(ball.velocity.y > 0.0);
    }

    #[test]
    fn spin_decays_in_flight() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        let mut ball = moving_ball(400.0, 100.0, 100.0, 0.0);
        ball.spin = Vec2::new(0.0, 50.0);
        for _ in 0..60 {
            w.step(Some(&mut ball), &mut paddles, 1.0 / 60.0);
        }
        // 0.99 per second.
        assert!((ball.spin.y - 49.5).abs() < 0.01, "spin = {}", ball.spin.y);
        assert!(ball.velocity.y > 0.0, "spin should curve the ball");
    }

    #[test]
    fn net_blocks_crossing_ball() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        let mut ball = moving_ball(385.0, 300.0, 300.0, 0.0);
        let contacts = w.step(Some(&mut ball), &mut paddles, 0.02);
        assert!(contacts.contains(&Contact::Net));
        assert!(ball.velocity.x < 0.0);
        assert!(ball.position.x <= 389.0 + 1e-9);
    }

    #[test]
    fn ball_clears_net_outside_its_span() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        let mut ball = moving_ball(385.0, 100.0, 300.0, 0.0);
        let contacts = w.step(Some(&mut ball), &mut paddles, 0.02);
        assert!(contacts.is_empty());
        assert!(ball.position.x > 390.0);
    }

    #[test]
    fn ball_served_from_centre_is_not_blocked_by_net() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        for vx in [300.0, -300.0] {
            let mut ball = moving_ball(400.0, 300.0, vx, 0.0);
            let contacts = w.step(Some(&mut ball), &mut paddles, 0.02);
            assert!(!contacts.contains(&Contact::Net));
            assert_eq!(ball.velocity.x.signum(), vx.signum());
        }
    }

    #[test]
    fn paddle_clamped_to_world() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        paddles.left.velocity.y = -600.0;
        paddles.right.velocity.y = 600.0;
        for _ in 0..120 {
            w.step(None, &mut paddles, 0.05);
            paddles.left.velocity.y = -600.0;
            paddles.right.velocity.y = 600.0;
        }
        assert_eq!(paddles.left.position.y, 0.0);
        assert_eq!(paddles.right.position.y, w.paddle_max_y());
    }

    #[test]
    fn paddle_speed_is_capped_and_x_is_fixed() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        paddles.left.velocity = Vec2::new(50.0, 5000.0);
        w.step(None, &mut paddles, 0.01);
        assert_eq!(paddles.left.position.x, 50.0);
        assert!(paddles.left.position.y <= 250.0 + 600.0 * 0.01 + 1e-9);
    }

    #[test]
    fn paddle_glides_to_a_stop() {
        let w = world();
        let mut paddles = w.spawn_paddles();
        paddles.left.velocity.y = 300.0;
        for _ in 0..120 {
            w.step(None, &mut paddles, 1.0 / 60.0);
        }
        assert!(paddles.left.velocity.y.abs() < 1e-3);
    }

    #[test]
    fn random_steps_stay_finite_and_bounded() {
        let w = world();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut paddles = w.spawn_paddles();
        let mut ball = moving_ball(400.0, 300.0, 280.0, 110.0);
        for i in 0..5000 {
            if i % 7 == 0 {
                let sign = if rng.gen::<bool>() { 1.0 } else { -1.0 };
                paddles.left.velocity.y = 300.0 * sign;
                paddles.right.velocity.y = -300.0 * sign;
            }
            let dt = rng.gen_range(1e-4..=0.05);
            w.step(Some(&mut ball), &mut paddles, dt);
            assert!(ball.position.is_finite() && ball.velocity.is_finite());
            assert!(length(ball.velocity).is_finite());
            for side in Side::ALL {
                let y = paddles.get(side).position.y;
                assert!((0.0..=w.paddle_max_y()).contains(&y));
            }
            // Keep the rally going instead of letting it leave the table.
            if ball.position.x < 0.0 || ball.position.x > 800.0 {
                ball = moving_ball(400.0, 300.0, -ball.velocity.x.signum() * 280.0, 90.0);
            }
        }
    }
}
