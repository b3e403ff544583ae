//! Per-room match simulation.
//!
//! Phases: `Uninitialized -> Serving -> InPlay -> PointScored -> Serving ...`,
//! with `Finished` terminal once the room is torn down. `PointScored` is
//! transient: a tick that scores leaves the simulation in `Serving`.

use crate::error::PhaseError;
use crate::match_state::MatchState;
use crate::physics::{Ball, Contact, World};
use pong_shared::config::PhysicsConfig;
use pong_shared::protocol::{Direction, Side};
use pong_shared::vec2::{scale, Vec2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Serving,
    InPlay,
    PointScored,
    Finished,
}

pub struct Simulation {
    world: World,
    state: MatchState,
    phase: Phase,
    rng: ChaCha8Rng,
}

impl Simulation {
    pub fn new(config: PhysicsConfig, seed: u64) -> Self {
        Self {
            world: World::new(config),
            state: MatchState::default(),
            phase: Phase::Uninitialized,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Place both paddles at their home positions. No ball until the serve.
    pub fn initialize(&mut self) -> Result<(), PhaseError> {
        match self.phase {
            Phase::Uninitialized => {}
            Phase::Finished => return Err(PhaseError::Finished),
            _ => return Err(PhaseError::AlreadyInitialized),
        }
        self.state.paddles = Some(self.world.spawn_paddles());
        self.state.ball = None;
        self.phase = Phase::Serving;
        Ok(())
    }

    /// Launch the ball from the centre spot at the serve speed and a random
    /// angle within `serve_max_angle` of the horizontal. Serves alternate
    /// direction with every point played, starting towards the right.
    pub fn serve(&mut self) -> Result<Vec2, PhaseError> {
        match self.phase {
            Phase::Serving => {}
            Phase::InPlay | Phase::PointScored => return Err(PhaseError::BallInPlay),
            Phase::Uninitialized => return Err(PhaseError::NotInitialized),
            Phase::Finished => return Err(PhaseError::Finished),
        }

        let config = self.world.config();
        let max_angle = config.serve_max_angle;
        let angle = if max_angle > 0.0 {
            self.rng.gen_range(-max_angle..=max_angle)
        } else {
            0.0
        };
        let mut velocity = scale(Vec2::from_angle(angle), config.serve_speed);
        let points_played = self.state.score.left + self.state.score.right;
        if points_played % 2 == 1 {
            velocity.x = -velocity.x;
        }

        self.state.ball = Some(Ball {
            position: self.world.center(),
            velocity,
            spin: Vec2::ZERO,
        });
        self.phase = Phase::InPlay;
        Ok(velocity)
    }

    /// Advance by `dt` seconds. Returns the side that scored, if any.
    ///
    /// Non-finite or non-positive `dt` is ignored; larger values are clamped
    /// to `max_dt`. While serving only the paddles move.
    pub fn tick(&mut self, dt: f64) -> Option<Side> {
        if !dt.is_finite() || dt <= 0.0 {
            return None;
        }
        let dt = dt.min(self.world.config().max_dt);

        let paddles = self.state.paddles.as_mut()?;
        match self.phase {
            Phase::Serving => {
                self.world.step(None, paddles, dt);
                None
            }
            Phase::InPlay => {
                for contact in self.world.step(self.state.ball.as_mut(), paddles, dt) {
                    if let Contact::Paddle(side) = contact {
                        tracing::trace!("Ball returned by the {} paddle", side);
                    }
                }
                let scorer = self.out_of_bounds()?;
                self.score_point(scorer);
                Some(scorer)
            }
            Phase::Uninitialized | Phase::PointScored | Phase::Finished => None,
        }
    }

    /// Set the named paddle moving at the configured speed.
    pub fn move_paddle(&mut self, side: Side, direction: Direction) -> Result<(), PhaseError> {
        if self.phase == Phase::Finished {
            return Err(PhaseError::Finished);
        }
        let speed = self.world.config().paddle_speed;
        let paddles = self.state.paddles.as_mut().ok_or(PhaseError::NotInitialized)?;
        paddles.get_mut(side).velocity = Vec2::new(0.0, direction.sign() * speed);
        Ok(())
    }

    /// Drop ball, paddles and score.
    pub fn reset(&mut self) {
        self.state.clear();
        self.phase = Phase::Uninitialized;
    }

    /// Stop accepting commands. The last state stays readable.
    pub fn finish(&mut self) {
        self.phase = Phase::Finished;
    }

    fn out_of_bounds(&self) -> Option<Side> {
        let ball = self.state.ball.as_ref()?;
        if ball.position.x < 0.0 {
            Some(Side::Right)
        } else if ball.position.x > self.world.config().world_width {
            Some(Side::Left)
        } else {
            None
        }
    }

    fn score_point(&mut self, scorer: Side) {
        self.state.score.award(scorer);
        self.phase = Phase::PointScored;

        // Paddles stay where they are; a fresh ball waits on the centre spot.
        self.state.ball = Some(Ball::at_rest(self.world.center()));
        self.phase = Phase::Serving;
    }

    #[cfg(test)]
    pub(crate) fn ball_mut(&mut self) -> Option<&mut Ball> {
        self.state.ball.as_mut()
    }
}
