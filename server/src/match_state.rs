use crate::physics::{Ball, Paddles};
use pong_shared::protocol::Side;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub left: u32,
    pub right: u32,
}

impl Score {
    pub fn award(&mut self, side: Side) {
        match side {
            Side::Left => self.left += 1,
            Side::Right => self.right += 1,
        }
    }
}

/// Ball, paddles and score of one match. Knows nothing about the network.
///
/// `paddles` is `None` until the match is initialized. `ball` is `None`
/// until the first serve; after a point it is re-staged at rest on the
/// centre spot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchState {
    pub ball: Option<Ball>,
    pub paddles: Option<Paddles>,
    pub score: Score,
}

impl MatchState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
