//! Grappling hook projectiles

use uuid::Uuid;

use super::vector::Vec2;

/// Player collision radius in px
pub const PLAYER_RADIUS: f64 = 20.0;
/// Hook collision radius in px
pub const HOOK_RADIUS: f64 = 10.0;
/// Hook launch speed relative to the thrower, in px/ms
pub const HOOK_SPEED: f64 = 200.0 / 1000.0;
/// Time a hook stays live before it despawns, in ms
pub const HOOK_LIFETIME_MS: f64 = 1500.0;

/// A thrown hook
#[derive(Debug, Clone, PartialEq)]
pub struct Hook {
    pub location: Vec2,
    pub velocity: Vec2,
    /// Thrower
    pub from: Uuid,
    /// Attached player, if any
    pub to: Option<Uuid>,
    /// Time since launch in ms
    pub age_ms: f64,
}

impl Hook {
    /// Launch a hook from a player's rim. The thrower's velocity along the
    /// throw direction is added to the launch speed.
    pub fn spawn(owner: Uuid, owner_location: Vec2, owner_velocity: Vec2, direction: Vec2) -> Self {
        let direction = direction.unit();
        let carried = owner_velocity.dot(direction);
        Self {
            location: owner_location + direction.normalized(PLAYER_RADIUS),
            velocity: direction.normalized(HOOK_SPEED + carried),
            from: owner,
            to: None,
            age_ms: 0.0,
        }
    }

    pub fn integrate(&mut self, dt_ms: f64) {
        self.location = self.location + self.velocity * dt_ms;
        self.age_ms += dt_ms;
    }

    pub fn is_expired(&self) -> bool {
        self.age_ms >= HOOK_LIFETIME_MS
    }

    /// True if the hook was thrown by or is attached to `player`
    pub fn involves(&self, player: Uuid) -> bool {
        self.from == player || self.to == Some(player)
    }
}
