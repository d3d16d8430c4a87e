//! Authoritative world state: connected players, live hooks and map data

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::decay;
use super::hook::Hook;
use super::input::{Direction, PlayerInput};
use super::vector::Vec2;

/// Identity of a client connection
pub type ConnectionId = Uuid;
/// Identity of a live hook
pub type HookId = Uuid;

/// Player state (authoritative). The public half is broadcast every tick,
/// `input` never leaves the server.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: ConnectionId,
    pub username: String,
    pub color: String,
    pub location: Vec2,
    pub velocity: Vec2,
    pub input: PlayerInput,
}

impl PlayerState {
    pub fn new(id: ConnectionId, username: String, color: String, location: Vec2) -> Self {
        Self {
            id,
            username,
            color,
            location,
            velocity: Vec2::ZERO,
            input: PlayerInput::default(),
        }
    }

    pub fn key_pressed(&mut self, dir: Direction) {
        self.input.key_pressed(dir);
        self.velocity = self.input.velocity();
    }

    pub fn key_released(&mut self, dir: Direction) {
        self.input.key_released(dir);
        self.velocity = self.input.velocity();
    }

    /// Decay the boost and move by the current velocity. The velocity itself
    /// only changes on key events.
    pub fn integrate(&mut self, dt_ms: f64) {
        self.input.boost = decay::advance(self.input.boost, dt_ms);
        self.location = self.location + self.velocity * dt_ms;
    }
}

/// World state owned by the simulation task
pub struct WorldState {
    players: HashMap<ConnectionId, PlayerState>,
    hooks: HashMap<HookId, Hook>,
    /// Map data, broadcast verbatim
    world: Map<String, Value>,
    rng: ChaCha8Rng,
    /// Insert thrown hooks into `hooks` instead of discarding them
    register_hooks: bool,
}

impl WorldState {
    pub fn new(register_hooks: bool) -> Self {
        Self::from_rng(ChaCha8Rng::from_entropy(), register_hooks)
    }

    #[cfg(test)]
    pub fn with_seed(seed: u64, register_hooks: bool) -> Self {
        Self::from_rng(ChaCha8Rng::seed_from_u64(seed), register_hooks)
    }

    fn from_rng(rng: ChaCha8Rng, register_hooks: bool) -> Self {
        Self {
            players: HashMap::new(),
            hooks: HashMap::new(),
            world: Map::new(),
            rng,
            register_hooks,
        }
    }

    /// Starting location, x in [10, 30) and y in (-90, 10]
    fn generate_spawn_location(&mut self) -> Vec2 {
        let x = 10.0 + self.rng.gen::<f64>() * 20.0;
        let y = 10.0 - self.rng.gen::<f64>() * 100.0;
        Vec2::new(x, y)
    }

    /// `#` followed by unpadded lowercase hex
    fn generate_color(&mut self) -> String {
        format!("#{:x}", self.rng.gen_range(0..0xFF_FFFFu32))
    }

    /// Create the player for a connection. Returns false if the connection
    /// already has one, which is left untouched.
    pub fn join(&mut self, id: ConnectionId, username: String) -> bool {
        if self.players.contains_key(&id) {
            return false;
        }
        let location = self.generate_spawn_location();
        let color = self.generate_color();
        self.players
            .insert(id, PlayerState::new(id, username, color, location));
        true
    }

    /// Returns false if the connection has no player
    pub fn key_pressed(&mut self, id: ConnectionId, dir: Direction) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.key_pressed(dir);
                true
            }
            None => false,
        }
    }

    /// Returns false if the connection has no player
    pub fn key_released(&mut self, id: ConnectionId, dir: Direction) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.key_released(dir);
                true
            }
            None => false,
        }
    }

    /// Throw a hook from the player's rim. The hook only becomes live when
    /// hook registration is enabled; otherwise it is computed and dropped.
    /// A player has at most one live hook, a new throw replaces the old one.
    pub fn throw_hook(&mut self, id: ConnectionId, direction: Vec2) -> Option<HookId> {
        let player = self.players.get(&id)?;
        let hook = Hook::spawn(id, player.location, player.velocity, direction);

        if !self.register_hooks {
            debug!(conn_id = %id, ?hook, "Hook registration disabled, discarding hook");
            return None;
        }

        self.hooks.retain(|_, h| h.from != id);
        let hook_id = Uuid::new_v4();
        self.hooks.insert(hook_id, hook);
        Some(hook_id)
    }

    /// Remove a player and every hook thrown by or attached to it. Returns
    /// false if there was no player.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        self.hooks.retain(|_, h| !h.involves(id));
        self.players.remove(&id).is_some()
    }

    /// Advance every player and hook by `dt_ms` milliseconds
    pub fn step(&mut self, dt_ms: f64) {
        for player in self.players.values_mut() {
            player.integrate(dt_ms);
        }
        for hook in self.hooks.values_mut() {
            hook.integrate(dt_ms);
        }
        self.hooks.retain(|_, h| !h.is_expired());
    }

    pub fn player(&self, id: &ConnectionId) -> Option<&PlayerState> {
        self.players.get(id)
    }

    pub fn players(&self) -> &HashMap<ConnectionId, PlayerState> {
        &self.players
    }

    pub fn hooks(&self) -> &HashMap<HookId, Hook> {
        &self.hooks
    }

    pub fn world(&self) -> &Map<String, Value> {
        &self.world
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::hook::HOOK_LIFETIME_MS;
    use crate::game::input::WALK_SPEED;
    use crate::game::snapshot::SnapshotBuilder;
    use crate::ws::protocol::ServerMsg;
    use assert_approx_eq::assert_approx_eq;

    use Direction::{Left, Right, Up};

    fn world_with_player() -> (WorldState, ConnectionId) {
        let mut world = WorldState::with_seed(7, false);
        let id = Uuid::new_v4();
        assert!(world.join(id, "billybob".to_string()));
        (world, id)
    }

    fn is_valid_color(color: &str) -> bool {
        match color.strip_prefix('#') {
            Some(hex) => {
                (1..=6).contains(&hex.len())
                    && hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            }
            None => false,
        }
    }

    #[test]
    fn test_join_creates_player() {
        let (world, id) = world_with_player();
        let player = world.player(&id).unwrap();

        assert_eq!(player.username, "billybob");
        assert_eq!(player.velocity, Vec2::ZERO);
        assert_eq!(player.input, PlayerInput::default());
        assert!((10.0..=30.0).contains(&player.location.x));
        assert!((-90.0..=10.0).contains(&player.location.y));
        assert!(is_valid_color(&player.color), "bad color {}", player.color);
    }

    #[test]
    fn test_spawn_and_color_ranges() {
        let mut world = WorldState::with_seed(42, false);
        for _ in 0..500 {
            let location = world.generate_spawn_location();
            assert!((10.0..=30.0).contains(&location.x));
            assert!((-90.0..=10.0).contains(&location.y));
            let color = world.generate_color();
            assert!(is_valid_color(&color), "bad color {}", color);
        }
    }

    #[test]
    fn test_rejoin_keeps_existing_player() {
        let (mut world, id) = world_with_player();
        world.key_pressed(id, Up);
        let before = world.player(&id).unwrap().clone();

        assert!(!world.join(id, "someone_else".to_string()));
        let after = world.player(&id).unwrap();
        assert_eq!(after.username, before.username);
        assert_eq!(after.velocity, before.velocity);
        assert_eq!(world.player_count(), 1);
    }

    #[test]
    fn test_key_events_update_velocity() {
        let (mut world, id) = world_with_player();
        world.key_pressed(id, Up);
        world.key_pressed(id, Right);

        let vel = world.player(&id).unwrap().velocity;
        assert_approx_eq!(vel.length(), WALK_SPEED);
        assert_approx_eq!(vel.x, vel.y);

        world.key_released(id, Up);
        world.key_released(id, Right);
        assert_eq!(world.player(&id).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn test_unknown_connection_is_noop() {
        let (mut world, _) = world_with_player();
        let stranger = Uuid::new_v4();

        assert!(!world.key_pressed(stranger, Up));
        assert!(!world.key_released(stranger, Up));
        assert_eq!(world.throw_hook(stranger, Vec2::new(1.0, 0.0)), None);
        assert!(!world.disconnect(stranger));
        assert_eq!(world.player_count(), 1);
    }

    #[test]
    fn test_step_integrates_location() {
        let (mut world, id) = world_with_player();
        let start = world.player(&id).unwrap().location;
        world.key_pressed(id, Right);

        world.step(16.0);
        let player = world.player(&id).unwrap();
        assert_approx_eq!(player.location.x, start.x + WALK_SPEED * 16.0);
        assert_approx_eq!(player.location.y, start.y);
    }

    #[test]
    fn test_step_decays_boost() {
        let (mut world, id) = world_with_player();
        for dir in [Up, Left, Right] {
            world.key_pressed(id, dir);
        }
        assert_approx_eq!(world.player(&id).unwrap().input.boost.state.multiplier(), 0.5);

        world.step(16.0);
        let multiplier = world.player(&id).unwrap().input.boost.state.multiplier();
        assert!(multiplier < 0.5 && multiplier > 0.0);

        world.step(1_000.0);
        assert!(!world.player(&id).unwrap().input.boost.state.is_active());
    }

    #[test]
    fn test_throw_hook_discarded_by_default() {
        let (mut world, id) = world_with_player();
        assert_eq!(world.throw_hook(id, Vec2::new(0.0, 1.0)), None);
        assert!(world.hooks().is_empty());
    }

    #[test]
    fn test_throw_hook_registered_and_integrated() {
        let mut world = WorldState::with_seed(3, true);
        let id = Uuid::new_v4();
        world.join(id, "thrower".to_string());
        let origin = world.player(&id).unwrap().location;

        let hook_id = world.throw_hook(id, Vec2::new(0.0, 2.0)).unwrap();
        let hook = &world.hooks()[&hook_id];
        assert_eq!(hook.from, id);
        assert_approx_eq!(hook.location.y, origin.y + 20.0);

        world.step(10.0);
        assert_approx_eq!(world.hooks()[&hook_id].location.y, origin.y + 20.0 + 2.0);
    }

    #[test]
    fn test_disconnect_tears_down() {
        let (mut world, id) = world_with_player();
        world.key_pressed(id, Up);

        assert!(world.disconnect(id));
        assert!(world.player(&id).is_none());
        assert_eq!(world.player_count(), 0);
        assert!(!world.key_pressed(id, Up));

        world.step(16.0);
        assert!(world.players().is_empty());
    }

    fn world_with_hooks() -> (WorldState, ConnectionId) {
        let mut world = WorldState::with_seed(13, true);
        let id = Uuid::new_v4();
        world.join(id, "thrower".to_string());
        (world, id)
    }

    #[test]
    fn test_new_throw_replaces_previous_hook() {
        let (mut world, id) = world_with_hooks();
        let first = world.throw_hook(id, Vec2::new(1.0, 0.0)).unwrap();
        let second = world.throw_hook(id, Vec2::new(0.0, 1.0)).unwrap();

        assert_eq!(world.hooks().len(), 1);
        assert!(!world.hooks().contains_key(&first));
        assert!(world.hooks().contains_key(&second));
    }

    #[test]
    fn test_hooks_expire_after_lifetime() {
        let (mut world, id) = world_with_hooks();
        let hook_id = world.throw_hook(id, Vec2::new(1.0, 0.0)).unwrap();

        world.step(HOOK_LIFETIME_MS / 2.0);
        assert!(world.hooks().contains_key(&hook_id));

        world.step(HOOK_LIFETIME_MS / 2.0);
        assert!(world.hooks().is_empty());
    }

    #[test]
    fn test_disconnect_removes_player_hooks() {
        let (mut world, leaving) = world_with_hooks();
        let staying = Uuid::new_v4();
        world.join(staying, "stayer".to_string());
        let kept = world.throw_hook(staying, Vec2::new(0.0, 1.0)).unwrap();

        for i in 0..1000 {
            world.throw_hook(leaving, Vec2::new(1.0, i as f64));
        }
        assert_eq!(world.hooks().len(), 2);

        assert!(world.disconnect(leaving));
        world.step(16.0);

        match SnapshotBuilder::server_image(&world) {
            ServerMsg::ServerImage { hooks, .. } => {
                assert!(hooks.values().all(|h| h.from != leaving));
                assert!(hooks.contains_key(&kept));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_disconnect_removes_hooks_attached_to_player() {
        let (mut world, thrower) = world_with_hooks();
        let target = Uuid::new_v4();
        world.join(target, "target".to_string());
        let hook_id = world.throw_hook(thrower, Vec2::new(1.0, 0.0)).unwrap();
        world.hooks.get_mut(&hook_id).unwrap().to = Some(target);

        world.disconnect(target);
        assert!(world.hooks().is_empty());
    }
}
