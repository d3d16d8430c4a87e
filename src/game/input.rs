//! Per-player input state: held keys, walking and the boost ("dash") machine
//!
//! A boost is started by tapping two opposite keys in a row while holding
//! exactly one key on the other axis, e.g. left then right while holding up
//! dashes upwards. Keeping the alternating rhythm grows the boost, mashing the
//! same key shrinks it and anything else cancels it.

use serde::{Deserialize, Serialize};

use super::vector::Vec2;

/// Base walking speed in px/ms
pub const WALK_SPEED: f64 = 124.0 / 1000.0;

/// Boost magnitude added by a start or an alternating tap
pub const BOOST_STEP: f64 = 0.5;
/// Boost magnitude removed by repeating the same key
pub const BOOST_REPEAT_PENALTY: f64 = 0.1;
/// Upper bound for the banked boost magnitude
pub const BOOST_MULTIPLIER_MAX: f64 = 3.0;
/// Upper bound for the magnitude actually applied to velocity
pub const BOOST_EFFECTIVE_MAX: f64 = 2.5;

/// Directional key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Axis unit vector for this key (y grows upwards)
    pub fn unit_vector(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::new(0.0, 1.0),
            Direction::Down => Vec2::new(0.0, -1.0),
            Direction::Left => Vec2::new(-1.0, 0.0),
            Direction::Right => Vec2::new(1.0, 0.0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// True iff both keys lie on the same axis and point away from each other
    pub fn is_opposite(self, other: Direction) -> bool {
        self.opposite() == other
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    fn bit(self) -> u8 {
        match self {
            Direction::Up => 0b0001,
            Direction::Down => 0b0010,
            Direction::Left => 0b0100,
            Direction::Right => 0b1000,
        }
    }
}

/// Set of currently held keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySet(u8);

impl KeySet {
    pub fn contains(self, dir: Direction) -> bool {
        self.0 & dir.bit() != 0
    }

    /// Returns false if the key was already held
    pub fn insert(&mut self, dir: Direction) -> bool {
        let added = !self.contains(dir);
        self.0 |= dir.bit();
        added
    }

    /// Returns false if the key was not held
    pub fn remove(&mut self, dir: Direction) -> bool {
        let removed = self.contains(dir);
        self.0 &= !dir.bit();
        removed
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The one held key on the axis perpendicular to `dir`. None when neither
    /// or both keys of that axis are held.
    pub fn single_orthogonal_to(self, dir: Direction) -> Option<Direction> {
        let (first, second) = if dir.is_horizontal() {
            (Direction::Up, Direction::Down)
        } else {
            (Direction::Left, Direction::Right)
        };
        match (self.contains(first), self.contains(second)) {
            (true, false) => Some(first),
            (false, true) => Some(second),
            _ => None,
        }
    }
}

impl FromIterator<Direction> for KeySet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut set = KeySet::default();
        for dir in iter {
            set.insert(dir);
        }
        set
    }
}

/// Walking sub-state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WalkState {
    /// Un-normalized sum of held key vectors; opposite keys cancel out
    pub direction_pressed: Vec2,
    pub keys_pressed: KeySet,
}

impl WalkState {
    pub fn press(&mut self, dir: Direction) {
        if self.keys_pressed.insert(dir) {
            self.direction_pressed = self.direction_pressed + dir.unit_vector();
        }
    }

    pub fn release(&mut self, dir: Direction) {
        if self.keys_pressed.remove(dir) {
            self.direction_pressed = self.direction_pressed + dir.unit_vector() * -1.0;
        }
    }

    pub fn velocity(&self) -> Vec2 {
        self.direction_pressed.normalized(WALK_SPEED)
    }
}

/// The last two distinct keys pressed, oldest first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyHistory {
    older: Option<Direction>,
    latest: Option<Direction>,
    repeat: bool,
}

impl KeyHistory {
    /// Record a press. Pressing the latest key again only flags a repeat.
    pub fn record(&mut self, key: Direction) {
        if self.latest == Some(key) {
            self.repeat = true;
        } else {
            self.repeat = false;
            self.older = self.latest;
            self.latest = Some(key);
        }
    }

    pub fn older(&self) -> Option<Direction> {
        self.older
    }

    pub fn latest(&self) -> Option<Direction> {
        self.latest
    }

    pub fn is_repeat(&self) -> bool {
        self.repeat
    }
}

/// Boost magnitude state. Direction, key and a positive magnitude only exist
/// together.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BoostState {
    #[default]
    Idle,
    Boosting {
        /// Key that has to stay held; also the boost direction
        key: Direction,
        /// Banked magnitude in units of walk speed, in (0, 3]
        multiplier: f64,
        /// `min(multiplier, 2.5)`
        effective: f64,
    },
}

impl BoostState {
    /// Build an active boost; `multiplier` must be positive.
    pub fn boosting(key: Direction, multiplier: f64) -> Self {
        debug_assert!(multiplier > 0.0, "boost started with non-positive multiplier");
        let multiplier = multiplier.min(BOOST_MULTIPLIER_MAX);
        BoostState::Boosting {
            key,
            multiplier,
            effective: multiplier.min(BOOST_EFFECTIVE_MAX),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, BoostState::Boosting { .. })
    }

    pub fn key(&self) -> Option<Direction> {
        match self {
            BoostState::Idle => None,
            BoostState::Boosting { key, .. } => Some(*key),
        }
    }

    pub fn direction(&self) -> Option<Vec2> {
        self.key().map(Direction::unit_vector)
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            BoostState::Idle => 0.0,
            BoostState::Boosting { multiplier, .. } => *multiplier,
        }
    }

    pub fn effective_multiplier(&self) -> f64 {
        match self {
            BoostState::Idle => 0.0,
            BoostState::Boosting { effective, .. } => *effective,
        }
    }
}

/// Boost machine: magnitude state plus the key history that drives it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Boost {
    pub state: BoostState,
    pub history: KeyHistory,
}

impl Boost {
    /// Add `inc` to the magnitude and point the boost at `key`. Dropping to
    /// zero or below is a full reset.
    fn apply(self, key: Direction, inc: f64) -> Boost {
        let multiplier = self.state.multiplier() + inc;
        if multiplier <= 0.0 {
            return Boost::default();
        }
        Boost {
            state: BoostState::boosting(key, multiplier),
            history: self.history,
        }
    }

    /// Replace the magnitude, keeping key and history. Used by decay.
    pub fn with_multiplier(self, multiplier: f64) -> Boost {
        match self.state.key() {
            Some(key) if multiplier > 0.0 => Boost {
                state: BoostState::boosting(key, multiplier),
                history: self.history,
            },
            _ => Boost::default(),
        }
    }

    /// Transition after `key` was pressed. `held` must already include it.
    pub fn on_press(self, key: Direction, held: KeySet) -> Boost {
        let mut next = self;
        next.history.record(key);

        let (Some(a), Some(b)) = (next.history.older(), next.history.latest()) else {
            return next;
        };
        let c = held.single_orthogonal_to(b);
        let alternating = a.is_opposite(b);

        match next.state {
            BoostState::Idle => match c {
                Some(c) if alternating => next.apply(c, BOOST_STEP),
                _ => next,
            },
            BoostState::Boosting { key: active, .. } => {
                let repeat = next.history.is_repeat();
                if c == Some(active) && !repeat && alternating {
                    next.apply(active, BOOST_STEP)
                } else if c == Some(active) && repeat {
                    next.apply(active, -BOOST_REPEAT_PENALTY)
                } else if let Some(c) = c.filter(|_| b.is_opposite(active)) {
                    next.apply(c, 0.0)
                } else {
                    Boost::default()
                }
            }
        }
    }

    /// Transition after `key` was released. `held` must already exclude it.
    pub fn on_release(self, key: Direction, held: KeySet) -> Boost {
        match self.state {
            BoostState::Idle => self,
            BoostState::Boosting { key: active, .. } => {
                if held.is_empty() || (key == active && held.len() != 1) {
                    Boost::default()
                } else {
                    self
                }
            }
        }
    }
}

/// Server-side input record for one connected player
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInput {
    pub walk: WalkState,
    pub boost: Boost,
}

impl PlayerInput {
    pub fn key_pressed(&mut self, dir: Direction) {
        self.walk.press(dir);
        self.boost = self.boost.on_press(dir, self.walk.keys_pressed);
    }

    pub fn key_released(&mut self, dir: Direction) {
        self.walk.release(dir);
        self.boost = self.boost.on_release(dir, self.walk.keys_pressed);
    }

    /// Walk velocity plus the boost velocity, if any
    pub fn velocity(&self) -> Vec2 {
        let walk = self.walk.velocity();
        match self.boost.state.direction() {
            Some(dir) => {
                let speed = self.boost.state.effective_multiplier() * WALK_SPEED;
                walk + dir.normalized(speed)
            }
            None => walk,
        }
    }
}
