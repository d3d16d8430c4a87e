//! Snapshot building

use std::collections::HashMap;

use uuid::Uuid;

use crate::ws::protocol::{HookSnapshot, PlayerSnapshot, ServerMsg};

use super::hook::{HOOK_RADIUS, PLAYER_RADIUS};
use super::world::WorldState;

/// Builds full-state messages for network transmission
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Per-tick broadcast
    pub fn server_image(state: &WorldState) -> ServerMsg {
        ServerMsg::ServerImage {
            players: Self::players(state),
            hooks: Self::hooks(state),
            world: state.world().clone(),
        }
    }

    /// Reply to a join: the current snapshot plus the static radii
    pub fn join_ack(state: &WorldState) -> ServerMsg {
        ServerMsg::Joined {
            players: Self::players(state),
            hooks: Self::hooks(state),
            world: state.world().clone(),
            player_radius: PLAYER_RADIUS,
            hook_radius: HOOK_RADIUS,
        }
    }

    fn players(state: &WorldState) -> HashMap<Uuid, PlayerSnapshot> {
        state
            .players()
            .values()
            .map(|p| {
                (
                    p.id,
                    PlayerSnapshot {
                        loc: p.location,
                        vel: p.velocity,
                        username: p.username.clone(),
                        color: p.color.clone(),
                    },
                )
            })
            .collect()
    }

    fn hooks(state: &WorldState) -> HashMap<Uuid, HookSnapshot> {
        state
            .hooks()
            .iter()
            .map(|(id, h)| {
                (
                    *id,
                    HookSnapshot {
                        loc: h.location,
                        vel: h.velocity,
                        from: h.from,
                        to: h.to,
                    },
                )
            })
            .collect()
    }
}
