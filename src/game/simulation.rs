//! Simulation worker and authoritative tick loop
//!
//! A single task owns the [`WorldState`]. Connection tasks talk to it through
//! [`GameCommand`]s, so every event and every tick is applied atomically and in
//! arrival order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::util::time::TickClock;
use crate::ws::protocol::ServerMsg;

use super::input::Direction;
use super::snapshot::SnapshotBuilder;
use super::vector::Vec2;
use super::world::{ConnectionId, WorldState};

/// Inbound event from a connection
#[derive(Debug)]
pub enum GameCommand {
    Join {
        conn_id: ConnectionId,
        username: String,
        /// Receives the join acknowledgment
        reply: oneshot::Sender<ServerMsg>,
    },
    KeyPressed {
        conn_id: ConnectionId,
        dir: Direction,
    },
    KeyReleased {
        conn_id: ConnectionId,
        dir: Direction,
    },
    ThrowHook {
        conn_id: ConnectionId,
        direction: Vec2,
    },
    Disconnect {
        conn_id: ConnectionId,
        reason: String,
    },
}

/// Handle to the running simulation
#[derive(Clone)]
pub struct GameHandle {
    pub command_tx: mpsc::Sender<GameCommand>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
}

impl GameHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Receive every broadcast from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }
}

/// The authoritative simulation
pub struct Simulation {
    state: WorldState,
    command_rx: mpsc::Receiver<GameCommand>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    clock: TickClock,
    tick_interval: Duration,
    player_count: Arc<AtomicUsize>,
}

impl Simulation {
    pub fn new(state: WorldState, tick_interval: Duration) -> (Self, GameHandle) {
        let (command_tx, command_rx) = mpsc::channel(1024);
        let (snapshot_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = GameHandle {
            command_tx,
            snapshot_tx: snapshot_tx.clone(),
            player_count: player_count.clone(),
        };

        let simulation = Self {
            state,
            command_rx,
            snapshot_tx,
            clock: TickClock::new(),
            tick_interval,
            player_count,
        };

        (simulation, handle)
    }

    /// Run until every command sender is gone
    pub async fn run(mut self) {
        info!(tick_ms = self.tick_interval.as_millis() as u64, "Simulation started");

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(Instant::now());
                }
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }

        info!("Simulation stopped");
    }

    /// One simulation step. The first call only starts the clock.
    fn tick(&mut self, now: Instant) {
        let Some(dt) = self.clock.sample(now) else {
            return;
        };

        self.state.step(dt);

        // No receivers just means nobody is connected
        let _ = self.snapshot_tx.send(SnapshotBuilder::server_image(&self.state));
    }

    fn handle_command(&mut self, command: GameCommand) {
        match command {
            GameCommand::Join {
                conn_id,
                username,
                reply,
            } => self.handle_join(conn_id, username, reply),
            GameCommand::KeyPressed { conn_id, dir } => {
                if !self.state.key_pressed(conn_id, dir) {
                    debug!(conn_id = %conn_id, ?dir, "Key press from connection without player");
                }
            }
            GameCommand::KeyReleased { conn_id, dir } => {
                if !self.state.key_released(conn_id, dir) {
                    debug!(conn_id = %conn_id, ?dir, "Key release from connection without player");
                }
            }
            GameCommand::ThrowHook { conn_id, direction } => {
                if let Some(hook_id) = self.state.throw_hook(conn_id, direction) {
                    debug!(conn_id = %conn_id, hook_id = %hook_id, "Hook thrown");
                }
            }
            GameCommand::Disconnect { conn_id, reason } => self.handle_disconnect(conn_id, reason),
        }
    }

    fn handle_join(
        &mut self,
        conn_id: ConnectionId,
        username: String,
        reply: oneshot::Sender<ServerMsg>,
    ) {
        if self.state.join(conn_id, username) {
            self.sync_player_count();
            if let Some(player) = self.state.player(&conn_id) {
                info!(
                    conn_id = %conn_id,
                    username = %player.username,
                    color = %player.color,
                    player_count = self.state.player_count(),
                    "Player joined"
                );
            }
        } else {
            warn!(conn_id = %conn_id, "Player already joined");
        }

        if reply.send(SnapshotBuilder::join_ack(&self.state)).is_err() {
            debug!(conn_id = %conn_id, "Join reply dropped, connection gone");
        }
    }

    fn handle_disconnect(&mut self, conn_id: ConnectionId, reason: String) {
        if !self.state.disconnect(conn_id) {
            // Never joined, so no client knows this id
            debug!(conn_id = %conn_id, reason = %reason, "Connection closed before joining");
            return;
        }
        self.sync_player_count();

        let _ = self.snapshot_tx.send(ServerMsg::PlayerDisconnect { id: conn_id });

        info!(
            conn_id = %conn_id,
            reason = %reason,
            player_count = self.state.player_count(),
            "Player disconnected"
        );
    }

    fn sync_player_count(&self) {
        self.player_count
            .store(self.state.player_count(), Ordering::Relaxed);
    }
}
