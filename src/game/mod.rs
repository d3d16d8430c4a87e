//! Game simulation modules

pub mod decay;
pub mod hook;
pub mod input;
pub mod simulation;
pub mod snapshot;
pub mod vector;
pub mod world;

pub use simulation::{GameCommand, GameHandle, Simulation};
pub use world::{ConnectionId, WorldState};
