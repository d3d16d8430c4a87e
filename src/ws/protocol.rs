//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::game::input::Direction;
use crate::game::vector::Vec2;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMsg {
    /// Enter the game under a display name
    Join { username: String },

    /// A directional key went down (or auto-repeated)
    KeyPressed { dir: Direction },

    /// A directional key went up
    KeyReleased { dir: Direction },

    /// Throw a hook in the given direction (any length)
    ThrowHook { direction: Vec2 },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMsg {
    /// Reply to `join`, only sent to the joining client
    Joined {
        players: HashMap<Uuid, PlayerSnapshot>,
        hooks: HashMap<Uuid, HookSnapshot>,
        world: Map<String, Value>,
        #[serde(rename = "playerRadius")]
        player_radius: f64,
        #[serde(rename = "hookRadius")]
        hook_radius: f64,
    },

    /// Full world state, broadcast every tick
    ServerImage {
        players: HashMap<Uuid, PlayerSnapshot>,
        hooks: HashMap<Uuid, HookSnapshot>,
        world: Map<String, Value>,
    },

    /// A player left
    PlayerDisconnect { id: Uuid },

    /// Error message
    Error { code: String, message: String },
}

/// Public player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Position in px
    pub loc: Vec2,
    /// Velocity in px/ms
    pub vel: Vec2,
    pub username: String,
    /// `#` + lowercase hex
    pub color: String,
}

/// Hook state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookSnapshot {
    pub loc: Vec2,
    pub vel: Vec2,
    pub from: Uuid,
    pub to: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_client_messages() {
        let join: ClientMsg =
            serde_json::from_str(r#"{"type":"join","username":"billybob"}"#).unwrap();
        assert_eq!(join, ClientMsg::Join { username: "billybob".to_string() });

        let pressed: ClientMsg =
            serde_json::from_str(r#"{"type":"keypressed","dir":"left"}"#).unwrap();
        assert_eq!(pressed, ClientMsg::KeyPressed { dir: Direction::Left });

        let released: ClientMsg =
            serde_json::from_str(r#"{"type":"keyreleased","dir":"up"}"#).unwrap();
        assert_eq!(released, ClientMsg::KeyReleased { dir: Direction::Up });

        let hook: ClientMsg =
            serde_json::from_str(r#"{"type":"throwhook","direction":{"x":1.5,"y":-2}}"#).unwrap();
        assert_eq!(hook, ClientMsg::ThrowHook { direction: Vec2::new(1.5, -2.0) });
    }

    #[test]
    fn test_reject_unknown_direction() {
        let result = serde_json::from_str::<ClientMsg>(r#"{"type":"keypressed","dir":"north"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_server_messages() {
        let joined = ServerMsg::Joined {
            players: HashMap::new(),
            hooks: HashMap::new(),
            world: Map::new(),
            player_radius: 20.0,
            hook_radius: 10.0,
        };
        let json: Value = serde_json::to_value(&joined).unwrap();
        assert_eq!(json["type"], "joined");
        assert_eq!(json["playerRadius"], 20.0);
        assert_eq!(json["hookRadius"], 10.0);
        assert!(json["world"].as_object().unwrap().is_empty());

        let id = Uuid::new_v4();
        let json = serde_json::to_value(ServerMsg::PlayerDisconnect { id }).unwrap();
        assert_eq!(json["type"], "playerdisconnect");
        assert_eq!(json["id"], id.to_string());
    }

    #[test]
    fn test_encode_server_image() {
        let id = Uuid::new_v4();
        let mut players = HashMap::new();
        players.insert(
            id,
            PlayerSnapshot {
                loc: Vec2::new(12.0, -3.0),
                vel: Vec2::ZERO,
                username: "billybob".to_string(),
                color: "#a1b2c3".to_string(),
            },
        );
        let image = ServerMsg::ServerImage {
            players,
            hooks: HashMap::new(),
            world: Map::new(),
        };

        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["type"], "serverimage");
        let player = &json["players"][id.to_string()];
        assert_eq!(player["loc"]["x"], 12.0);
        assert_eq!(player["vel"]["y"], 0.0);
        assert_eq!(player["color"], "#a1b2c3");
    }
}
