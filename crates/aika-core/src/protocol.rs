//! Typed view of the packets the companion reads and writes.
//!
//! The transport moves `Packet { kind, payload }` pairs; this module decodes the handful of
//! inbound kinds the core reacts to and encodes the outbound commands it issues. Everything
//! else passes through as `None` on decode.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolEventError;

pub const TEXT: &str = "text";
pub const MOVE_ENTITY: &str = "move_entity";
pub const MOVE_PLAYER: &str = "move_player";
pub const PLAYER_LIST: &str = "player_list";
pub const UPDATE_ATTRIBUTES: &str = "update_attributes";
pub const RESPAWN: &str = "respawn";
pub const PLAYER_ACTION: &str = "player_action";
pub const INVENTORY_TRANSACTION: &str = "inventory_transaction";
pub const CONTAINER_OPEN: &str = "container_open";

pub const HEALTH_ATTRIBUTE: &str = "minecraft:health";

/// Roster flag set on a record when the player left the session.
pub const ROSTER_FLAG_LEFT: u32 = 0x01;

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Point `step` units from `self` toward `target`. Returns `target` when closer than `step`.
    pub fn step_toward(&self, target: &Vec3, step: f32) -> Vec3 {
        let dist = self.distance(target);
        if dist <= step {
            return *target;
        }
        Vec3 {
            x: self.x + (target.x - self.x) / dist * step,
            y: self.y + (target.y - self.y) / dist * step,
            z: self.z + (target.z - self.z) / dist * step,
        }
    }

    pub fn block(&self) -> BlockPos {
        BlockPos {
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
            z: self.z.floor() as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// One message on the transport: a packet name plus its structured payload.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Packet {
    pub kind: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TextPayload {
    #[serde(default)]
    pub source_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MoveEntityPayload {
    pub runtime_id: u64,
    pub position: Vec3,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RosterRecord {
    pub runtime_id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub flags: u32,
}

impl RosterRecord {
    pub fn has_left(&self) -> bool {
        self.flags & ROSTER_FLAG_LEFT != 0
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PlayerListPayload {
    #[serde(default)]
    pub records: Vec<RosterRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UpdateAttributesPayload {
    pub runtime_id: u64,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl UpdateAttributesPayload {
    pub fn health(&self) -> Option<f32> {
        self.attributes
            .iter()
            .find(|a| a.name == HEALTH_ATTRIBUTE)
            .map(|a| a.value)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RespawnPayload {
    pub position: Vec3,
}

/// Inbound packets the core reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Chat(TextPayload),
    EntityMoved(MoveEntityPayload),
    Roster(PlayerListPayload),
    Attributes(UpdateAttributesPayload),
    Respawn(RespawnPayload),
}

fn decode_payload<T: for<'de> Deserialize<'de>>(
    kind: &str,
    payload: &serde_json::Value,
) -> Result<T, ProtocolEventError> {
    serde_json::from_value::<T>(payload.clone()).map_err(|source| ProtocolEventError {
        kind: kind.to_string(),
        source,
    })
}

impl InboundMessage {
    /// Decodes a transport packet. Kinds the core does not track yield `Ok(None)`.
    pub fn decode(packet: &Packet) -> Result<Option<Self>, ProtocolEventError> {
        let kind = packet.kind.as_str();
        let msg = match kind {
            TEXT => InboundMessage::Chat(decode_payload(kind, &packet.payload)?),
            // Both the generic entity update and the player movement packet carry positions.
            MOVE_ENTITY | MOVE_PLAYER => {
                InboundMessage::EntityMoved(decode_payload(kind, &packet.payload)?)
            }
            PLAYER_LIST => InboundMessage::Roster(decode_payload(kind, &packet.payload)?),
            UPDATE_ATTRIBUTES => {
                InboundMessage::Attributes(decode_payload(kind, &packet.payload)?)
            }
            RESPAWN => InboundMessage::Respawn(decode_payload(kind, &packet.payload)?),
            _ => return Ok(None),
        };
        Ok(Some(msg))
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoveMode {
    Normal,
    Teleport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAction {
    StartBreak,
    StopBreak,
}

impl BlockAction {
    pub fn code(self) -> u32 {
        match self {
            BlockAction::StartBreak => 26,
            BlockAction::StopBreak => 27,
        }
    }
}

/// Commands the companion sends to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Chat {
        source_name: String,
        message: String,
    },
    Move {
        runtime_id: u64,
        position: Vec3,
        mode: MoveMode,
    },
    BlockAction {
        runtime_id: u64,
        action: BlockAction,
        position: BlockPos,
    },
    PlaceBlock {
        block: BlockPos,
        player_pos: Vec3,
    },
    Attack {
        target_runtime_id: u64,
        player_pos: Vec3,
    },
    OpenCrafting {
        position: BlockPos,
    },
}

/// Block face used for break/place interactions (top face).
const FACE_TOP: u8 = 1;
const DIRT_NETWORK_ID: u32 = 1;
const DIRT_BLOCK_RUNTIME_ID: u32 = 1;
const CRAFTING_WINDOW_ID: u8 = 1;
const CRAFTING_WINDOW_TYPE: u8 = 11;

fn empty_hand() -> serde_json::Value {
    serde_json::json!({
        "network_id": 0,
        "count": 0,
        "metadata": 0,
        "has_stack_id": false,
        "stack_id": 0,
        "can_be_placed_on": [],
        "can_break": [],
        "has_network_id": false,
    })
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Chat { .. } => TEXT,
            OutboundMessage::Move { .. } => MOVE_PLAYER,
            OutboundMessage::BlockAction { .. } => PLAYER_ACTION,
            OutboundMessage::PlaceBlock { .. } | OutboundMessage::Attack { .. } => {
                INVENTORY_TRANSACTION
            }
            OutboundMessage::OpenCrafting { .. } => CONTAINER_OPEN,
        }
    }

    pub fn to_packet(&self) -> Packet {
        let payload = match self {
            OutboundMessage::Chat {
                source_name,
                message,
            } => serde_json::json!({
                "type": "chat",
                "needs_translation": false,
                "message": message,
                "source_name": source_name,
                "xuid": "",
                "platform_chat_id": "",
            }),
            OutboundMessage::Move {
                runtime_id,
                position,
                mode,
            } => serde_json::json!({
                "runtime_id": runtime_id,
                "position": position,
                "mode": 0,
                "on_ground": true,
                "teleport": *mode == MoveMode::Teleport,
            }),
            OutboundMessage::BlockAction {
                runtime_id,
                action,
                position,
            } => serde_json::json!({
                "runtime_id": runtime_id,
                "action": action.code(),
                "position": position,
                "face": FACE_TOP,
            }),
            OutboundMessage::PlaceBlock { block, player_pos } => serde_json::json!({
                "transaction": {
                    "type": 0,
                    "actions": [],
                    "transaction_data": {
                        "type": 0,
                        "action_type": 0,
                        "block_position": block,
                        "face": FACE_TOP,
                        "hotbar_slot": 0,
                        "item_in_hand": {
                            "network_id": DIRT_NETWORK_ID,
                            "count": 1,
                            "metadata": 0,
                            "has_stack_id": false,
                            "stack_id": 0,
                            "can_be_placed_on": [],
                            "can_break": [],
                            "has_network_id": true,
                        },
                        "player_pos": player_pos,
                        "click_pos": { "x": 0.5, "y": 1.0, "z": 0.5 },
                        "block_runtime_id": DIRT_BLOCK_RUNTIME_ID,
                    }
                }
            }),
            OutboundMessage::Attack {
                target_runtime_id,
                player_pos,
            } => serde_json::json!({
                "transaction": {
                    "type": 4,
                    "actions": [],
                    "transaction_data": {
                        "type": 2,
                        "runtime_entity_id": target_runtime_id,
                        "hotbar_slot": 0,
                        "item_in_hand": empty_hand(),
                        "player_pos": player_pos,
                        "click_pos": { "x": 0.0, "y": 0.0, "z": 0.0 },
                    }
                }
            }),
            OutboundMessage::OpenCrafting { position } => serde_json::json!({
                "window_id": CRAFTING_WINDOW_ID,
                "window_type": CRAFTING_WINDOW_TYPE,
                "position": position,
                "runtime_entity_id": -1,
            }),
        };

        Packet {
            kind: self.kind().to_string(),
            payload,
        }
    }
}
