//! Wire protocol: binary frames for the hot path, one JSON CONFIG envelope
//! at session open.
//!
//! Every frame starts with a one-byte type tag. Multi-byte integers and
//! floats are little-endian; entity ids are u32, coordinates f32. The
//! layout is shared byte-for-byte with the client; sizes and offsets here
//! are load-bearing.

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::math::Vec3;
use crate::tuning::{TERRAIN_SIZE, VIEW_DISTANCE};
use crate::world::{Obstacle, ObstacleKind};

pub const MSG_CONFIG: u8 = 0x01;
pub const MSG_UPDATE: u8 = 0x02;
pub const MSG_INPUT: u8 = 0x03;
pub const MSG_SHOOT: u8 = 0x04;
pub const MSG_TOGGLE_MODE: u8 = 0x05;

const INPUT_FRAME_LEN: usize = 17;
const SHOOT_FRAME_LEN: usize = 2;
const TOGGLE_FRAME_LEN: usize = 2;

const ENTITY_RECORD_LEN: usize = 29;
const BULLET_RECORD_LEN: usize = 12;
const HIT_RECORD_LEN: usize = 13;
const STATS_BLOCK_LEN: usize = 28;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,
    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),
    #[error("truncated frame: wanted {wanted} more bytes, {remaining} left")]
    Truncated { wanted: usize, remaining: usize },
    #[error("frame length {got} does not match type {msg_type:#04x} (expected {expected})")]
    BadLength {
        msg_type: u8,
        expected: usize,
        got: usize,
    },
}

/// Messages a client sends after the session is open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientMessage {
    Input {
        move_x: f32,
        move_z: f32,
        yaw: f32,
        pitch: f32,
    },
    Shoot {
        shooting: bool,
    },
    ToggleMode {
        los_mode: bool,
    },
}

fn take<const N: usize>(input: &mut &[u8]) -> Result<[u8; N], DecodeError> {
    if input.len() < N {
        return Err(DecodeError::Truncated {
            wanted: N,
            remaining: input.len(),
        });
    }
    let (head, rest) = input.split_at(N);
    *input = rest;
    let mut buf = [0u8; N];
    buf.copy_from_slice(head);
    Ok(buf)
}

fn take_u8(input: &mut &[u8]) -> Result<u8, DecodeError> {
    Ok(take::<1>(input)?[0])
}

fn take_u16(input: &mut &[u8]) -> Result<u16, DecodeError> {
    Ok(u16::from_le_bytes(take::<2>(input)?))
}

fn take_u32(input: &mut &[u8]) -> Result<u32, DecodeError> {
    Ok(u32::from_le_bytes(take::<4>(input)?))
}

fn take_f32(input: &mut &[u8]) -> Result<f32, DecodeError> {
    Ok(f32::from_le_bytes(take::<4>(input)?))
}

fn take_vec3(input: &mut &[u8]) -> Result<Vec3, DecodeError> {
    Ok(Vec3::new(take_f32(input)?, take_f32(input)?, take_f32(input)?))
}

fn put_vec3(out: &mut Vec<u8>, v: Vec3) {
    out.extend_from_slice(&v.x.to_le_bytes());
    out.extend_from_slice(&v.y.to_le_bytes());
    out.extend_from_slice(&v.z.to_le_bytes());
}

pub fn decode_client_message(frame: &[u8]) -> Result<ClientMessage, DecodeError> {
    let mut input = frame;
    let msg_type = take_u8(&mut input).map_err(|_| DecodeError::Empty)?;
    match msg_type {
        MSG_INPUT => {
            if frame.len() != INPUT_FRAME_LEN {
                return Err(DecodeError::BadLength {
                    msg_type,
                    expected: INPUT_FRAME_LEN,
                    got: frame.len(),
                });
            }
            Ok(ClientMessage::Input {
                move_x: take_f32(&mut input)?,
                move_z: take_f32(&mut input)?,
                yaw: take_f32(&mut input)?,
                pitch: take_f32(&mut input)?,
            })
        }
        MSG_SHOOT => {
            if frame.len() != SHOOT_FRAME_LEN {
                return Err(DecodeError::BadLength {
                    msg_type,
                    expected: SHOOT_FRAME_LEN,
                    got: frame.len(),
                });
            }
            Ok(ClientMessage::Shoot {
                shooting: take_u8(&mut input)? != 0,
            })
        }
        MSG_TOGGLE_MODE => {
            if frame.len() != TOGGLE_FRAME_LEN {
                return Err(DecodeError::BadLength {
                    msg_type,
                    expected: TOGGLE_FRAME_LEN,
                    got: frame.len(),
                });
            }
            Ok(ClientMessage::ToggleMode {
                los_mode: take_u8(&mut input)? != 0,
            })
        }
        other => Err(DecodeError::UnknownType(other)),
    }
}

pub fn encode_input(move_x: f32, move_z: f32, yaw: f32, pitch: f32) -> Vec<u8> {
    let mut out = Vec::with_capacity(INPUT_FRAME_LEN);
    out.push(MSG_INPUT);
    out.extend_from_slice(&move_x.to_le_bytes());
    out.extend_from_slice(&move_z.to_le_bytes());
    out.extend_from_slice(&yaw.to_le_bytes());
    out.extend_from_slice(&pitch.to_le_bytes());
    out
}

pub fn encode_shoot(shooting: bool) -> Vec<u8> {
    vec![MSG_SHOOT, shooting as u8]
}

pub fn encode_toggle_mode(los_mode: bool) -> Vec<u8> {
    vec![MSG_TOGGLE_MODE, los_mode as u8]
}

/// Per-entity record inside an UPDATE frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityRecord {
    pub id: u32,
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub hp: u16,
    pub max_hp: u16,
    pub is_player: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    pub position: Vec3,
    pub hit_entity: bool,
}

/// Operator-facing stats tail of every UPDATE frame. Informational only;
/// nothing feeds back into control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateStats {
    pub total_entities: u32,
    pub total_obstacles: u32,
    pub connected_players: u16,
    pub tick_time_ms_per_sec: f32,
    pub los_time_ms_per_sec: f32,
    pub tick_time_ms_avg: f32,
    pub visible_entities: u16,
    pub server_mode: u8,
    pub tick_rate: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateFrame {
    pub my_pos: Vec3,
    pub entities: Vec<EntityRecord>,
    pub bullets: Vec<Vec3>,
    pub hits: Vec<HitRecord>,
    pub stats: UpdateStats,
}

pub fn encode_update(frame: &UpdateFrame) -> Vec<u8> {
    let capacity = 1
        + 12
        + 2
        + frame.entities.len() * ENTITY_RECORD_LEN
        + 2
        + frame.bullets.len() * BULLET_RECORD_LEN
        + 2
        + frame.hits.len() * HIT_RECORD_LEN
        + STATS_BLOCK_LEN;
    let mut out = Vec::with_capacity(capacity);

    out.push(MSG_UPDATE);
    put_vec3(&mut out, frame.my_pos);

    out.extend_from_slice(&(frame.entities.len() as u16).to_le_bytes());
    for entity in &frame.entities {
        out.extend_from_slice(&entity.id.to_le_bytes());
        put_vec3(&mut out, entity.position);
        out.extend_from_slice(&entity.yaw.to_le_bytes());
        out.extend_from_slice(&entity.pitch.to_le_bytes());
        out.extend_from_slice(&entity.hp.to_le_bytes());
        out.extend_from_slice(&entity.max_hp.to_le_bytes());
        out.push(entity.is_player as u8);
    }

    out.extend_from_slice(&(frame.bullets.len() as u16).to_le_bytes());
    for bullet in &frame.bullets {
        put_vec3(&mut out, *bullet);
    }

    out.extend_from_slice(&(frame.hits.len() as u16).to_le_bytes());
    for hit in &frame.hits {
        put_vec3(&mut out, hit.position);
        out.push(hit.hit_entity as u8);
    }

    let stats = &frame.stats;
    out.extend_from_slice(&stats.total_entities.to_le_bytes());
    out.extend_from_slice(&stats.total_obstacles.to_le_bytes());
    out.extend_from_slice(&stats.connected_players.to_le_bytes());
    out.extend_from_slice(&stats.tick_time_ms_per_sec.to_le_bytes());
    out.extend_from_slice(&stats.los_time_ms_per_sec.to_le_bytes());
    out.extend_from_slice(&stats.tick_time_ms_avg.to_le_bytes());
    out.extend_from_slice(&stats.visible_entities.to_le_bytes());
    out.push(stats.server_mode);
    out.push(stats.tick_rate);
    out.extend_from_slice(&[0u8; 2]);

    debug_assert_eq!(out.len(), capacity);
    out
}

/// Decode an UPDATE frame. The server never receives one; this is the
/// other half of the round-trip contract and what client tooling uses.
pub fn decode_update(frame: &[u8]) -> Result<UpdateFrame, DecodeError> {
    let mut input = frame;
    let msg_type = take_u8(&mut input).map_err(|_| DecodeError::Empty)?;
    if msg_type != MSG_UPDATE {
        return Err(DecodeError::UnknownType(msg_type));
    }

    let my_pos = take_vec3(&mut input)?;

    let entity_count = take_u16(&mut input)? as usize;
    let mut entities = Vec::with_capacity(entity_count);
    for _ in 0..entity_count {
        let id = take_u32(&mut input)?;
        let position = take_vec3(&mut input)?;
        let yaw = take_f32(&mut input)?;
        let pitch = take_f32(&mut input)?;
        let hp = take_u16(&mut input)?;
        let max_hp = take_u16(&mut input)?;
        let flags = take_u8(&mut input)?;
        entities.push(EntityRecord {
            id,
            position,
            yaw,
            pitch,
            hp,
            max_hp,
            is_player: flags & 0x01 != 0,
        });
    }

    let bullet_count = take_u16(&mut input)? as usize;
    let mut bullets = Vec::with_capacity(bullet_count);
    for _ in 0..bullet_count {
        bullets.push(take_vec3(&mut input)?);
    }

    let hit_count = take_u16(&mut input)? as usize;
    let mut hits = Vec::with_capacity(hit_count);
    for _ in 0..hit_count {
        hits.push(HitRecord {
            position: take_vec3(&mut input)?,
            hit_entity: take_u8(&mut input)? != 0,
        });
    }

    let stats = UpdateStats {
        total_entities: take_u32(&mut input)?,
        total_obstacles: take_u32(&mut input)?,
        connected_players: take_u16(&mut input)?,
        tick_time_ms_per_sec: take_f32(&mut input)?,
        los_time_ms_per_sec: take_f32(&mut input)?,
        tick_time_ms_avg: take_f32(&mut input)?,
        visible_entities: take_u16(&mut input)?,
        server_mode: take_u8(&mut input)?,
        tick_rate: take_u8(&mut input)?,
    };
    take::<2>(&mut input)?;

    Ok(UpdateFrame {
        my_pos,
        entities,
        bullets,
        hits,
        stats,
    })
}

// CONFIG is JSON: obstacles are numerous but static, so readability wins
// over bytes for this one message.

#[derive(Serialize)]
struct XyzDto {
    x: f32,
    y: f32,
    z: f32,
}

impl From<Vec3> for XyzDto {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ObstacleDto {
    position: XyzDto,
    size: XyzDto,
    #[serde(rename = "type")]
    kind: ObstacleKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    trunk_radius: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    foliage_radius: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    foliage_color: Option<u32>,
}

impl From<&Obstacle> for ObstacleDto {
    fn from(obstacle: &Obstacle) -> Self {
        Self {
            position: obstacle.aabb.center().into(),
            size: obstacle.aabb.size().into(),
            kind: obstacle.kind,
            trunk_radius: obstacle.trunk_radius,
            foliage_radius: obstacle.foliage_radius,
            foliage_color: obstacle.foliage_color,
        }
    }
}

#[derive(Serialize)]
struct TerrainDto {
    size: f32,
    obstacles: Vec<ObstacleDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigDto {
    #[serde(rename = "type")]
    kind: &'static str,
    terrain: TerrainDto,
    view_distance: f32,
}

/// Build the one-shot CONFIG frame: type byte followed by the JSON
/// envelope. Built once at startup and shared by every session.
pub fn encode_config(obstacles: &[Obstacle]) -> Bytes {
    let config = ConfigDto {
        kind: "config",
        terrain: TerrainDto {
            size: TERRAIN_SIZE,
            obstacles: obstacles.iter().map(ObstacleDto::from).collect(),
        },
        view_distance: VIEW_DISTANCE,
    };
    let mut frame = vec![MSG_CONFIG];
    // The codec's error plumbing exists for untrusted inbound bytes. This
    // path serializes a fixed struct of plain fields, which serde_json
    // cannot fail on, so no Result is threaded through.
    let json = serde_json::to_vec(&config).expect("config serialization");
    frame.extend_from_slice(&json);
    Bytes::from(frame)
}
