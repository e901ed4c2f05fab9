//! Wire format between the engine and the real-time channel.
//!
//! Every message is a JSON envelope `{ "type": ..., "data": ... }`. The host adapts its
//! socket events to envelopes before handing them over.
//!
//! Inbound payloads are decoded leniently: a field that is missing or has the wrong type
//! is treated as absent, and a pixel that cannot be decoded is skipped on its own
//! instead of failing the whole batch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::error::ProtocolError;
use crate::api::types::{Color, CommittedPixel, GridPos, Millis, StagedPixel};
use crate::store::energy::EnergyCorrection;

/// Messages from the engine to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// All staged pixels as one unit of work. The ack echoes `request_id`.
    #[serde(rename_all = "camelCase")]
    SubmitBatch { request_id: u64, pixels: Vec<WirePixel> },
    /// Ask for `{ energy, capacity, regenSeconds, updatedAt }`.
    RequestEnergy,
    /// Ask for a full `canvasState` snapshot.
    RequestCanvas,
}

/// Outbound pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePixel {
    pub x: u32,
    pub y: u32,
    pub color: Color,
}

impl From<&StagedPixel> for WirePixel {
    fn from(p: &StagedPixel) -> Self {
        Self {
            x: p.pos.x,
            y: p.pos.y,
            color: p.color,
        }
    }
}

/// Acknowledgement of a `submitBatch`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchAck {
    /// Echoed request id. Absent on servers that do not echo it.
    pub request_id: Option<u64>,
    pub error: Option<String>,
    pub energy_left: Option<f64>,
    pub capacity: Option<u32>,
}

/// Messages from the channel to the engine, including connection lifecycle events.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Connect,
    Disconnect { reason: Option<String> },
    ConnectError { message: Option<String> },
    TokenExpired,
    /// Full snapshot; replaces all committed pixels.
    CanvasState(Vec<CommittedPixel>),
    /// Incremental, ordered batch.
    UpdatePixels(Vec<CommittedPixel>),
    /// Pushed energy correction.
    EnergyUpdate(EnergyCorrection),
    /// Response to `requestEnergy`.
    Energy(EnergyCorrection),
    BatchAck(BatchAck),
}

impl ServerMessage {
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let envelope: Value = serde_json::from_str(json)?;
        Self::from_value(&envelope)
    }

    pub fn from_value(envelope: &Value) -> Result<Self, ProtocolError> {
        let kind = envelope
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        let data = envelope.get("data").unwrap_or(&Value::Null);

        let message = match kind {
            "connect" => ServerMessage::Connect,
            "disconnect" => ServerMessage::Disconnect { reason: text(data, &["reason"]) },
            "connectError" | "connect_error" => ServerMessage::ConnectError {
                message: text(data, &["message"]),
            },
            "tokenExpired" | "token_expired" => ServerMessage::TokenExpired,
            "canvasState" => ServerMessage::CanvasState(decode_pixels(data)),
            "updatePixels" => ServerMessage::UpdatePixels(decode_pixels(data)),
            "energyUpdate" => ServerMessage::EnergyUpdate(decode_energy(data)),
            "energy" => ServerMessage::Energy(decode_energy(data)),
            "batchAck" => ServerMessage::BatchAck(decode_ack(data)),
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        };
        Ok(message)
    }
}

/// A number, or a string holding one. Anything else is absent.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    field(obj, keys).and_then(number)
}

/// A bare string, or a string field of an object.
fn text(data: &Value, keys: &[&str]) -> Option<String> {
    match data {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(obj) => field(obj, keys).and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn coordinate(value: Option<f64>) -> Option<u32> {
    let v = value?;
    (v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64).then_some(v as u32)
}

fn count(value: Option<f64>) -> Option<u32> {
    value.filter(|v| *v >= 0.0).map(|v| v.min(u32::MAX as f64) as u32)
}

fn decode_pixel(value: &Value, key_pos: Option<GridPos>) -> Option<CommittedPixel> {
    let (pos, color, obj) = match value {
        // legacy map form: "x:y" -> "#rrggbb"
        Value::String(color) => (key_pos?, Color::parse_hex(color)?, None),
        Value::Object(obj) => {
            let pos = match (
                coordinate(number_field(obj, &["x"])),
                coordinate(number_field(obj, &["y"])),
            ) {
                (Some(x), Some(y)) => GridPos::new(x, y),
                _ => key_pos?,
            };
            let color = field(obj, &["color"]).and_then(Value::as_str).and_then(Color::parse_hex)?;
            (pos, color, Some(obj))
        }
        _ => return None,
    };
    let owner_id = obj
        .and_then(|o| field(o, &["userId", "ownerId", "owner"]))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    let placed_at: Option<Millis> =
        obj.and_then(|o| number_field(o, &["placedAt", "updatedAt", "createdAt"]));
    Some(CommittedPixel { pos, color, owner_id, placed_at })
}

/// Pixels as a list of objects, or a map keyed by `"x:y"`.
fn decode_pixels(data: &Value) -> Vec<CommittedPixel> {
    let mut skipped = 0usize;
    let pixels: Vec<CommittedPixel> = match data {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let pixel = decode_pixel(item, None);
                skipped += pixel.is_none() as usize;
                pixel
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, item)| {
                let pixel = decode_pixel(item, GridPos::from_key(key));
                skipped += pixel.is_none() as usize;
                pixel
            })
            .collect(),
        _ => Vec::new(),
    };
    if skipped > 0 {
        log::warn!("skipped {} undecodable pixels", skipped);
    }
    pixels
}

/// `{ energy, capacity, regenSeconds, updatedAt }`, the positional form
/// `[energy, capacity, regenSeconds, updatedAt]`, or a bare number.
fn decode_energy(data: &Value) -> EnergyCorrection {
    match data {
        Value::Object(obj) => EnergyCorrection {
            energy: number_field(obj, &["energy", "energyLeft"]),
            capacity: count(number_field(obj, &["capacity", "maxEnergy"])),
            regen_seconds: number_field(obj, &["regenSeconds", "recoverySpeed"]),
            updated_at: number_field(obj, &["updatedAt", "lastEnergyUpdate"]),
        },
        Value::Array(args) => {
            let arg = |i: usize| args.get(i).and_then(number);
            EnergyCorrection {
                energy: arg(0),
                capacity: count(arg(1)),
                regen_seconds: arg(2),
                updated_at: arg(3),
            }
        }
        other => EnergyCorrection {
            energy: number(other),
            ..Default::default()
        },
    }
}

fn decode_ack(data: &Value) -> BatchAck {
    let Value::Object(obj) = data else {
        return BatchAck::default();
    };
    let error = field(obj, &["error", "err"]).and_then(|v| match v {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(false) => None,
        Value::Object(e) => Some(
            e.get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        ),
        other => Some(other.to_string()),
    });
    BatchAck {
        request_id: number_field(obj, &["requestId"]).and_then(|v| coordinate(Some(v))).map(u64::from),
        error,
        energy_left: number_field(obj, &["energyLeft", "energy"]),
        capacity: count(number_field(obj, &["capacity", "maxEnergy"])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn submit_batch_wire_shape() {
        let msg = ClientMessage::SubmitBatch {
            request_id: 7,
            pixels: vec![WirePixel { x: 1, y: 2, color: Color::rgb(255, 0, 0) }],
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "submitBatch",
                "data": { "requestId": 7, "pixels": [{ "x": 1, "y": 2, "color": "#ff0000" }] }
            })
        );
        assert_eq!(
            serde_json::to_value(ClientMessage::RequestEnergy).unwrap(),
            json!({ "type": "requestEnergy" })
        );
    }

    #[test]
    fn update_pixels_skips_bad_entries() {
        let msg = ServerMessage::from_json(
            r##"{ "type": "updatePixels", "data": [
                { "x": 1, "y": 2, "color": "#00ff00", "userId": "u1", "placedAt": 1000 },
                { "x": -1, "y": 2, "color": "#00ff00" },
                { "x": 1.5, "y": 2, "color": "#00ff00" },
                { "x": 3, "y": 4, "color": "green" },
                { "x": "5", "y": 6, "color": "#000" }
            ] }"##,
        )
        .unwrap();
        let ServerMessage::UpdatePixels(pixels) = msg else {
            panic!("expected updatePixels");
        };
        assert_eq!(pixels.len(), 2);
        assert_eq!(pixels[0].pos, GridPos::new(1, 2));
        assert_eq!(pixels[0].owner_id, "u1");
        assert_eq!(pixels[0].placed_at, Some(1000.0));
        assert_eq!(pixels[1].pos, GridPos::new(5, 6));
        assert_eq!(pixels[1].color, Color::BLACK);
        assert_eq!(pixels[1].owner_id, "");
    }

    #[test]
    fn canvas_state_accepts_key_map() {
        let msg = ServerMessage::from_json(
            r##"{ "type": "canvasState", "data": { "3:4": "#ffffff", "bad": "#ffffff", "5:6": { "color": "#000000", "userId": 42 } } }"##,
        )
        .unwrap();
        let ServerMessage::CanvasState(mut pixels) = msg else {
            panic!("expected canvasState");
        };
        pixels.sort_by_key(|p| p.pos);
        assert_eq!(pixels.len(), 2);
        assert_eq!(pixels[0].pos, GridPos::new(3, 4));
        assert_eq!(pixels[1].owner_id, "42");
    }

    #[test]
    fn energy_forms() {
        let obj = ServerMessage::from_json(
            r#"{ "type": "energy", "data": { "energy": 3.5, "capacity": 10, "regenSeconds": 30, "updatedAt": 1700000000000 } }"#,
        )
        .unwrap();
        assert_eq!(
            obj,
            ServerMessage::Energy(EnergyCorrection {
                energy: Some(3.5),
                capacity: Some(10),
                regen_seconds: Some(30.0),
                updated_at: Some(1_700_000_000_000.0),
            })
        );
        let positional = ServerMessage::from_json(r#"{ "type": "energyUpdate", "data": [4, 12] }"#).unwrap();
        assert_eq!(
            positional,
            ServerMessage::EnergyUpdate(EnergyCorrection {
                energy: Some(4.0),
                capacity: Some(12),
                ..Default::default()
            })
        );
        let bare = ServerMessage::from_json(r#"{ "type": "energyUpdate", "data": 2 }"#).unwrap();
        assert_eq!(bare, ServerMessage::EnergyUpdate(EnergyCorrection { energy: Some(2.0), ..Default::default() }));
    }

    #[test]
    fn malformed_numbers_are_absent() {
        let msg = ServerMessage::from_json(
            r#"{ "type": "energyUpdate", "data": { "energy": "lots", "capacity": null, "regenSeconds": {} } }"#,
        )
        .unwrap();
        assert_eq!(msg, ServerMessage::EnergyUpdate(EnergyCorrection::default()));
    }

    #[test]
    fn ack_variants() {
        let ok = ServerMessage::from_json(
            r#"{ "type": "batchAck", "data": { "requestId": 3, "energyLeft": 1, "capacity": 10 } }"#,
        )
        .unwrap();
        assert_eq!(
            ok,
            ServerMessage::BatchAck(BatchAck {
                request_id: Some(3),
                error: None,
                energy_left: Some(1.0),
                capacity: Some(10),
            })
        );
        let err = ServerMessage::from_json(
            r#"{ "type": "batchAck", "data": { "requestId": 4, "error": { "message": "canvas.errors.no-energy" } } }"#,
        )
        .unwrap();
        let ServerMessage::BatchAck(ack) = err else { panic!() };
        assert_eq!(ack.error.as_deref(), Some("canvas.errors.no-energy"));
        let empty = ServerMessage::from_json(r#"{ "type": "batchAck", "data": { "error": "" } }"#).unwrap();
        assert_eq!(empty, ServerMessage::BatchAck(BatchAck::default()));
    }

    #[test]
    fn lifecycle_and_errors() {
        assert_eq!(ServerMessage::from_json(r#"{ "type": "connect" }"#).unwrap(), ServerMessage::Connect);
        assert_eq!(
            ServerMessage::from_json(r#"{ "type": "disconnect", "data": "transport close" }"#).unwrap(),
            ServerMessage::Disconnect { reason: Some("transport close".into()) }
        );
        assert_eq!(
            ServerMessage::from_json(r#"{ "type": "token_expired" }"#).unwrap(),
            ServerMessage::TokenExpired
        );
        assert!(matches!(ServerMessage::from_json("{}"), Err(ProtocolError::MissingType)));
        assert!(matches!(
            ServerMessage::from_json(r#"{ "type": "chat" }"#),
            Err(ProtocolError::UnknownType(t)) if t == "chat"
        ));
        assert!(matches!(ServerMessage::from_json("not json"), Err(ProtocolError::Json(_))));
    }
}
