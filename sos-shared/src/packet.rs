//! The JSON envelope carried over the wire. Mirrors the original Python
//! `Packet(dict)`: a `command` string, a `data` object, and whatever other
//! top-level keys a particular response wants to carry (`winner`, `draw`,
//! `result`, `finished`, ...).

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A request or response envelope.
///
/// `command` and `data` are always present on the wire; anything else set
/// via [`Packet::set`] rides alongside them as an additional top-level key.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub command: String,
    pub data: Map<String, Value>,
    extra: Map<String, Value>,
}

impl Packet {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            data: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn with_data(command: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            command: command.into(),
            data,
            extra: Map::new(),
        }
    }

    /// Sets an additional top-level field (e.g. `winner`, `draw`, `error`).
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn set_error(&mut self, message: impl Into<String>) -> &mut Self {
        self.data.insert("error".to_string(), Value::String(message.into()));
        self
    }

    pub fn error(&self) -> Option<&str> {
        self.data.get("error").and_then(Value::as_str)
    }

    /// Deserializes `data` into a typed request payload.
    pub fn parse_data<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.data.clone()))
    }

    /// Serializes a typed response payload into `data`, merging its fields in.
    pub fn set_data<T: Serialize>(&mut self, payload: &T) -> Result<&mut Self, serde_json::Error> {
        match serde_json::to_value(payload)? {
            Value::Object(object) => self.data = object,
            other => {
                return Err(de::Error::custom(format!(
                    "response payload must serialize to an object, got {other}"
                )))
            }
        }
        Ok(self)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Replaces the trailing `request` substring in the command name with
    /// `response`, matching `command.replace("request", "response")` from the
    /// original dispatcher.
    pub fn response_command_for(command: &str) -> String {
        command.replacen("request", "response", 1)
    }
}

impl Serialize for Packet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.extra.len()))?;
        map.serialize_entry("command", &self.command)?;
        map.serialize_entry("data", &self.data)?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Packet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut object = Map::deserialize(deserializer)?;

        let command = match object.remove("command") {
            Some(Value::String(command)) => command,
            Some(_) => return Err(de::Error::custom("`command` must be a string")),
            None => return Err(de::Error::missing_field("command")),
        };

        let data = match object.remove("data") {
            Some(Value::Object(data)) => data,
            Some(_) => return Err(de::Error::custom("`data` must be an object")),
            None => Map::new(),
        };

        Ok(Packet {
            command,
            data,
            extra: object,
        })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet({})", self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_through_json() {
        let mut packet = Packet::new("game_runner_winner_announced");
        packet.set("winner", "alice");
        packet.data.insert("ok".into(), json!("done"));

        let encoded = packet.to_json_string().unwrap();
        let decoded = Packet::from_json_str(&encoded).unwrap();

        assert_eq!(packet, decoded);
    }

    #[test]
    fn missing_data_defaults_to_empty_object() {
        let decoded = Packet::from_json_str(r#"{"command":"login_request"}"#).unwrap();
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn rejects_missing_command() {
        let result = Packet::from_json_str(r#"{"data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn replaces_only_the_request_suffix() {
        assert_eq!(
            Packet::response_command_for("new_game_request"),
            "new_game_response"
        );
        assert_eq!(
            Packet::response_command_for("login_request"),
            "login_response"
        );
    }
}
