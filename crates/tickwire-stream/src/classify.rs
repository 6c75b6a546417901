//! Classification of decoded stream events.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Deserialize;
use serde_json::Value;
use tickwire_types::{
    Disconnect, Heartbeat, Order, Position, Price, Resource, ResourceKind, StreamError,
    StreamEvent, Trade, Transaction,
};

use crate::decode::malformed;

/// Key of the keep-alive event.
pub(crate) const HEARTBEAT_KEY: &str = "heartbeat";

/// Key of the server disconnect event.
pub(crate) const DISCONNECT_KEY: &str = "disconnect";

/// Builds a typed resource from an event payload.
type Constructor = fn(&Value) -> Result<Resource, serde_json::Error>;

/// Global resource registry instance.
static REGISTRY: OnceLock<ResourceRegistry> = OnceLock::new();

/// Registry of resource keys the stream may carry, each bound to the
/// constructor of its typed representation.
#[derive(Debug)]
pub struct ResourceRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl ResourceRegistry {
    /// Returns the global resource registry.
    ///
    /// The registry is initialized lazily on first access.
    #[must_use]
    pub fn global() -> &'static Self {
        REGISTRY.get_or_init(Self::load)
    }

    fn load() -> Self {
        let entries = [
            ("transaction", transaction as Constructor),
            ("price", price as Constructor),
            // Legacy key used by the rates stream, normalized to `price`.
            ("tick", price as Constructor),
            ("order", order as Constructor),
            ("trade", trade as Constructor),
            ("position", position as Constructor),
        ];
        Self {
            constructors: entries.into_iter().collect(),
        }
    }

    /// Returns true if `key` names a registered resource.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.constructors.contains_key(key)
    }

    /// Returns all registered keys.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    /// Returns the number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Classifies a decoded event by its top-level key.
    ///
    /// Unknown keys are a normal outcome ([`ResourceKind::Unknown`]); an
    /// object with zero or several top-level keys is unknown too, named by
    /// its keys joined with `,`. The `heartbeat` and `disconnect` control
    /// events always classify, whatever the shape of their payload.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::MalformedStreamData`] if the payload of a
    /// registered resource key cannot be mapped to its typed representation.
    pub fn classify(&self, event: StreamEvent) -> Result<ResourceKind, StreamError> {
        if event.len() != 1 {
            let keys: Vec<&str> = event.keys().map(String::as_str).collect();
            return Ok(ResourceKind::Unknown(keys.join(",")));
        }
        let Some((key, payload)) = event.into_iter().next() else {
            return Ok(ResourceKind::Unknown(String::new()));
        };

        let kind = match key.as_str() {
            HEARTBEAT_KEY => ResourceKind::Heartbeat(heartbeat(payload)),
            DISCONNECT_KEY => ResourceKind::Disconnect(disconnect(&payload)),
            _ => match self.constructors.get(key.as_str()) {
                Some(construct) => ResourceKind::Recognized(construct(&payload).map_err(|e| {
                    malformed(format!("invalid {key} payload: {e}"), &payload.to_string())
                })?),
                None => ResourceKind::Unknown(key),
            },
        };
        Ok(kind)
    }
}

fn transaction(payload: &Value) -> Result<Resource, serde_json::Error> {
    Transaction::deserialize(payload).map(Resource::Transaction)
}

fn price(payload: &Value) -> Result<Resource, serde_json::Error> {
    Price::deserialize(payload).map(Resource::Price)
}

fn order(payload: &Value) -> Result<Resource, serde_json::Error> {
    Order::deserialize(payload).map(Resource::Order)
}

fn trade(payload: &Value) -> Result<Resource, serde_json::Error> {
    Trade::deserialize(payload).map(Resource::Trade)
}

fn position(payload: &Value) -> Result<Resource, serde_json::Error> {
    Position::deserialize(payload).map(Resource::Position)
}

/// Maps a heartbeat payload. A `time` that is not a string stays in `extra`.
fn heartbeat(payload: Value) -> Heartbeat {
    let Value::Object(mut extra) = payload else {
        return Heartbeat::default();
    };
    let time = match extra.remove("time") {
        Some(Value::String(time)) => Some(time),
        Some(other) => {
            extra.insert("time".to_string(), other);
            None
        }
        None => None,
    };
    Heartbeat { time, extra }
}

/// Maps a disconnect payload, reading `code` from a number or a numeric
/// string (0 otherwise) and `message` from any JSON value.
fn disconnect(payload: &Value) -> Disconnect {
    let code = match payload.get("code") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    let message = match payload {
        Value::String(message) => message.clone(),
        _ => match payload.get("message") {
            Some(Value::String(message)) => message.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        },
    };
    let more_info = payload
        .get("moreInfo")
        .and_then(Value::as_str)
        .map(str::to_string);
    Disconnect {
        code,
        message,
        more_info,
    }
}
