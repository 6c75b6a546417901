//! Typed resources carried by stream events.
//!
//! Every event on the wire is a JSON object with a single top-level key
//! naming its kind and a payload object:
//!
//! ```json
//! {"tick":{"instrument":"EUR_USD","time":"2014-05-08T11:38:36.000000Z","bid":1.3925,"ask":1.39265}}
//! ```
//!
//! Payload fields are all optional. Anything not modelled here is kept in the
//! `extra` map of each type so no server data is dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A decoded stream event: a JSON object, normally with one top-level key.
pub type StreamEvent = Map<String, Value>;

/// Identifier of a transaction, order or trade.
///
/// The streaming API sends numeric ids; string ids are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    /// Numeric identifier.
    Number(u64),
    /// Textual identifier.
    Text(String),
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// Parses a wire timestamp, either RFC 3339 or UNIX microseconds.
fn parse_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_micros)
}

/// Periodic keep-alive event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Server time of the heartbeat, as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Heartbeat {
    /// Returns the parsed heartbeat time.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_time(self.time.as_deref())
    }
}

/// Server-initiated control event that ends the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disconnect {
    /// Reason code.
    #[serde(default)]
    pub code: i64,
    /// Human-readable reason.
    #[serde(default)]
    pub message: String,
    /// Link to further documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more_info: Option<String>,
}

/// Account activity: fills, order changes, funding, interest, ...
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    /// Account the transaction belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<ResourceId>,
    /// Server time, as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Transaction type (e.g. `MARKET_ORDER_CREATE`).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Instrument, when the transaction concerns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    /// Units traded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<i64>,
    /// `buy` or `sell`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    /// Execution price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Realized profit or loss.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pl: Option<f64>,
    /// Interest paid or earned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest: Option<f64>,
    /// Account balance after the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_balance: Option<f64>,
    /// Why the transaction happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    /// Returns the parsed transaction time.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_time(self.time.as_deref())
    }
}

/// A price update for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Instrument name (e.g. `EUR_USD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    /// Server time, as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Bid price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    /// Ask (offer) price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
    /// Trading status, e.g. `halted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Price {
    /// Returns the parsed price time.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_time(self.time.as_deref())
    }

    /// Returns the mid price (average of ask and bid).
    #[must_use]
    pub fn mid(&self) -> Option<f64> {
        Some((self.ask? + self.bid?) / 2.0)
    }

    /// Returns the spread (ask - bid).
    #[must_use]
    pub fn spread(&self) -> Option<f64> {
        Some(self.ask? - self.bid?)
    }
}

/// An order update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    /// Instrument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    /// Units ordered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<i64>,
    /// `buy` or `sell`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    /// Order type (`limit`, `stop`, `marketIfTouched`, ...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Server time, as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Trigger price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Expiry time, as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An open trade update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Trade id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    /// Instrument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    /// Units held.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<i64>,
    /// `buy` or `sell`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    /// Server time, as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Entry price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A net position update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Instrument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    /// Net units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<i64>,
    /// `buy` or `sell`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    /// Volume-weighted average entry price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<f64>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A typed value dispatched to a stream callback.
///
/// Serializes back to the wire shape `{"<key>": {...}}` under its canonical
/// key. Events sent under the legacy `tick` key are normalized: they become
/// [`Resource::Price`] and serialize as `{"price": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    /// Keep-alive, only dispatched when heartbeat emission is on.
    Heartbeat(Heartbeat),
    /// Account activity.
    Transaction(Transaction),
    /// Price update.
    Price(Price),
    /// Order update.
    Order(Order),
    /// Trade update.
    Trade(Trade),
    /// Position update.
    Position(Position),
}

impl Resource {
    /// Returns the canonical top-level key of this resource.
    ///
    /// This is `"price"` for events received as `tick`.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Heartbeat(_) => "heartbeat",
            Self::Transaction(_) => "transaction",
            Self::Price(_) => "price",
            Self::Order(_) => "order",
            Self::Trade(_) => "trade",
            Self::Position(_) => "position",
        }
    }

    /// Returns true if this is a heartbeat.
    #[must_use]
    pub const fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Heartbeat(_))
    }
}

/// The classification of a decoded stream event.
///
/// Exactly one kind is assigned per event.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceKind {
    /// Keep-alive event.
    Heartbeat(Heartbeat),
    /// A resource with a registered constructor.
    Recognized(Resource),
    /// Server-initiated end of stream.
    Disconnect(Disconnect),
    /// Any other top-level key.
    Unknown(String),
}
