//! Display utilities and output formatting for the tickwire CLI.

use clap::ValueEnum;
use std::fmt::Write as _;
use std::io::{self, Write};
use tickwire_lib::prelude::*;

/// Output format for streamed resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum Format {
    /// One JSON object per line, in wire shape. Legacy `tick` events are
    /// written under `price`.
    #[default]
    Ndjson,
    /// One human-readable summary per line.
    Text,
}

impl Format {
    /// Returns the format name as accepted on the command line.
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Ndjson => "ndjson",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Writes one resource as a single line.
pub(crate) fn write_resource<W: Write>(
    out: &mut W,
    resource: &Resource,
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Ndjson => {
            serde_json::to_writer(&mut *out, resource)?;
            writeln!(out)
        }
        Format::Text => writeln!(out, "{}", summarize(resource)),
    }
}

/// Builds a one-line summary of a resource.
pub(crate) fn summarize(resource: &Resource) -> String {
    let mut line = String::from(resource.key());
    match resource {
        Resource::Heartbeat(heartbeat) => {
            push_field(&mut line, "time", heartbeat.time.as_deref());
        }
        Resource::Price(price) => {
            push_field(&mut line, "instrument", price.instrument.as_deref());
            push_field(&mut line, "time", price.time.as_deref());
            push_field(&mut line, "bid", price.bid);
            push_field(&mut line, "ask", price.ask);
            push_field(&mut line, "mid", price.mid());
            push_field(&mut line, "status", price.status.as_deref());
        }
        Resource::Transaction(tx) => {
            push_field(&mut line, "id", tx.id.as_ref());
            push_field(&mut line, "account", tx.account_id.as_ref());
            push_field(&mut line, "type", tx.kind.as_deref());
            push_field(&mut line, "instrument", tx.instrument.as_deref());
            push_field(&mut line, "units", tx.units);
            push_field(&mut line, "side", tx.side.as_deref());
            push_field(&mut line, "price", tx.price);
            push_field(&mut line, "pl", tx.pl);
        }
        Resource::Order(order) => {
            push_field(&mut line, "id", order.id.as_ref());
            push_field(&mut line, "type", order.kind.as_deref());
            push_field(&mut line, "instrument", order.instrument.as_deref());
            push_field(&mut line, "units", order.units);
            push_field(&mut line, "side", order.side.as_deref());
            push_field(&mut line, "price", order.price);
        }
        Resource::Trade(trade) => {
            push_field(&mut line, "id", trade.id.as_ref());
            push_field(&mut line, "instrument", trade.instrument.as_deref());
            push_field(&mut line, "units", trade.units);
            push_field(&mut line, "side", trade.side.as_deref());
            push_field(&mut line, "price", trade.price);
        }
        Resource::Position(position) => {
            push_field(&mut line, "instrument", position.instrument.as_deref());
            push_field(&mut line, "units", position.units);
            push_field(&mut line, "side", position.side.as_deref());
            push_field(&mut line, "avg_price", position.avg_price);
        }
    }
    line
}

fn push_field<T: std::fmt::Display>(line: &mut String, name: &str, value: Option<T>) {
    if let Some(value) = value {
        let _ = write!(line, " {name}={value}");
    }
}
