//! Core types for the tickwire streaming market data client.
//!
//! This crate provides the fundamental data structures shared by the
//! streaming pipeline:
//!
//! - [`Resource`] - A typed value carried by a stream event (price, transaction, ...)
//! - [`ResourceKind`] - The classification of a decoded stream event
//! - [`Client`] - The authenticated identity a stream connects as
//! - [`StreamError`] - The error taxonomy of a stream run

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tickwire/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod resource;

pub use client::{Client, Domain, DomainParseError};
pub use error::{Result, StreamError, TransportError};
pub use resource::{
    Disconnect, Heartbeat, Order, Position, Price, Resource, ResourceId, ResourceKind,
    StreamEvent, Trade, Transaction,
};
