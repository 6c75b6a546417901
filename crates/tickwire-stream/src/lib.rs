//! Streaming event pipeline for the tickwire market data client.
//!
//! This crate turns a long-lived HTTP connection into typed callbacks:
//!
//! - [`request::StreamRequest`] - Builds the outbound request (URI, query, headers)
//! - [`StreamClient`] - Opens the connection with timeouts and connect throttling
//! - [`EventDecoder`] - Splits the chunked body into JSON objects
//! - [`ResourceRegistry`] - Classifies each object by its top-level key
//! - [`StreamSession`] - Drives decode, classify and dispatch until stop or end
//! - [`Signaller`] - Lets a callback request the stream to stop

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tickwire/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod classify;
mod client;
mod decode;
pub mod request;
mod session;
mod signal;
mod throttle;

pub use classify::ResourceRegistry;
pub use client::{BodyStream, ClientConfig, StreamClient};
pub use decode::{DEFAULT_MAX_LINE_BYTES, EventDecoder};
pub use request::{PreparedRequest, QueryValue, StreamRequest};
pub use session::{RunSummary, SessionState, StreamEnd, StreamSession};
pub use signal::Signaller;
pub use throttle::ConnectThrottle;
