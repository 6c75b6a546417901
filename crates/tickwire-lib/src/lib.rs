//! Streaming market data client.
//!
//! This is a facade crate that re-exports functionality from the tickwire
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```no_run
//! use tickwire_lib::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::new(Domain::Practice, Some("my-token".to_string()));
//!     let request = StreamRequest::prices("1234", ["EUR_USD", "USD_JPY"]).with_client(client)?;
//!     let mut session = StreamSession::with_defaults(request)?;
//!
//!     let mut seen = 0;
//!     session
//!         .run(|resource, signal| {
//!             if let Resource::Price(price) = resource {
//!                 println!("{:?} mid={:?}", price.instrument, price.mid());
//!             }
//!             seen += 1;
//!             if seen == 100 {
//!                 signal.stop();
//!             }
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tickwire/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use tickwire_types::*;

// Re-export the streaming pipeline
#[cfg(feature = "stream")]
pub use tickwire_stream::{
    BodyStream, ClientConfig, ConnectThrottle, EventDecoder, PreparedRequest, QueryValue,
    ResourceRegistry, RunSummary, SessionState, Signaller, StreamClient, StreamEnd, StreamRequest,
    StreamSession, request,
};

/// Prelude module for convenient imports.
///
/// ```
/// use tickwire_lib::prelude::*;
/// ```
pub mod prelude {
    pub use tickwire_types::{
        Client, Domain, Heartbeat, Order, Position, Price, Resource, ResourceKind, Result,
        StreamError, Trade, Transaction, TransportError,
    };

    #[cfg(feature = "stream")]
    pub use tickwire_stream::{
        ClientConfig, RunSummary, Signaller, StreamClient, StreamEnd, StreamRequest,
        StreamSession,
    };
}
