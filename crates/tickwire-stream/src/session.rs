//! Stream session: connection lifecycle and the decode, classify, dispatch loop.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tickwire_types::{Client, Resource, ResourceKind, Result, StreamError, TransportError};
use tracing::{debug, info, warn};

use crate::classify::ResourceRegistry;
use crate::client::StreamClient;
use crate::decode::EventDecoder;
use crate::request::StreamRequest;
use crate::signal::Signaller;

/// Position of a session in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No run started yet.
    Idle,
    /// Opening the connection.
    Connecting,
    /// Dispatching events.
    Streaming,
    /// Ended by a stop request.
    Stopped,
    /// Ended because the server closed the stream.
    Exhausted,
    /// Ended by a server disconnect event.
    Disconnected,
    /// Ended by a transport, framing or protocol error.
    Failed,
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Stop was requested through the [`Signaller`].
    Stopped,
    /// The server closed the stream with no more data.
    Exhausted,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// How the run ended.
    pub end: StreamEnd,
    /// Number of callback invocations.
    pub dispatched: u64,
    /// Number of heartbeats discarded because emission was off.
    pub suppressed_heartbeats: u64,
}

impl RunSummary {
    const fn new() -> Self {
        Self {
            end: StreamEnd::Exhausted,
            dispatched: 0,
            suppressed_heartbeats: 0,
        }
    }
}

/// A single streaming consumer.
///
/// The session owns the request description, the heartbeat policy and the
/// stop signal. [`StreamSession::run`] takes `&mut self`, so the request
/// cannot change while a run is active. Independent sessions share no state
/// apart from the process-wide connect throttle.
///
/// # Example
///
/// ```no_run
/// use tickwire_stream::{StreamRequest, StreamSession};
///
/// # async fn demo() -> tickwire_types::Result<()> {
/// let mut session = StreamSession::with_defaults(StreamRequest::prices("1234", ["EUR_USD"]))?;
/// let summary = session
///     .run(|resource, signal| {
///         println!("{}", resource.key());
///         signal.stop();
///     })
///     .await?;
/// assert_eq!(summary.dispatched, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StreamSession {
    request: StreamRequest,
    client: StreamClient,
    registry: &'static ResourceRegistry,
    emit_heartbeats: bool,
    signal: Signaller,
    state: SessionState,
}

impl StreamSession {
    /// Creates a session that connects through `client`.
    #[must_use]
    pub fn new(request: StreamRequest, client: StreamClient) -> Self {
        Self {
            request,
            client,
            registry: ResourceRegistry::global(),
            emit_heartbeats: false,
            signal: Signaller::new(),
            state: SessionState::Idle,
        }
    }

    /// Creates a session with a default [`StreamClient`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults(request: StreamRequest) -> Result<Self> {
        Ok(Self::new(request, StreamClient::with_defaults()?))
    }

    /// Sets heartbeat emission, consuming and returning the session.
    #[must_use]
    pub const fn with_heartbeats(mut self, emit: bool) -> Self {
        self.emit_heartbeats = emit;
        self
    }

    /// Returns the request description.
    #[must_use]
    pub const fn request(&self) -> &StreamRequest {
        &self.request
    }

    /// Returns the request description for changes between runs.
    pub fn request_mut(&mut self) -> &mut StreamRequest {
        &mut self.request
    }

    /// Binds the client identity used by the next run.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidClientBinding`] if the identity fails
    /// validation; the previous binding is left unchanged.
    pub fn set_client(&mut self, client: Client) -> Result<()> {
        self.request.set_client(client)
    }

    /// Returns true if heartbeats are dispatched to the callback.
    #[must_use]
    pub const fn emit_heartbeats(&self) -> bool {
        self.emit_heartbeats
    }

    /// Sets whether heartbeats are dispatched to the callback.
    pub fn set_emit_heartbeats(&mut self, emit: bool) {
        self.emit_heartbeats = emit;
    }

    /// Requests the current or next run to stop.
    ///
    /// A run observes the request after its next dispatched event, or
    /// before connecting if it has not started yet.
    pub fn stop(&self) {
        self.signal.stop();
    }

    /// Returns true if stop has been requested for the current or next run.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.signal.stop_requested()
    }

    /// Returns a handle to the stop signal of the current or next run.
    #[must_use]
    pub fn signaller(&self) -> Signaller {
        self.signal.clone()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Connects and dispatches events to `callback` until stop, disconnect,
    /// an error, or the server closing the stream.
    ///
    /// The callback receives every recognized resource, and heartbeats when
    /// emission is on, in wire order, together with a [`Signaller`]. The
    /// connection is closed before this returns, on every path.
    ///
    /// Dropping the returned future also closes the connection. The session
    /// is then left in [`SessionState::Stopped`] with a fresh stop signal.
    ///
    /// # Errors
    ///
    /// - [`StreamError::TransportFailure`] if connecting or reading fails
    /// - [`StreamError::StreamDisconnected`] on a server disconnect event
    /// - [`StreamError::UnrecognizedResource`] on an unknown event key
    /// - [`StreamError::MalformedStreamData`] on undecodable data
    pub async fn run<F>(&mut self, mut callback: F) -> Result<RunSummary>
    where
        F: FnMut(Resource, &Signaller),
    {
        if self.signal.stop_requested() {
            info!("stop requested before connecting");
            return Ok(self.finish_stopped_early());
        }

        let prepared = self.request.prepare();
        info!(uri = %prepared.uri, heartbeats = self.emit_heartbeats, "opening stream");

        let mut guard = RunGuard::new(&mut self.state, &mut self.signal);
        guard.enter(SessionState::Connecting);
        let signal = guard.stop_signal();

        let outcome = match self.client.open(&prepared).await {
            Ok(body) => {
                guard.enter(SessionState::Streaming);
                dispatch_loop(
                    EventDecoder::new(body),
                    self.registry,
                    self.emit_heartbeats,
                    &signal,
                    &mut callback,
                )
                .await
            }
            Err(err) => Err(err),
        };
        guard.finish(&outcome);
        outcome
    }

    /// Runs the dispatch loop over an already-open body.
    ///
    /// Behaves like [`StreamSession::run`] after the connection is made.
    /// `body` is dropped before this returns.
    ///
    /// # Errors
    ///
    /// See [`StreamSession::run`].
    pub async fn run_with_body<S, F>(&mut self, body: S, mut callback: F) -> Result<RunSummary>
    where
        S: Stream<Item = std::result::Result<Bytes, TransportError>> + Unpin,
        F: FnMut(Resource, &Signaller),
    {
        if self.signal.stop_requested() {
            return Ok(self.finish_stopped_early());
        }

        let mut guard = RunGuard::new(&mut self.state, &mut self.signal);
        guard.enter(SessionState::Streaming);
        let signal = guard.stop_signal();

        let outcome = dispatch_loop(
            EventDecoder::new(body),
            self.registry,
            self.emit_heartbeats,
            &signal,
            &mut callback,
        )
        .await;
        guard.finish(&outcome);
        outcome
    }

    fn finish_stopped_early(&mut self) -> RunSummary {
        self.state = SessionState::Stopped;
        self.signal = Signaller::new();
        RunSummary {
            end: StreamEnd::Stopped,
            ..RunSummary::new()
        }
    }
}

/// Session state held for the duration of one run.
///
/// On drop, a run that never reached a terminal state is marked
/// [`SessionState::Stopped`], and a fresh stop signal is installed for the
/// next run.
struct RunGuard<'a> {
    state: &'a mut SessionState,
    signal: &'a mut Signaller,
}

impl<'a> RunGuard<'a> {
    const fn new(state: &'a mut SessionState, signal: &'a mut Signaller) -> Self {
        Self { state, signal }
    }

    fn enter(&mut self, state: SessionState) {
        *self.state = state;
    }

    fn stop_signal(&self) -> Signaller {
        self.signal.clone()
    }

    /// Records the terminal state for `outcome`.
    fn finish(self, outcome: &Result<RunSummary>) {
        *self.state = match outcome {
            Ok(summary) if summary.end == StreamEnd::Stopped => SessionState::Stopped,
            Ok(_) => SessionState::Exhausted,
            Err(StreamError::StreamDisconnected { .. }) => SessionState::Disconnected,
            Err(_) => SessionState::Failed,
        };

        match outcome {
            Ok(summary) => info!(
                end = ?summary.end,
                dispatched = summary.dispatched,
                suppressed_heartbeats = summary.suppressed_heartbeats,
                "stream ended"
            ),
            Err(err) => warn!(error = %err, state = ?*self.state, "stream failed"),
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if matches!(
            *self.state,
            SessionState::Connecting | SessionState::Streaming
        ) {
            debug!(state = ?*self.state, "run dropped before completion");
            *self.state = SessionState::Stopped;
        }
        *self.signal = Signaller::new();
    }
}

/// Decodes, classifies and dispatches events until the run ends.
///
/// Owns `events`, so the connection is released when this returns.
async fn dispatch_loop<S, F>(
    mut events: EventDecoder<S>,
    registry: &ResourceRegistry,
    emit_heartbeats: bool,
    signal: &Signaller,
    callback: &mut F,
) -> Result<RunSummary>
where
    S: Stream<Item = std::result::Result<Bytes, TransportError>> + Unpin,
    F: FnMut(Resource, &Signaller),
{
    let mut summary = RunSummary::new();
    if signal.stop_requested() {
        summary.end = StreamEnd::Stopped;
        return Ok(summary);
    }

    while let Some(event) = events.next().await {
        let resource = match registry.classify(event?)? {
            ResourceKind::Heartbeat(_) if !emit_heartbeats => {
                summary.suppressed_heartbeats += 1;
                continue;
            }
            ResourceKind::Heartbeat(heartbeat) => Resource::Heartbeat(heartbeat),
            ResourceKind::Recognized(resource) => resource,
            ResourceKind::Disconnect(disconnect) => {
                warn!(code = disconnect.code, message = %disconnect.message, "server disconnected stream");
                return Err(StreamError::StreamDisconnected {
                    code: disconnect.code,
                    message: disconnect.message,
                    more_info: disconnect.more_info,
                });
            }
            ResourceKind::Unknown(key) => {
                warn!(key = %key, "unrecognized resource on stream");
                return Err(StreamError::UnrecognizedResource { key });
            }
        };

        callback(resource, signal);
        summary.dispatched += 1;

        if signal.stop_requested() {
            debug!(dispatched = summary.dispatched, "stop observed");
            summary.end = StreamEnd::Stopped;
            return Ok(summary);
        }
    }

    Ok(summary)
}
