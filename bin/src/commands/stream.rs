//! Prices and events command implementation.

use anyhow::{Context, Result};
use clap::Args;
use std::io::{self, Write};
use tickwire_lib::prelude::*;
use tracing::{debug, info};

use crate::config::Config;
use crate::display::{self, Format};

/// Options shared by the streaming commands.
#[derive(Debug, Clone, Args)]
pub(crate) struct StreamOptions {
    /// Print heartbeats as well as resources
    #[arg(long)]
    pub(crate) heartbeats: bool,

    /// Stop after printing N resources
    #[arg(short = 'n', long)]
    pub(crate) limit: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    pub(crate) format: Format,
}

/// Builds a price stream request from flags and config.
pub(crate) fn prices_request(
    config: &Config,
    instruments: &[String],
    account: Option<String>,
) -> Result<StreamRequest> {
    let account = account
        .or_else(|| config.account_id.clone())
        .context("No account id: pass --account or set TICKWIRE_ACCOUNT_ID")?;
    let request = StreamRequest::prices(account, instruments.iter().map(String::as_str));
    Ok(request.with_client(config.client()?)?)
}

/// Builds an event stream request from flags and config.
pub(crate) fn events_request(config: &Config, accounts: Vec<String>) -> Result<StreamRequest> {
    let accounts = if accounts.is_empty() {
        config.account_id.iter().cloned().collect()
    } else {
        accounts
    };
    Ok(StreamRequest::events(accounts).with_client(config.client()?)?)
}

/// Streams resources to stdout until the limit, Ctrl-C, or the stream ends.
pub(crate) async fn stream(
    config: &Config,
    request: StreamRequest,
    options: &StreamOptions,
) -> Result<()> {
    let client = StreamClient::new(config.client_config())?;
    let mut session = StreamSession::new(request, client)
        .with_heartbeats(options.heartbeats || config.emit_heartbeats);
    if options.limit == Some(0) {
        session.stop();
    }

    let stdout = io::stdout();
    let mut printer = Printer::new(stdout.lock(), options.format, options.limit);

    // Dropping the run future on Ctrl-C closes the connection.
    let outcome = tokio::select! {
        outcome = session.run(|resource, signal| printer.handle(resource, signal)) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };
    let written = printer.finish()?;

    match outcome {
        Some(outcome) => {
            let summary = outcome.context("Stream ended with an error")?;
            info!(
                end = ?summary.end,
                written,
                suppressed_heartbeats = summary.suppressed_heartbeats,
                "done"
            );
        }
        None => info!(written, "interrupted"),
    }
    Ok(())
}

/// Callback sink that writes each resource as a line.
///
/// A write failure or reaching the limit stops the session through its
/// signaller.
#[derive(Debug)]
pub(crate) struct Printer<W> {
    out: W,
    format: Format,
    limit: Option<u64>,
    written: u64,
    error: Option<io::Error>,
}

impl<W: Write> Printer<W> {
    /// Creates a printer writing to `out`.
    pub(crate) const fn new(out: W, format: Format, limit: Option<u64>) -> Self {
        Self {
            out,
            format,
            limit,
            written: 0,
            error: None,
        }
    }

    /// Writes one resource and stops the session when done.
    pub(crate) fn handle(&mut self, resource: Resource, signal: &Signaller) {
        if self.error.is_some() {
            return;
        }
        let result = display::write_resource(&mut self.out, &resource, self.format)
            .and_then(|()| self.out.flush());
        if let Err(err) = result {
            self.error = Some(err);
            signal.stop();
            return;
        }

        self.written += 1;
        if self.limit.is_some_and(|limit| self.written >= limit) {
            debug!(written = self.written, "limit reached");
            signal.stop();
        }
    }

    /// Returns the number of lines written.
    ///
    /// A closed pipe counts as a normal end.
    pub(crate) fn finish(self) -> Result<u64> {
        match self.error {
            Some(err) if err.kind() != io::ErrorKind::BrokenPipe => {
                Err(err).context("Failed to write output")
            }
            _ => Ok(self.written),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    const EVENTS: &[u8] = b"{\"heartbeat\":{}}\n\
        {\"price\":{\"instrument\":\"EUR_USD\",\"bid\":1.0,\"ask\":1.5}}\n\
        {\"transaction\":{\"id\":1}}\n\
        {\"transaction\":{\"id\":2}}\n";

    fn body(
        bytes: &'static [u8],
    ) -> impl futures::Stream<Item = std::result::Result<Bytes, TransportError>> + Unpin {
        stream::iter(vec![Ok(Bytes::from_static(bytes))])
    }

    fn session() -> StreamSession {
        StreamSession::new(
            StreamRequest::events(["1"]),
            StreamClient::with_defaults().unwrap(),
        )
    }

    /// Writer that always fails.
    struct Failing(io::ErrorKind);

    impl Write for Failing {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(self.0.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_prints_every_resource() {
        let mut session = session().with_heartbeats(true);
        let mut printer = Printer::new(Vec::new(), Format::Ndjson, None);

        let summary = session
            .run_with_body(body(EVENTS), |resource, signal| printer.handle(resource, signal))
            .await
            .unwrap();
        assert_eq!(summary.end, StreamEnd::Exhausted);

        let out = String::from_utf8(printer.out.clone()).unwrap();
        assert_eq!(printer.finish().unwrap(), 4);
        let keys: Vec<String> = out
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value.as_object().unwrap().keys().next().unwrap().clone()
            })
            .collect();
        assert_eq!(keys, ["heartbeat", "price", "transaction", "transaction"]);
    }

    #[tokio::test]
    async fn test_limit_stops_the_session() {
        let mut session = session();
        let mut printer = Printer::new(Vec::new(), Format::Text, Some(2));

        let summary = session
            .run_with_body(body(EVENTS), |resource, signal| printer.handle(resource, signal))
            .await
            .unwrap();
        assert_eq!(summary.end, StreamEnd::Stopped);
        assert_eq!(summary.dispatched, 2);

        let out = String::from_utf8(printer.out.clone()).unwrap();
        assert_eq!(printer.finish().unwrap(), 2);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("price instrument=EUR_USD"));
        assert_eq!(lines[1], "transaction id=1");
    }

    #[tokio::test]
    async fn test_write_failure_stops_and_reports() {
        let mut session = session();
        let mut printer = Printer::new(Failing(io::ErrorKind::Other), Format::Ndjson, None);

        let summary = session
            .run_with_body(body(EVENTS), |resource, signal| printer.handle(resource, signal))
            .await
            .unwrap();
        assert_eq!(summary.end, StreamEnd::Stopped);
        assert_eq!(summary.dispatched, 1);
        assert!(printer.finish().is_err());
    }

    #[tokio::test]
    async fn test_broken_pipe_is_a_normal_end() {
        let mut session = session();
        let mut printer = Printer::new(Failing(io::ErrorKind::BrokenPipe), Format::Ndjson, None);

        session
            .run_with_body(body(EVENTS), |resource, signal| printer.handle(resource, signal))
            .await
            .unwrap();
        assert_eq!(printer.finish().unwrap(), 0);
    }

    #[test]
    fn test_prices_request_uses_config_account() {
        let config = Config {
            account_id: Some("1234".to_string()),
            ..Config::default()
        };
        let instruments = vec!["AUD_CAD".to_string(), "AUD_CHF".to_string()];

        let request = prices_request(&config, &instruments, None).unwrap();
        assert!(request.uri().ends_with("accountId=1234&instruments=AUD_CAD%2CAUD_CHF"));

        let request = prices_request(&config, &instruments, Some("99".to_string())).unwrap();
        assert!(request.uri().contains("accountId=99"));
    }

    #[test]
    fn test_prices_request_requires_account() {
        let instruments = vec!["EUR_USD".to_string()];
        assert!(prices_request(&Config::default(), &instruments, None).is_err());
    }

    #[test]
    fn test_events_request_accounts() {
        let config = Config {
            account_id: Some("7".to_string()),
            ..Config::default()
        };
        let request = events_request(&config, Vec::new()).unwrap();
        assert!(request.uri().ends_with("/v1/events?accountIds=7"));

        let request = events_request(&config, vec!["1".into(), "2".into()]).unwrap();
        assert!(request.uri().ends_with("/v1/events?accountIds=1%2C2"));

        let request = events_request(&Config::default(), Vec::new()).unwrap();
        assert!(request.uri().ends_with("/v1/events"));
    }
}
