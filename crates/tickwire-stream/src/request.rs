//! Stream request construction.
//!
//! A [`StreamRequest`] is a pure description of the streaming connection to
//! open. [`StreamRequest::prepare`] turns it into a [`PreparedRequest`] with
//! the final URI and headers; no network I/O happens here.

use std::collections::BTreeMap;

use reqwest::Method;
use tickwire_types::{Client, Result};

/// API version path segment.
pub const API_VERSION: &str = "v1";

/// A query option value.
///
/// Lists serialize as one comma-joined, percent-encoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// A single value.
    Scalar(String),
    /// A list of values; omitted from the query when empty.
    List(Vec<String>),
}

impl QueryValue {
    /// Returns the encoded value, or `None` for an empty list.
    fn encode(&self) -> Option<String> {
        match self {
            Self::Scalar(value) => Some(urlencoding::encode(value).into_owned()),
            Self::List(items) if items.is_empty() => None,
            Self::List(items) => Some(urlencoding::encode(&items.join(",")).into_owned()),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Scalar(value.to_string())
    }
}

macro_rules! scalar_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(value: $ty) -> Self {
                    Self::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_from_int!(i32, i64, u32, u64, usize);

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for QueryValue {
    fn from(values: &[&str]) -> Self {
        Self::List(values.iter().map(|v| (*v).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for QueryValue {
    fn from(values: [&str; N]) -> Self {
        Self::List(values.iter().map(|v| (*v).to_string()).collect())
    }
}

/// Description of a streaming connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    path: String,
    options: BTreeMap<String, QueryValue>,
    headers: BTreeMap<String, String>,
    client: Option<Client>,
}

impl StreamRequest {
    /// Creates a request for a path below the API version root, or for an
    /// absolute `http(s)://` URI used verbatim.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            options: BTreeMap::new(),
            headers: BTreeMap::new(),
            client: None,
        }
    }

    /// Creates a price stream request for the given instruments.
    ///
    /// # Example
    ///
    /// ```
    /// use tickwire_stream::StreamRequest;
    ///
    /// let request = StreamRequest::prices("1234", ["AUD_CAD", "AUD_CHF"]);
    /// assert_eq!(
    ///     request.uri(),
    ///     "http://stream-sandbox.oanda.com/v1/prices?accountId=1234&instruments=AUD_CAD%2CAUD_CHF"
    /// );
    /// ```
    #[must_use]
    pub fn prices<I, S>(account_id: impl Into<String>, instruments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let instruments: Vec<String> = instruments.into_iter().map(Into::into).collect();
        Self::new("prices")
            .with_option("accountId", account_id.into())
            .with_option("instruments", instruments)
    }

    /// Creates an account event stream request.
    ///
    /// With no account ids the server streams events for every account the
    /// token can access.
    #[must_use]
    pub fn events<I, S>(account_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let account_ids: Vec<String> = account_ids.into_iter().map(Into::into).collect();
        Self::new("events").with_option("accountIds", account_ids)
    }

    /// Sets a query option, replacing any previous value for `key`.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.set_option(key, value);
        self
    }

    /// Sets a query option in place.
    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.options.insert(key.into(), value.into());
    }

    /// Removes a query option.
    pub fn remove_option(&mut self, key: &str) -> Option<QueryValue> {
        self.options.remove(key)
    }

    /// Sets a header; caller headers win over defaults and credentials.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Binds a client identity, consuming and returning the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity fails validation.
    pub fn with_client(mut self, client: Client) -> Result<Self> {
        self.set_client(client)?;
        Ok(self)
    }

    /// Binds a client identity.
    ///
    /// # Errors
    ///
    /// Returns [`tickwire_types::StreamError::InvalidClientBinding`] if the
    /// identity fails validation; the previous binding is left unchanged.
    pub fn set_client(&mut self, client: Client) -> Result<()> {
        client.validate()?;
        self.client = Some(client);
        Ok(())
    }

    /// Removes the client binding so the default identity is used.
    pub fn clear_client(&mut self) {
        self.client = None;
    }

    /// Returns the bound client identity, if any.
    #[must_use]
    pub const fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    /// Returns the identity the request will connect as.
    #[must_use]
    pub fn effective_client(&self) -> Client {
        self.client.clone().unwrap_or_else(Client::default_client)
    }

    /// Returns the encoded query string, keys in lexicographic order.
    #[must_use]
    pub fn query_string(&self) -> String {
        self.options
            .iter()
            .filter_map(|(key, value)| {
                value
                    .encode()
                    .map(|value| format!("{}={}", urlencoding::encode(key), value))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Returns the absolute request URI.
    #[must_use]
    pub fn uri(&self) -> String {
        self.uri_for(&self.effective_client())
    }

    fn uri_for(&self, client: &Client) -> String {
        let mut uri = if self.path.starts_with("http://") || self.path.starts_with("https://") {
            self.path.clone()
        } else {
            format!(
                "{}/{}/{}",
                client.domain().stream_base_url(),
                API_VERSION,
                self.path.trim_start_matches('/')
            )
        };

        let query = self.query_string();
        if !query.is_empty() {
            uri.push(if uri.contains('?') { '&' } else { '?' });
            uri.push_str(&query);
        }
        uri
    }

    /// Builds the final request.
    #[must_use]
    pub fn prepare(&self) -> PreparedRequest {
        let client = self.effective_client();

        let mut headers = BTreeMap::new();
        headers.insert("accept".to_string(), "application/json".to_string());
        headers.insert(
            "user-agent".to_string(),
            format!("tickwire/{}", env!("CARGO_PKG_VERSION")),
        );
        if let Some(token) = client.access_token() {
            headers.insert("authorization".to_string(), format!("Bearer {token}"));
        }
        headers.extend(self.headers.clone());

        PreparedRequest {
            method: Method::GET,
            uri: self.uri_for(&client),
            headers,
        }
    }
}

/// A fully specified outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URI including the query string.
    pub uri: String,
    /// Lowercase header names mapped to values.
    pub headers: BTreeMap<String, String>,
}

impl PreparedRequest {
    /// Returns the headers with credentials masked, for display and logs.
    #[must_use]
    pub fn redacted_headers(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .map(|(name, value)| {
                let value = if name == "authorization" {
                    "Bearer <redacted>".to_string()
                } else {
                    value.clone()
                };
                (name.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickwire_types::{Domain, StreamError};

    fn practice() -> Client {
        Client::new(Domain::Practice, Some("token-abc".to_string()))
    }

    #[test]
    fn test_query_ordering_and_list_encoding() {
        let request = StreamRequest::new("prices")
            .with_option("instruments", vec!["AUD_CAD", "AUD_CHF"])
            .with_option("account", 1234);
        assert_eq!(
            request.query_string(),
            "account=1234&instruments=AUD_CAD%2CAUD_CHF"
        );
    }

    #[test]
    fn test_query_is_deterministic() {
        let a = StreamRequest::new("prices")
            .with_option("b", "2")
            .with_option("a", "1")
            .with_option("c", ["x", "y"]);
        let b = StreamRequest::new("prices")
            .with_option("c", ["x", "y"])
            .with_option("a", "1")
            .with_option("b", "2");
        assert_eq!(a.uri(), b.uri());
        assert_eq!(a.uri(), a.uri());
    }

    #[test]
    fn test_scalar_values_are_encoded() {
        let request = StreamRequest::new("prices").with_option("q", "a b&c");
        assert_eq!(request.query_string(), "q=a%20b%26c");
    }

    #[test]
    fn test_empty_list_is_omitted() {
        let request = StreamRequest::events(Vec::<String>::new());
        assert_eq!(request.query_string(), "");
        assert_eq!(request.uri(), "http://stream-sandbox.oanda.com/v1/events");
    }

    #[test]
    fn test_prices_uri_for_bound_client() {
        let request = StreamRequest::prices("1234", ["EUR_USD"])
            .with_client(practice())
            .unwrap();
        assert_eq!(
            request.uri(),
            "https://stream-fxpractice.oanda.com/v1/prices?accountId=1234&instruments=EUR_USD"
        );
    }

    #[test]
    fn test_absolute_uri_is_kept() {
        let request = StreamRequest::new("http://127.0.0.1:9000/stream?x=1").with_option("y", 2);
        assert_eq!(request.uri(), "http://127.0.0.1:9000/stream?x=1&y=2");
    }

    #[test]
    fn test_header_layering() {
        let prepared = StreamRequest::events(["1"])
            .with_client(practice())
            .unwrap()
            .with_header("Accept", "application/x-ndjson")
            .with_header("X-Trace", "on")
            .prepare();

        assert_eq!(prepared.method, Method::GET);
        assert_eq!(prepared.headers["accept"], "application/x-ndjson");
        assert_eq!(prepared.headers["authorization"], "Bearer token-abc");
        assert_eq!(prepared.headers["x-trace"], "on");
        assert!(prepared.headers["user-agent"].starts_with("tickwire/"));
    }

    #[test]
    fn test_sandbox_has_no_authorization() {
        let prepared = StreamRequest::events(["1"])
            .with_client(Client::sandbox())
            .unwrap()
            .prepare();
        assert!(!prepared.headers.contains_key("authorization"));
    }

    #[test]
    fn test_invalid_client_keeps_previous_binding() {
        let mut request = StreamRequest::events(["1"]).with_client(practice()).unwrap();
        let result = request.set_client(Client::new(Domain::Live, None));
        assert!(matches!(result, Err(StreamError::InvalidClientBinding(_))));
        assert_eq!(request.client(), Some(&practice()));
    }

    #[test]
    fn test_redacted_headers() {
        let prepared = StreamRequest::events(["1"])
            .with_client(practice())
            .unwrap()
            .prepare();
        let redacted = prepared.redacted_headers();
        assert_eq!(redacted["authorization"], "Bearer <redacted>");
        assert_eq!(redacted["accept"], "application/json");
    }
}
