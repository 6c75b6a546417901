//! Client identity: the environment a stream connects to and its credentials.

use std::str::FromStr;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::{Result, StreamError};

/// Identity used by requests that have no explicit client binding.
static DEFAULT_CLIENT: RwLock<Option<Client>> = RwLock::new(None);

/// API environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Unauthenticated sandbox with simulated data.
    #[default]
    Sandbox,
    /// Practice (demo) accounts.
    Practice,
    /// Live trading accounts.
    Live,
}

impl Domain {
    /// Returns the domain as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Practice => "practice",
            Self::Live => "live",
        }
    }

    /// Returns the base URI of the streaming endpoints.
    #[must_use]
    pub const fn stream_base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "http://stream-sandbox.oanda.com",
            Self::Practice => "https://stream-fxpractice.oanda.com",
            Self::Live => "https://stream-fxtrade.oanda.com",
        }
    }

    /// Returns true if connections to this domain must carry an access token.
    #[must_use]
    pub const fn requires_token(&self) -> bool {
        !matches!(self, Self::Sandbox)
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Domain {
    type Err = DomainParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "practice" | "fxpractice" | "demo" => Ok(Self::Practice),
            "live" | "fxtrade" | "trade" => Ok(Self::Live),
            _ => Err(DomainParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid domain string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainParseError(String);

impl std::fmt::Display for DomainParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid domain '{}', expected one of: sandbox, practice, live",
            self.0
        )
    }
}

impl std::error::Error for DomainParseError {}

/// An authenticated client identity.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Client {
    domain: Domain,
    access_token: Option<String>,
}

impl Client {
    /// Creates a client identity without validating it.
    ///
    /// Use [`Client::validate`] or bind it to a request to check it.
    #[must_use]
    pub fn new(domain: Domain, access_token: Option<String>) -> Self {
        Self {
            domain,
            access_token,
        }
    }

    /// Creates a sandbox identity, which needs no token.
    #[must_use]
    pub const fn sandbox() -> Self {
        Self {
            domain: Domain::Sandbox,
            access_token: None,
        }
    }

    /// Returns the domain.
    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.domain
    }

    /// Returns the access token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Checks that this identity can be used to open a stream.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidClientBinding`] if the domain requires a
    /// token and none is set, or if the token is not a valid header value.
    pub fn validate(&self) -> Result<()> {
        match self.access_token.as_deref() {
            None if self.domain.requires_token() => Err(StreamError::InvalidClientBinding(
                format!("{} domain requires an access token", self.domain),
            )),
            Some("") => Err(StreamError::InvalidClientBinding(
                "access token is empty".to_string(),
            )),
            Some(token) if !token.bytes().all(|b| b.is_ascii_graphic()) => Err(
                StreamError::InvalidClientBinding(
                    "access token contains whitespace or non-printable characters".to_string(),
                ),
            ),
            _ => Ok(()),
        }
    }

    /// Returns the process-wide default identity.
    ///
    /// This is [`Client::sandbox`] until replaced with [`Client::set_default`].
    #[must_use]
    pub fn default_client() -> Self {
        let guard = DEFAULT_CLIENT
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.clone().unwrap_or_else(Self::sandbox)
    }

    /// Replaces the process-wide default identity.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidClientBinding`] if `client` fails
    /// validation; the previous default is kept.
    pub fn set_default(client: Self) -> Result<()> {
        client.validate()?;
        let mut guard = DEFAULT_CLIENT
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(client);
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("domain", &self.domain)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
