//! Query encoding for tracking requests.
//!
//! Every request follows one grammar:
//!
//! ```text
//! <scheme>://<host><path>?<core-params>[&<property-args>]
//! ```
//!
//! | call          | path | core params                                   |
//! |---------------|------|-----------------------------------------------|
//! | event         | `/e` | `_k=<key>&_p=<identity>&_d=1&_t=<secs>&_n=<name>` |
//! | property set  | `/s` | `_k=<key>&_p=<identity>&_d=1&_t=<secs>`       |
//! | identity link | `/a` | `_k=<key>&_p=<first>&_n=<second>`             |
//!
//! Property args are rendered `key=value` joined with `&`. Values are
//! percent-encoded, keys never are.

use std::borrow::Cow;
use std::fmt::Write;

use thiserror::Error;

use crate::properties::PropertyBag;
use crate::request::PendingRequest;
use crate::types::{ApiKey, EventName, Identity, Scheme};

/// Host receiving tracking requests unless configured otherwise.
pub const DEFAULT_HOST: &str = "trk.kissmetrics.com";

/// Encoding errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The property bag had no entry with both a key and a value.
    #[error("no valid properties to encode")]
    NoValidProperties,
}

/// The endpoint a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Record an event.
    Event,
    /// Set properties on the current identity.
    Properties,
    /// Link two identities.
    Alias,
}

impl Endpoint {
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Event => "/e",
            Self::Properties => "/s",
            Self::Alias => "/a",
        }
    }
}

/// Builds [`PendingRequest`]s for one account.
///
/// The API key, identities and event names are percent-encoded like property
/// values, so `user@example.com` goes out as `user%40example.com`. Clients
/// that format these raw produce different bytes for the same request; the
/// collector decodes both to the same values.
#[derive(Debug, Clone)]
pub struct QueryEncoder {
    api_key: ApiKey,
    host: String,
    scheme: Scheme,
}

impl QueryEncoder {
    /// Creates an encoder targeting [`DEFAULT_HOST`] over HTTPS.
    #[must_use]
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            host: DEFAULT_HOST.to_string(),
            scheme: Scheme::Https,
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Changes the scheme for requests built from now on.
    pub const fn set_scheme(&mut self, scheme: Scheme) {
        self.scheme = scheme;
    }

    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Builds an event request. Absent or empty properties add no args.
    pub fn event(
        &self,
        identity: &Identity,
        name: &EventName,
        properties: Option<&PropertyBag>,
        timestamp: i64,
    ) -> PendingRequest {
        let mut query = format!(
            "_k={}&_p={}&_d=1&_t={timestamp}&_n={}",
            encode_value(self.api_key.as_str()),
            encode_value(identity.as_str()),
            encode_value(name.as_str()),
        );
        if let Some(properties) = properties {
            append_args(&mut query, &encode_property_args(properties));
        }
        self.build(Endpoint::Event, &query)
    }

    /// Builds a property-set request.
    ///
    /// Fails when the bag renders to an empty argument string, because a
    /// property-set call without properties is meaningless.
    pub fn properties(
        &self,
        identity: &Identity,
        properties: &PropertyBag,
        timestamp: i64,
    ) -> Result<PendingRequest, EncodeError> {
        let args = encode_property_args(properties);
        if args.is_empty() {
            return Err(EncodeError::NoValidProperties);
        }
        let mut query = format!(
            "_k={}&_p={}&_d=1&_t={timestamp}",
            encode_value(self.api_key.as_str()),
            encode_value(identity.as_str()),
        );
        append_args(&mut query, &args);
        Ok(self.build(Endpoint::Properties, &query))
    }

    /// Builds an identity-link request tying `first` to `second`.
    pub fn link(&self, first: &Identity, second: &Identity) -> PendingRequest {
        let query = format!(
            "_k={}&_p={}&_n={}",
            encode_value(self.api_key.as_str()),
            encode_value(first.as_str()),
            encode_value(second.as_str()),
        );
        self.build(Endpoint::Alias, &query)
    }

    fn build(&self, endpoint: Endpoint, query: &str) -> PendingRequest {
        PendingRequest::new(format!(
            "{}://{}{}?{query}",
            self.scheme,
            self.host,
            endpoint.path()
        ))
    }
}

/// Renders the valid entries of `properties` as `key=value` pairs joined by `&`.
///
/// Entries with an empty key or an absent value are skipped, so the result is
/// empty when nothing is left to send.
pub fn encode_property_args(properties: &PropertyBag) -> String {
    let mut out = String::new();
    for (key, value) in properties.valid_entries() {
        if !out.is_empty() {
            out.push('&');
        }
        // Writing to a String cannot fail.
        let _ = write!(out, "{key}={}", encode_value(value));
    }
    out
}

fn append_args(query: &mut String, args: &str) {
    if !args.is_empty() {
        query.push('&');
        query.push_str(args);
    }
}

fn encode_value(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}
