//! Fully formed tracking requests waiting to be delivered.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dispatch marker written by older protocol versions.
const LEGACY_DISPATCH_MARKER: &str = "&_d=0";
/// Dispatch marker written by the current encoder.
const DISPATCH_MARKER: &str = "&_d=1";

/// An encoded request URL. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingRequest(String);

impl PendingRequest {
    pub(crate) const fn new(url: String) -> Self {
        Self(url)
    }

    /// Rebuilds a request restored from the durable queue.
    ///
    /// Legacy `&_d=0` markers are rewritten to `&_d=1`; nothing else changes.
    #[must_use]
    pub fn from_persisted(url: impl Into<String>) -> Self {
        let url = url.into();
        if url.contains(LEGACY_DISPATCH_MARKER) {
            Self(url.replace(LEGACY_DISPATCH_MARKER, DISPATCH_MARKER))
        } else {
            Self(url)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PendingRequest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
