//! Route resolution seam. The process-wide route table is owned by the
//! embedder; sessions borrow it for their lifetime and consume the entry's
//! target list front to back while retrying.

use std::collections::VecDeque;

/// One candidate origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    /// Connect with https.
    pub ssl: bool,
    /// Relax policy enforcement on the upstream transport.
    pub trusted: bool,
    /// Ignore TLS certificate errors for this target.
    pub insecure: bool,
}

impl Target {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ssl: false,
            trusted: false,
            insecure: false,
        }
    }
}

/// Resolved route: channel prefix, ordered candidates and signing material.
#[derive(Debug, Clone, Default)]
pub struct RouteEntry {
    pub prefix: String,
    pub targets: VecDeque<Target>,
    pub sig_iss: String,
    pub sig_key: String,
}

/// Resolves `(host, encoded path, scheme)` to a route entry, or `None` when
/// the host has no routes.
pub trait RouteMap {
    fn entry(&self, host: &str, encoded_path: &str, is_https: bool) -> Option<RouteEntry>;
}
