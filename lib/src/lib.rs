//! Session core of a reverse proxy fronting a realtime-push gateway.
//!
//! A [`ProxySession`](session::ProxySession) multiplexes one upstream HTTP
//! request to any number of attached downstream clients, retries across
//! ordered origin targets, and decides whether the origin response is an
//! ordinary reply to stream back or a push-channel instruction to hand off
//! to the downstream push subsystem.
//!
//! The crate contains no I/O. Downstream clients, the upstream transport
//! and the route map are trait seams ([`client::ClientSession`],
//! [`upstream::UpstreamTransport`], [`router::RouteMap`]); the embedding
//! reactor forwards its readiness callbacks to the session's handler
//! methods and drains emitted [`SessionEvent`](session::SessionEvent)s
//! after each one.

pub mod accept;
pub mod buffer;
pub mod client;
pub mod config;
pub mod editor;
pub mod fanout;
pub mod metrics;
pub mod router;
pub mod session;
pub mod token;
pub mod upstream;

use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

pub use crate::accept::{AcceptData, AcceptRequest, InspectData};
pub use crate::config::{SessionConfig, XffRule};
pub use crate::fanout::ClientToken;
pub use crate::session::{ProxySession, SessionEvent};

/// Captured downstream request, as relayed to the origin.
///
/// Headers keep duplicate names and match case-insensitively. The body is
/// moved out when a handoff record is built.
#[derive(Debug, Clone)]
pub struct RequestData {
    pub method: Method,
    pub uri: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Captured origin response, as relayed to downstream clients.
#[derive(Debug, Clone, Default)]
pub struct ResponseData {
    pub code: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}
