//! Downstream client seam. A client session wraps one accepted downstream
//! request; once attached to a proxy session it is owned by it and must
//! eventually report `finished`. That holds after `error_responding` too:
//! the entry is kept alive (with accounting disabled) until that final
//! signal arrives.

use std::net::IpAddr;

use bytes::Bytes;
use http::HeaderMap;

use crate::RequestData;

/// Identifier of one downstream request: the sending peer plus its
/// per-peer request id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId {
    pub sender: String,
    pub id: String,
}

impl RequestId {
    pub fn new<S: Into<String>, I: Into<String>>(sender: S, id: I) -> Self {
        Self {
            sender: sender.into(),
            id: id.into(),
        }
    }
}

/// Opaque server-side protocol state captured when a client is frozen for
/// handoff. The downstream push subsystem resumes the connection from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerState {
    pub in_seq: u64,
    pub out_seq: u64,
    pub out_credits: u32,
    pub user_data: Option<Vec<u8>>,
}

pub trait ClientSession {
    fn rid(&self) -> RequestId;
    fn is_https(&self) -> bool;
    /// True when this client re-entered the proxy from the push subsystem;
    /// a retried request has no live input to read from.
    fn is_retry(&self) -> bool;
    fn peer_address(&self) -> Option<IpAddr>;
    fn request_data(&self) -> RequestData;
    fn auto_cross_origin(&self) -> bool;
    fn jsonp_callback(&self) -> Option<String>;
    fn server_state(&self) -> ServerState;

    /// Drains whatever request-body bytes the client has read so far.
    fn read_request_body(&mut self) -> Bytes;
    fn is_request_finished(&self) -> bool;

    fn start_response(&mut self, code: u16, reason: &str, headers: &HeaderMap);
    fn write_response_body(&mut self, body: Bytes);
    fn end_response_body(&mut self);
    fn respond_error(&mut self, code: u16, reason: &str, message: &str);
    fn respond_cannot_accept(&mut self);
    fn pause(&mut self);
}
