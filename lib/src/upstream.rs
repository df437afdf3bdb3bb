//! Upstream transport seam. The session asks the transport for a fresh
//! request handle per target attempt; exactly one handle is live at a time.

use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

/// Why an upstream request failed. Only the connection-class conditions
/// (`Connect`, `ConnectTimeout`, `Tls`) are retryable, and only before a
/// response has been received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCondition {
    Generic,
    Connect,
    ConnectTimeout,
    Tls,
    LengthRequired,
    Timeout,
    BodyNotAllowed,
}

pub trait UpstreamRequest {
    fn set_connect_host(&mut self, host: &str);
    fn set_connect_port(&mut self, port: u16);
    fn set_ignore_policies(&mut self, on: bool);
    fn set_ignore_tls_errors(&mut self, on: bool);

    fn start(&mut self, method: &Method, uri: &Url, headers: &HeaderMap);
    fn write_body(&mut self, body: Bytes);
    fn end_body(&mut self);

    /// Drains up to `max` received body bytes.
    fn read_body(&mut self, max: usize) -> Bytes;
    fn is_finished(&self) -> bool;

    fn response_code(&self) -> u16;
    fn response_reason(&self) -> String;
    fn response_headers(&self) -> HeaderMap;
    fn error_condition(&self) -> ErrorCondition;
}

/// Factory for upstream request handles, borrowed from the process for the
/// session's lifetime.
pub trait UpstreamTransport {
    fn create_request(&self) -> Box<dyn UpstreamRequest>;
}
