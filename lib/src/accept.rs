//! Handoff record handed to the downstream push subsystem when an origin
//! response turns out to be a push instruction: one stub per frozen client
//! plus the fully buffered request and response.

use std::net::IpAddr;

use crate::client::{RequestId, ServerState};
use crate::{RequestData, ResponseData};

/// Side-channel inspection verdict forwarded through the proxy untouched.
#[derive(Debug, Clone, Default)]
pub struct InspectData {
    pub do_proxy: bool,
    pub sharing_key: Vec<u8>,
    pub user_data: Vec<u8>,
}

/// One frozen client, reduced to what the push subsystem needs to resume
/// the downstream connection.
#[derive(Debug, Clone)]
pub struct AcceptRequest {
    pub rid: RequestId,
    pub https: bool,
    pub peer_address: Option<IpAddr>,
    pub auto_cross_origin: bool,
    pub jsonp_callback: Option<String>,
    pub server_state: ServerState,
}

#[derive(Debug, Clone)]
pub struct AcceptData {
    pub requests: Vec<AcceptRequest>,
    /// The shared request, body restored from the accept buffer.
    pub request_data: RequestData,
    pub have_response: bool,
    /// The instruction response, body restored from the accept buffer.
    pub response_data: ResponseData,
    pub channel_prefix: String,
    pub inspect_data: Option<InspectData>,
}
