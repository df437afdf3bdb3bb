//! A scripted downstream client. Everything the session does to the client
//! lands in a shared [`ClientRecord`] that the scenario driver inspects
//! after the run; request-body input is scripted through a shared
//! [`RequestInput`] queue.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use pushgate_lib::client::{ClientSession, RequestId, ServerState};
use pushgate_lib::RequestData;

#[derive(Debug, Default)]
pub struct ClientRecord {
    pub response: Option<(u16, String, HeaderMap)>,
    /// Response body as delivered, concatenated.
    pub body: BytesMut,
    /// Size of each individual body write.
    pub writes: Vec<usize>,
    pub body_ended: bool,
    pub error: Option<(u16, String, String)>,
    pub cannot_accept: bool,
    pub pause_requested: bool,
}

#[derive(Debug, Default)]
pub struct RequestInput {
    pub chunks: VecDeque<Bytes>,
    pub finished: bool,
}

pub struct MockClient {
    rid: RequestId,
    https: bool,
    retry: bool,
    peer: Option<IpAddr>,
    auto_cross_origin: bool,
    jsonp_callback: Option<String>,
    server_state: ServerState,
    request: RequestData,
    input: Rc<RefCell<RequestInput>>,
    record: Rc<RefCell<ClientRecord>>,
}

impl MockClient {
    pub fn new(id: &str, request: RequestData) -> Self {
        Self {
            rid: RequestId::new("e2e", id),
            https: false,
            retry: false,
            peer: None,
            auto_cross_origin: false,
            jsonp_callback: None,
            server_state: ServerState::default(),
            request,
            input: Rc::new(RefCell::new(RequestInput {
                chunks: VecDeque::new(),
                finished: true,
            })),
            record: Rc::new(RefCell::new(ClientRecord::default())),
        }
    }

    pub fn with_https(mut self) -> Self {
        self.https = true;
        self
    }

    pub fn with_retry(mut self) -> Self {
        self.retry = true;
        self
    }

    pub fn with_peer(mut self, peer: IpAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn with_server_state(mut self, state: ServerState) -> Self {
        self.server_state = state;
        self
    }

    /// Leaves the request input open so the driver can stream chunks in.
    pub fn with_streaming_input(self) -> Self {
        self.input.borrow_mut().finished = false;
        self
    }

    pub fn record(&self) -> Rc<RefCell<ClientRecord>> {
        self.record.clone()
    }

    pub fn input(&self) -> Rc<RefCell<RequestInput>> {
        self.input.clone()
    }
}

impl ClientSession for MockClient {
    fn rid(&self) -> RequestId {
        self.rid.clone()
    }

    fn is_https(&self) -> bool {
        self.https
    }

    fn is_retry(&self) -> bool {
        self.retry
    }

    fn peer_address(&self) -> Option<IpAddr> {
        self.peer
    }

    fn request_data(&self) -> RequestData {
        self.request.clone()
    }

    fn auto_cross_origin(&self) -> bool {
        self.auto_cross_origin
    }

    fn jsonp_callback(&self) -> Option<String> {
        self.jsonp_callback.clone()
    }

    fn server_state(&self) -> ServerState {
        self.server_state.clone()
    }

    fn read_request_body(&mut self) -> Bytes {
        let mut input = self.input.borrow_mut();
        let mut out = BytesMut::new();
        while let Some(chunk) = input.chunks.pop_front() {
            out.extend_from_slice(&chunk);
        }
        out.freeze()
    }

    fn is_request_finished(&self) -> bool {
        let input = self.input.borrow();
        input.finished && input.chunks.is_empty()
    }

    fn start_response(&mut self, code: u16, reason: &str, headers: &HeaderMap) {
        let mut record = self.record.borrow_mut();
        assert!(record.response.is_none(), "response started twice");
        record.response = Some((code, reason.to_string(), headers.clone()));
    }

    fn write_response_body(&mut self, body: Bytes) {
        let mut record = self.record.borrow_mut();
        record.writes.push(body.len());
        record.body.extend_from_slice(&body);
    }

    fn end_response_body(&mut self) {
        self.record.borrow_mut().body_ended = true;
    }

    fn respond_error(&mut self, code: u16, reason: &str, message: &str) {
        self.record.borrow_mut().error =
            Some((code, reason.to_string(), message.to_string()));
    }

    fn respond_cannot_accept(&mut self) {
        self.record.borrow_mut().cannot_accept = true;
    }

    fn pause(&mut self) {
        self.record.borrow_mut().pause_requested = true;
    }
}
