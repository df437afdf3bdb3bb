//! A scripted upstream transport. Each `create_request` hands back a fresh
//! handle whose shared [`UpstreamRecord`] the driver both inspects (what
//! the session sent) and scripts (what the origin answers).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Method};
use pushgate_lib::upstream::{ErrorCondition, UpstreamRequest, UpstreamTransport};
use url::Url;

#[derive(Debug, Default)]
pub struct UpstreamRecord {
    // what the session did with the handle
    pub connect_host: Option<String>,
    pub connect_port: Option<u16>,
    pub ignore_policies: bool,
    pub ignore_tls_errors: bool,
    pub started: Option<(Method, Url, HeaderMap)>,
    pub body: BytesMut,
    pub body_ended: bool,
    /// Number of `read_body` calls, for back-pressure assertions.
    pub reads: usize,

    // scripted origin response
    pub response_code: u16,
    pub response_reason: String,
    pub response_headers: HeaderMap,
    pub pending: VecDeque<Bytes>,
    pub finished: bool,
    pub error: Option<ErrorCondition>,
}

impl UpstreamRecord {
    pub fn set_response(&mut self, code: u16, reason: &str, headers: HeaderMap) {
        self.response_code = code;
        self.response_reason = reason.to_string();
        self.response_headers = headers;
    }

    pub fn push_body(&mut self, body: &[u8]) {
        self.pending.push_back(Bytes::copy_from_slice(body));
    }
}

pub struct MockUpstream {
    state: Rc<RefCell<UpstreamRecord>>,
}

impl UpstreamRequest for MockUpstream {
    fn set_connect_host(&mut self, host: &str) {
        self.state.borrow_mut().connect_host = Some(host.to_string());
    }

    fn set_connect_port(&mut self, port: u16) {
        self.state.borrow_mut().connect_port = Some(port);
    }

    fn set_ignore_policies(&mut self, on: bool) {
        self.state.borrow_mut().ignore_policies = on;
    }

    fn set_ignore_tls_errors(&mut self, on: bool) {
        self.state.borrow_mut().ignore_tls_errors = on;
    }

    fn start(&mut self, method: &Method, uri: &Url, headers: &HeaderMap) {
        let mut state = self.state.borrow_mut();
        assert!(state.started.is_none(), "request started twice");
        state.started = Some((method.clone(), uri.clone(), headers.clone()));
    }

    fn write_body(&mut self, body: Bytes) {
        self.state.borrow_mut().body.extend_from_slice(&body);
    }

    fn end_body(&mut self) {
        self.state.borrow_mut().body_ended = true;
    }

    fn read_body(&mut self, max: usize) -> Bytes {
        let mut state = self.state.borrow_mut();
        state.reads += 1;

        let mut out = BytesMut::new();
        while out.len() < max {
            match state.pending.pop_front() {
                Some(mut chunk) => {
                    let room = max - out.len();
                    if chunk.len() > room {
                        let rest = chunk.split_off(room);
                        state.pending.push_front(rest);
                    }
                    out.extend_from_slice(&chunk);
                }
                None => break,
            }
        }
        out.freeze()
    }

    fn is_finished(&self) -> bool {
        let state = self.state.borrow();
        state.finished && state.pending.is_empty()
    }

    fn response_code(&self) -> u16 {
        self.state.borrow().response_code
    }

    fn response_reason(&self) -> String {
        self.state.borrow().response_reason.clone()
    }

    fn response_headers(&self) -> HeaderMap {
        self.state.borrow().response_headers.clone()
    }

    fn error_condition(&self) -> ErrorCondition {
        self.state.borrow().error.unwrap_or(ErrorCondition::Generic)
    }
}

/// Records every handle it creates so drivers can script the Nth attempt.
#[derive(Default)]
pub struct MockTransport {
    pub created: RefCell<Vec<Rc<RefCell<UpstreamRecord>>>>,
}

impl MockTransport {
    pub fn attempt(&self, at: usize) -> Rc<RefCell<UpstreamRecord>> {
        self.created.borrow()[at].clone()
    }

    pub fn attempts(&self) -> usize {
        self.created.borrow().len()
    }
}

impl UpstreamTransport for MockTransport {
    fn create_request(&self) -> Box<dyn UpstreamRequest> {
        let state = Rc::new(RefCell::new(UpstreamRecord::default()));
        self.created.borrow_mut().push(state.clone());
        Box::new(MockUpstream { state })
    }
}
