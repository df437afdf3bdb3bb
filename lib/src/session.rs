//! The proxy session: one logical upstream request shared by any number of
//! downstream clients.
//!
//! The session is driven entirely by its embedding reactor. Collaborator
//! signals arrive as calls to the `upstream_*`, `request_*` and `client_*`
//! handler methods; outward signals are queued and drained through
//! [`ProxySession::poll_event`] after each handler returns, so no callback
//! can ever observe a session that freed itself mid-emission.

use std::collections::VecDeque;
use std::rc::Rc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use log::{debug, warn};
use rusty_ulid::Ulid;

use crate::accept::{AcceptData, AcceptRequest, InspectData};
use crate::buffer::BufferList;
use crate::client::ClientSession;
use crate::config::SessionConfig;
use crate::editor::{self, RequestRewriter};
use crate::fanout::{ClientFanout, ClientState, ClientToken};
use crate::router::{RouteMap, Target};
use crate::upstream::{ErrorCondition, UpstreamRequest, UpstreamTransport};
use crate::{count, incr};
use crate::{RequestData, ResponseData};

/// Caps on the bodies retained for a possible handoff. Exceeding either
/// flips the session out of buffered mode for that side.
pub const MAX_ACCEPT_REQUEST_BODY: usize = 100_000;
pub const MAX_ACCEPT_RESPONSE_BODY: usize = 100_000;

pub const MAX_INITIAL_BUFFER: usize = 100_000;
pub const MAX_STREAM_BUFFER: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Stopped,
    Requesting,
    Accepting,
    Responding,
}

/// Outward signals, drained with [`ProxySession::poll_event`].
#[derive(Debug)]
pub enum SessionEvent {
    /// Late client attachment is no longer possible; emitted at most once.
    AddNotAllowed,
    /// The given client finished and its session was released.
    ClientFinished(ClientToken),
    /// Every client finished; the session can be dropped.
    FinishedByPassthrough,
    /// Every client paused; the frozen state is handed off.
    FinishedForAccept(AcceptData),
}

pub struct ProxySession {
    id: Ulid,
    state: State,
    transport: Rc<dyn UpstreamTransport>,
    routes: Rc<dyn RouteMap>,
    config: SessionConfig,
    inspect_data: Option<InspectData>,

    is_https: bool,
    channel_prefix: String,
    targets: VecDeque<Target>,
    upstream: Option<Box<dyn UpstreamRequest>>,
    add_allowed: bool,
    pass_to_upstream: bool,
    buffering: bool,

    fanout: ClientFanout,
    /// The client whose raw request feeds the upstream body. Only the first
    /// non-retry client ever does.
    primary: Option<ClientToken>,

    request: Option<RequestData>,
    response: ResponseData,
    request_body: BufferList,
    response_body: BufferList,
    initial_request_body: Bytes,
    request_bytes_to_write: usize,
    total: usize,

    events: VecDeque<SessionEvent>,
}

impl ProxySession {
    pub fn new(
        transport: Rc<dyn UpstreamTransport>,
        routes: Rc<dyn RouteMap>,
        config: SessionConfig,
    ) -> Self {
        Self {
            id: Ulid::generate(),
            state: State::Stopped,
            transport,
            routes,
            config,
            inspect_data: None,
            is_https: false,
            channel_prefix: String::new(),
            targets: VecDeque::new(),
            upstream: None,
            add_allowed: true,
            pass_to_upstream: false,
            buffering: false,
            fanout: ClientFanout::default(),
            primary: None,
            request: None,
            response: ResponseData::default(),
            request_body: BufferList::new(),
            response_body: BufferList::new(),
            initial_request_body: Bytes::new(),
            request_bytes_to_write: 0,
            total: 0,
            events: VecDeque::new(),
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn set_inspect_data(&mut self, data: InspectData) {
        self.inspect_data = Some(data);
    }

    /// Next queued outward signal, if any. Drain after every handler call.
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    /// Attaches a client. The first attachment resolves the route and
    /// launches the upstream request; later ones join the stream in
    /// progress.
    ///
    /// Attaching after [`SessionEvent::AddNotAllowed`] was emitted is a
    /// caller contract violation.
    pub fn add(&mut self, client: Box<dyn ClientSession>) -> ClientToken {
        assert!(self.add_allowed, "client added after addNotAllowed");

        let token = self.fanout.insert(client);

        match self.state {
            State::Stopped => self.start(token),
            State::Requesting | State::Accepting => {
                // nothing to do, just wait around until a response comes
            }
            State::Responding => {
                // get the client caught up with where we're at
                if let Some(entry) = self.fanout.get_mut(token) {
                    entry.state = ClientState::Responding;
                    entry
                        .client
                        .start_response(self.response.code, &self.response.reason, &self.response.headers);

                    if !self.response_body.is_empty() {
                        let body = self.response_body.to_bytes();
                        entry.add_pending(body.len());
                        entry.client.write_response_body(body);
                    }
                }
            }
        }

        token
    }

    fn start(&mut self, token: ClientToken) {
        let (mut request, is_https, peer, is_retry) = match self.fanout.get(token) {
            Some(entry) => (
                entry.client.request_data(),
                entry.client.is_https(),
                entry.client.peer_address(),
                entry.client.is_retry(),
            ),
            None => return,
        };

        self.is_https = is_https;

        let host = request.uri.host_str().unwrap_or("").to_string();

        self.request_body.append(std::mem::take(&mut request.body));

        // these headers only apply to the incoming hop
        editor::strip_request_headers(&mut request.headers);

        let entry = match self.routes.entry(&host, request.uri.path(), self.is_https) {
            Some(entry) => entry,
            None => {
                warn!("session {}: {} has 0 routes", self.id, host);
                incr!("proxy.502.errors");
                self.reject_all(502, "Bad Gateway", &format!("No route for host: {host}"));
                return;
            }
        };

        let (sig_iss, sig_key) = if !entry.sig_iss.is_empty() && !entry.sig_key.is_empty() {
            (entry.sig_iss, entry.sig_key)
        } else {
            (
                self.config.default_sig_iss.clone(),
                self.config.default_sig_key.clone(),
            )
        };
        let sig = if !sig_iss.is_empty() && !sig_key.is_empty() {
            Some((sig_iss.as_str(), sig_key.as_bytes()))
        } else {
            None
        };

        self.channel_prefix = entry.prefix;
        self.targets = entry.targets;

        debug!(
            "session {}: {} has {} routes",
            self.id,
            host,
            self.targets.len()
        );

        let rewriter = RequestRewriter {
            sig,
            upstream_key: self.config.default_upstream_key.as_bytes(),
            use_x_forwarded_protocol: self.config.use_x_forwarded_protocol,
            xff_rule: &self.config.xff_rule,
            xff_trusted_rule: &self.config.xff_trusted_rule,
        };
        self.pass_to_upstream = rewriter.apply(&mut request.headers, self.is_https, peer);

        self.state = State::Requesting;
        self.buffering = true;
        incr!("proxy.requests");

        if !is_retry {
            self.primary = Some(token);

            // capture whatever request body the client has read so far
            if let Some(entry) = self.fanout.get_mut(token) {
                self.request_body.append(entry.client.read_request_body());
            }
        }

        self.initial_request_body = self.request_body.to_bytes();

        if self.request_body.len() > MAX_ACCEPT_REQUEST_BODY {
            self.request_body.clear();
            self.buffering = false;
        }

        self.request = Some(request);

        self.try_next_target();
    }

    fn try_next_target(&mut self) {
        let target = match self.targets.pop_front() {
            Some(target) => target,
            None => {
                incr!("proxy.502.errors");
                self.reject_all(502, "Bad Gateway", "Error while proxying to origin.");
                return;
            }
        };

        let request = match &self.request {
            Some(request) => request,
            None => return,
        };

        let mut uri = request.uri.clone();
        let scheme = if target.ssl { "https" } else { "http" };
        let _ = uri.set_scheme(scheme);

        debug!(
            "session {}: forwarding to {}:{}",
            self.id, target.host, target.port
        );

        let mut upstream = self.transport.create_request();

        if target.trusted {
            upstream.set_ignore_policies(true);
        }
        if target.insecure {
            upstream.set_ignore_tls_errors(true);
        }

        upstream.set_connect_host(&target.host);
        upstream.set_connect_port(target.port);

        upstream.start(&request.method, &uri, &request.headers);

        if !self.initial_request_body.is_empty() {
            self.request_bytes_to_write += self.initial_request_body.len();
            upstream.write_body(self.initial_request_body.clone());
        }

        let input_finished = match self.primary {
            Some(token) => self
                .fanout
                .get(token)
                .map(|e| e.client.is_request_finished())
                .unwrap_or(true),
            None => true,
        };
        if input_finished {
            upstream.end_body();
        }

        self.upstream = Some(upstream);
    }

    fn try_request_read(&mut self) {
        let token = match self.primary {
            Some(token) => token,
            None => return,
        };
        let buf = match self.fanout.get_mut(token) {
            Some(entry) => entry.client.read_request_body(),
            None => return,
        };
        if buf.is_empty() {
            return;
        }

        debug!("session {}: input chunk: {}", self.id, buf.len());

        if self.buffering {
            if self.request_body.len() + buf.len() > MAX_ACCEPT_REQUEST_BODY {
                self.request_body.clear();
                self.buffering = false;
            } else {
                self.request_body.append(buf.clone());
            }
        }

        self.request_bytes_to_write += buf.len();
        if let Some(upstream) = &mut self.upstream {
            upstream.write_body(buf);
        }
    }

    /// The handoff sink refused the frozen state; tell every waiting client
    /// the request cannot be accepted.
    pub fn cannot_accept(&mut self) {
        for entry in self.fanout.iter_mut() {
            if entry.state != ClientState::Errored {
                debug_assert!(entry.state == ClientState::WaitingForResponse);

                entry.state = ClientState::Responded;
                entry.terminate();
                entry.client.respond_cannot_accept();
            }
        }
    }

    fn reject_all(&mut self, code: u16, reason: &str, message: &str) {
        for entry in self.fanout.iter_mut() {
            if entry.state != ClientState::Errored {
                debug_assert!(entry.state == ClientState::WaitingForResponse);

                entry.state = ClientState::Responded;
                entry.terminate();
                entry.client.respond_error(code, reason, message);
            }
        }
    }

    /// Ends every responding client's body without a status change. Only
    /// meaningful once a response is streaming; the upstream is gone.
    pub fn destroy_all(&mut self) {
        debug_assert!(self.state == State::Responding);

        for entry in self.fanout.iter_mut() {
            debug_assert!(entry.state != ClientState::WaitingForResponse);

            if entry.state == ClientState::Responding {
                entry.state = ClientState::Responded;
                entry.terminate();
                entry.client.end_response_body();
            }
        }
    }

    fn try_response_read(&mut self) {
        // when not buffering, sync to the slowest receiver before reading
        // any further
        if !self.buffering && self.fanout.pending_writes() {
            return;
        }

        let buf = match &mut self.upstream {
            Some(upstream) => upstream.read_body(MAX_STREAM_BUFFER),
            None => return,
        };

        if !buf.is_empty() {
            self.total += buf.len();
            count!("proxy.bytes_in", buf.len());
            debug!("session {}: recv={}, total={}", self.id, buf.len(), self.total);

            match self.state {
                State::Accepting => {
                    if self.response_body.len() + buf.len() > MAX_ACCEPT_RESPONSE_BODY {
                        incr!("proxy.502.errors");
                        self.reject_all(502, "Bad Gateway", "GRIP instruct response too large.");
                        return;
                    }

                    self.response_body.append(buf);
                }
                State::Responding => {
                    let was_allowed = self.add_allowed;

                    if self.buffering {
                        if self.response_body.len() + buf.len() > MAX_INITIAL_BUFFER {
                            self.response_body.clear();
                            self.buffering = false;
                            self.add_allowed = false;
                        } else {
                            self.response_body.append(buf.clone());
                        }
                    }

                    debug!("session {}: writing {} to clients", self.id, buf.len());
                    count!("proxy.bytes_out", buf.len());

                    self.fanout.write_chunk(&buf);

                    if was_allowed && !self.add_allowed {
                        self.events.push_back(SessionEvent::AddNotAllowed);
                    }
                }
                State::Stopped | State::Requesting => {}
            }
        }

        self.check_incoming_response_finished();
    }

    fn check_incoming_response_finished(&mut self) {
        let finished = self
            .upstream
            .as_ref()
            .map(|upstream| upstream.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        debug!("session {}: response from target finished", self.id);

        if !self.buffering && self.fanout.pending_writes() {
            debug!("session {}: still stuff left to write, though. we'll wait.", self.id);
            return;
        }

        self.upstream = None;

        if self.state == State::Accepting {
            for entry in self.fanout.iter_mut() {
                entry.state = ClientState::Pausing;
                entry.client.pause();
            }
        } else {
            for entry in self.fanout.iter_mut() {
                debug_assert!(entry.state != ClientState::WaitingForResponse);

                if entry.state == ClientState::Responding {
                    entry.state = ClientState::Responded;
                    entry.client.end_response_body();
                }
            }

            // once the entire response has been received, cut off any new adds
            if self.add_allowed {
                self.add_allowed = false;
                self.events.push_back(SessionEvent::AddNotAllowed);
            }
        }
    }

    /// The primary client read more request-body bytes.
    pub fn request_ready_read(&mut self) {
        self.try_request_read();

        let finished = match self.primary {
            Some(token) => self
                .fanout
                .get(token)
                .map(|e| e.client.is_request_finished())
                .unwrap_or(false),
            None => false,
        };
        if finished {
            if let Some(upstream) = &mut self.upstream {
                upstream.end_body();
            }
        }
    }

    /// The primary client's request input failed.
    pub fn request_error(&mut self) {
        warn!("session {}: error reading request", self.id);
        incr!("proxy.500.errors");
        self.reject_all(500, "Internal Server Error", "Primary shared request failed.");
    }

    /// The upstream has response data: headers on the first call, body
    /// bytes afterwards.
    pub fn upstream_ready_read(&mut self) {
        debug!("session {}: data from target", self.id);

        if self.state != State::Requesting {
            debug_assert!(self.state == State::Accepting || self.state == State::Responding);
            self.try_response_read();
            return;
        }

        {
            let upstream = match &mut self.upstream {
                Some(upstream) => upstream,
                None => return,
            };

            self.response.code = upstream.response_code();
            self.response.reason = upstream.response_reason();
            self.response.headers = upstream.response_headers();
            self.response_body.append(upstream.read_body(MAX_INITIAL_BUFFER));
        }

        self.total += self.response_body.len();
        count!("proxy.bytes_in", self.response_body.len());
        debug!("session {}: recv total: {}", self.id, self.total);

        let content_type = self
            .response
            .headers
            .get(CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();
        let content_type = match content_type.find(';') {
            Some(at) => &content_type[..at],
            None => content_type.as_str(),
        };

        if !self.pass_to_upstream && self.config.accept_types.contains(content_type) {
            if !self.buffering {
                incr!("proxy.502.errors");
                self.reject_all(502, "Bad Gateway", "Request too large to accept GRIP instruct.");
                return;
            }

            self.state = State::Accepting;
        } else {
            self.state = State::Responding;

            // these headers only apply to the outgoing hop
            editor::strip_response_headers(&mut self.response.headers);

            let body = self.response_body.to_bytes();
            count!("proxy.bytes_out", body.len());

            for entry in self.fanout.iter_mut() {
                entry.state = ClientState::Responding;
                entry
                    .client
                    .start_response(self.response.code, &self.response.reason, &self.response.headers);

                if !body.is_empty() {
                    entry.add_pending(body.len());
                    entry.client.write_response_body(body.clone());
                }
            }
        }

        self.check_incoming_response_finished();
    }

    /// The upstream acknowledged `count` request-body bytes.
    pub fn upstream_bytes_written(&mut self, count: usize) {
        assert!(
            count <= self.request_bytes_to_write,
            "upstream acknowledged more bytes than were written"
        );
        self.request_bytes_to_write -= count;

        if self.request_bytes_to_write == 0 {
            self.try_request_read();
        }
    }

    /// The upstream request failed.
    pub fn upstream_error(&mut self) {
        let condition = self
            .upstream
            .as_ref()
            .map(|upstream| upstream.error_condition())
            .unwrap_or(ErrorCondition::Generic);

        debug!(
            "session {}: target error state={:?}, condition={:?}",
            self.id, self.state, condition
        );

        match self.state {
            State::Requesting | State::Accepting => {
                let mut try_again = false;

                match condition {
                    ErrorCondition::LengthRequired => {
                        incr!("proxy.411.errors");
                        self.reject_all(411, "Length Required", "Must provide Content-Length header.");
                    }
                    ErrorCondition::Connect
                    | ErrorCondition::ConnectTimeout
                    | ErrorCondition::Tls => {
                        // it should not be possible to get one of these
                        // errors while accepting
                        assert!(
                            self.state == State::Requesting,
                            "connection error while accepting"
                        );
                        try_again = true;
                    }
                    _ => {
                        incr!("proxy.502.errors");
                        self.reject_all(502, "Bad Gateway", "Error while proxying to origin.");
                    }
                }

                if try_again {
                    // release the failed handle before creating the next one
                    self.upstream = None;
                    self.request_bytes_to_write = 0;
                    self.try_next_target();
                }
            }
            State::Responding => {
                // already responding, so we can't reply with an error
                self.destroy_all();
            }
            State::Stopped => {}
        }
    }

    /// A client acknowledged `count` response-body bytes.
    pub fn client_bytes_written(&mut self, token: ClientToken, count: usize) {
        debug!(
            "session {}: response bytes written token={}: {}",
            self.id, token.0, count
        );

        if let Some(entry) = self.fanout.get_mut(token) {
            entry.ack_written(count);
        }

        // everyone caught up? try to read some more then
        if !self.buffering && self.upstream.is_some() && !self.fanout.pending_writes() {
            self.try_response_read();
        }
    }

    /// A client finished; its session is released here.
    pub fn client_finished(&mut self, token: ClientToken) {
        debug!("session {}: response finished token={}", self.id, token.0);

        if self.fanout.remove(token).is_none() {
            return;
        }
        if self.primary == Some(token) {
            self.primary = None;
        }

        self.events.push_back(SessionEvent::ClientFinished(token));

        if self.fanout.is_empty() {
            debug!("session {}: finished by passthrough", self.id);
            self.events.push_back(SessionEvent::FinishedByPassthrough);
        }
    }

    /// A client failed to deliver the response. The entry stays until its
    /// `finished` arrives; only accounting stops.
    pub fn client_error_responding(&mut self, token: ClientToken) {
        debug!("session {}: response error token={}", self.id, token.0);

        if let Some(entry) = self.fanout.get_mut(token) {
            debug_assert!(entry.state != ClientState::Errored);

            entry.state = ClientState::Errored;
            entry.terminate();
        }
    }

    /// A client reached the paused state during handoff. Once every client
    /// is paused the frozen state is emitted and the fanout dissolved.
    pub fn client_paused(&mut self, token: ClientToken) {
        debug!("session {}: response paused token={}", self.id, token.0);

        match self.fanout.get_mut(token) {
            Some(entry) => {
                debug_assert!(entry.state == ClientState::Pausing);
                entry.state = ClientState::Paused;
            }
            None => return,
        }

        if !self.fanout.all_paused() {
            return;
        }

        let mut request_data = match self.request.take() {
            Some(request) => request,
            None => return,
        };
        request_data.body = self.request_body.take();

        let mut response_data = std::mem::take(&mut self.response);
        response_data.body = self.response_body.take();

        let requests = self
            .fanout
            .iter()
            .map(|entry| AcceptRequest {
                rid: entry.client.rid(),
                https: entry.client.is_https(),
                peer_address: entry.client.peer_address(),
                auto_cross_origin: entry.client.auto_cross_origin(),
                jsonp_callback: entry.client.jsonp_callback(),
                server_state: entry.client.server_state(),
            })
            .collect();

        let adata = AcceptData {
            requests,
            request_data,
            have_response: true,
            response_data,
            channel_prefix: self.channel_prefix.clone(),
            inspect_data: self.inspect_data.take(),
        };

        debug!("session {}: finished for accept", self.id);

        self.fanout.clear();
        self.events.push_back(SessionEvent::FinishedForAccept(adata));
    }
}
