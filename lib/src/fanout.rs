//! Bookkeeping for the set of downstream clients sharing one upstream
//! response: per-client delivery state and outstanding-byte counters, which
//! together drive the sync-to-slowest back-pressure probe.

use bytes::Bytes;

use crate::client::ClientSession;

/// Session-scoped handle for one attached client, used by the embedding
/// reactor to route that client's signals back to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientToken(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    WaitingForResponse,
    Responding,
    Responded,
    Errored,
    Pausing,
    Paused,
}

pub struct ClientEntry {
    pub token: ClientToken,
    pub client: Box<dyn ClientSession>,
    pub state: ClientState,
    /// Bytes handed to the client but not yet acknowledged. `None` once the
    /// entry reached a terminal state and accounting stops.
    bytes_to_write: Option<usize>,
}

impl ClientEntry {
    pub fn add_pending(&mut self, n: usize) {
        if let Some(pending) = &mut self.bytes_to_write {
            *pending += n;
        }
    }

    pub fn ack_written(&mut self, n: usize) {
        if let Some(pending) = &mut self.bytes_to_write {
            assert!(
                n <= *pending,
                "client acknowledged more bytes than were written"
            );
            *pending -= n;
        }
    }

    /// Stops accounting for this entry; further writes and acks are ignored.
    pub fn terminate(&mut self) {
        self.bytes_to_write = None;
    }

    pub fn has_pending(&self) -> bool {
        matches!(self.bytes_to_write, Some(n) if n > 0)
    }
}

#[derive(Default)]
pub struct ClientFanout {
    entries: Vec<ClientEntry>,
    next_token: usize,
}

impl ClientFanout {
    pub fn insert(&mut self, client: Box<dyn ClientSession>) -> ClientToken {
        let token = ClientToken(self.next_token);
        self.next_token += 1;
        self.entries.push(ClientEntry {
            token,
            client,
            state: ClientState::WaitingForResponse,
            bytes_to_write: Some(0),
        });
        token
    }

    pub fn get(&self, token: ClientToken) -> Option<&ClientEntry> {
        self.entries.iter().find(|e| e.token == token)
    }

    pub fn get_mut(&mut self, token: ClientToken) -> Option<&mut ClientEntry> {
        self.entries.iter_mut().find(|e| e.token == token)
    }

    pub fn remove(&mut self, token: ClientToken) -> Option<ClientEntry> {
        let at = self.entries.iter().position(|e| e.token == token)?;
        Some(self.entries.remove(at))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClientEntry> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// True while any live entry still has unacknowledged bytes. Reading
    /// from the upstream is deferred until this goes false.
    pub fn pending_writes(&self) -> bool {
        self.entries.iter().any(|e| e.has_pending())
    }

    pub fn all_paused(&self) -> bool {
        self.entries.iter().all(|e| e.state == ClientState::Paused)
    }

    /// Forwards a response chunk to every responding client, accounting the
    /// chunk against each.
    pub fn write_chunk(&mut self, body: &Bytes) {
        for entry in &mut self.entries {
            debug_assert!(entry.state != ClientState::WaitingForResponse);
            if entry.state == ClientState::Responding {
                entry.add_pending(body.len());
                entry.client.write_response_body(body.clone());
            }
        }
    }
}
