//! Shared helpers for unit tests.

use std::cell::{Cell, RefCell};

use chess_proto::ClientMessage;

use crate::channel::Outbound;
use crate::error::{ClientError, ClientResult};

/// Records every message instead of sending it.
pub struct RecordingOutbound {
    pub sent: RefCell<Vec<ClientMessage>>,
    pub connected: Cell<bool>,
}

impl RecordingOutbound {
    pub fn connected() -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            connected: Cell::new(true),
        }
    }

    pub fn disconnected() -> Self {
        let out = Self::connected();
        out.connected.set(false);
        out
    }

    pub fn take(&self) -> Vec<ClientMessage> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.sent.borrow().is_empty()
    }
}

impl Outbound for RecordingOutbound {
    fn send(&self, message: ClientMessage) -> ClientResult<()> {
        if !self.connected.get() {
            return Err(ClientError::NotConnected);
        }
        self.sent.borrow_mut().push(message);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }
}
