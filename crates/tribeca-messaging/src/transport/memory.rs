/*
[INPUT]:  Frames sent by publishers and the controller
[OUTPUT]: Recorded frame log, optional send failures
[POS]:    Transport layer - loopback transport for tests and embedding
[UPDATE]: When the Transport trait changes
*/

use std::cell::{Cell, RefCell};

use serde_json::Value;

use super::{Frame, Transport};
use crate::error::{MessagingError, Result};

/// Records outbound frames instead of sending them anywhere.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: RefCell<Vec<Frame>>,
    fail_sends: Cell<bool>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames recorded so far, oldest first.
    pub fn sent(&self) -> Vec<Frame> {
        self.sent.borrow().clone()
    }

    /// Recorded `Message` frames for `topic`, payloads only.
    pub fn sent_on(&self, topic: &str) -> Vec<Value> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|frame| match frame {
                Frame::Message { topic: t, data } if t == topic => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn take_sent(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    /// Make subsequent `send` calls fail as if the worker had gone away.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.set(fail);
    }
}

impl Transport for MemoryTransport {
    fn send(&self, topic: &'static str, payload: Value) -> Result<()> {
        if self.fail_sends.get() {
            return Err(MessagingError::TransportClosed);
        }
        self.sent.borrow_mut().push(Frame::Message {
            topic: topic.to_string(),
            data: payload,
        });
        Ok(())
    }

    fn request_snapshot(&self, topic: &'static str) -> Result<()> {
        self.sent.borrow_mut().push(Frame::SnapshotRequest {
            topic: topic.to_string(),
        });
        Ok(())
    }
}
