//! Recording transport used by the signaling tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::delivery::{DeliveryError, Transport};
use super::messages::ServerMessage;

#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Rc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    sent: RefCell<Vec<String>>,
    closed_with: RefCell<Option<String>>,
    not_ready: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.inner.not_ready.set(!ready);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.set(fail);
    }

    /// Every frame written so far, decoded back into messages.
    pub fn sent(&self) -> Vec<ServerMessage> {
        self.inner
            .sent
            .borrow()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub fn clear(&self) {
        self.inner.sent.borrow_mut().clear();
    }

    pub fn closed_with(&self) -> Option<String> {
        self.inner.closed_with.borrow().clone()
    }
}

impl Transport for MockTransport {
    fn is_ready(&self) -> bool {
        !self.inner.not_ready.get() && self.inner.closed_with.borrow().is_none()
    }

    fn send_text(&self, text: String) -> Result<(), DeliveryError> {
        if self.inner.fail_writes.get() {
            return Err(DeliveryError::MailboxClosed);
        }
        self.inner.sent.borrow_mut().push(text);
        Ok(())
    }

    fn close(&self, reason: &str) {
        *self.inner.closed_with.borrow_mut() = Some(reason.to_string());
    }
}
