//! Messaging channel types and the dispatcher/approval seams.
//!
//! Actual transport delivery (SMTP, SMS gateways, push providers) lives
//! outside this core; action nodes talk to it through `MessageDispatcher`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Output channels an action node can address.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Push,
    InApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
            Channel::InApp => "in_app",
        }
    }
}

/// Acknowledgement from the messaging collaborator for a dispatched send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub provider_message_id: String,
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
#[error("dispatch failed: {message}")]
pub struct DispatchError {
    pub message: String,
}

impl DispatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// External messaging collaborator invoked from action nodes.
pub trait MessageDispatcher: Send + Sync {
    fn send(
        &self,
        channel: Channel,
        customer_id: &Uuid,
        content: &str,
    ) -> Result<DispatchReceipt, DispatchError>;
}

/// Dispatcher that acknowledges every send without delivering anything.
pub struct NoOpDispatcher;

impl MessageDispatcher for NoOpDispatcher {
    fn send(
        &self,
        _channel: Channel,
        _customer_id: &Uuid,
        _content: &str,
    ) -> Result<DispatchReceipt, DispatchError> {
        Ok(DispatchReceipt {
            provider_message_id: format!("noop-{}", Uuid::new_v4()),
            dispatched_at: Utc::now(),
        })
    }
}

/// A message recorded by `CaptureDispatcher`.
#[derive(Debug, Clone)]
pub struct DispatchedMessage {
    pub channel: Channel,
    pub customer_id: Uuid,
    pub content: String,
    pub dispatched_at: DateTime<Utc>,
}

/// In-memory dispatcher that captures sends for testing.
#[derive(Default)]
pub struct CaptureDispatcher {
    sent: Mutex<Vec<DispatchedMessage>>,
}

impl CaptureDispatcher {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<DispatchedMessage> {
        self.sent.lock().expect("dispatcher mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().expect("dispatcher mutex poisoned").len()
    }
}

impl MessageDispatcher for CaptureDispatcher {
    fn send(
        &self,
        channel: Channel,
        customer_id: &Uuid,
        content: &str,
    ) -> Result<DispatchReceipt, DispatchError> {
        let receipt = DispatchReceipt {
            provider_message_id: format!("capture-{}", Uuid::new_v4()),
            dispatched_at: Utc::now(),
        };
        self.sent
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(DispatchedMessage {
                channel,
                customer_id: *customer_id,
                content: content.to_string(),
                dispatched_at: receipt.dispatched_at,
            });
        Ok(receipt)
    }
}

/// Dispatcher that fails every send, for exercising failure paths.
pub struct FailingDispatcher {
    pub reason: String,
}

impl FailingDispatcher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl MessageDispatcher for FailingDispatcher {
    fn send(
        &self,
        _channel: Channel,
        _customer_id: &Uuid,
        _content: &str,
    ) -> Result<DispatchReceipt, DispatchError> {
        Err(DispatchError::new(self.reason.clone()))
    }
}

/// What an approver sees before deciding on a gated action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalPreview {
    pub channel: Channel,
    pub customer_id: Uuid,
    pub content: String,
}

/// External approval authority. Notification only — the decision comes
/// back asynchronously through the engine's approve/reject operations.
pub trait ApprovalAuthority: Send + Sync {
    fn request_approval(&self, execution_id: Uuid, preview: ApprovalPreview);
}

pub struct NoOpApprovals;

impl ApprovalAuthority for NoOpApprovals {
    fn request_approval(&self, _execution_id: Uuid, _preview: ApprovalPreview) {}
}

/// In-memory approval queue for tests and the demo worker.
#[derive(Default)]
pub struct CaptureApprovals {
    requests: Mutex<Vec<(Uuid, ApprovalPreview)>>,
}

impl CaptureApprovals {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn pending(&self) -> Vec<(Uuid, ApprovalPreview)> {
        self.requests
            .lock()
            .expect("approvals mutex poisoned")
            .clone()
    }

    /// Takes all pending requests, leaving the queue empty.
    pub fn drain(&self) -> Vec<(Uuid, ApprovalPreview)> {
        self.requests
            .lock()
            .expect("approvals mutex poisoned")
            .drain(..)
            .collect()
    }
}

impl ApprovalAuthority for CaptureApprovals {
    fn request_approval(&self, execution_id: Uuid, preview: ApprovalPreview) {
        self.requests
            .lock()
            .expect("approvals mutex poisoned")
            .push((execution_id, preview));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_dispatcher() {
        let dispatcher = CaptureDispatcher::new();
        let customer_id = Uuid::new_v4();

        let receipt = dispatcher
            .send(Channel::Email, &customer_id, "hello")
            .unwrap();
        assert!(receipt.provider_message_id.starts_with("capture-"));

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, Channel::Email);
        assert_eq!(sent[0].content, "hello");
    }

    #[test]
    fn test_failing_dispatcher() {
        let dispatcher = FailingDispatcher::new("provider down");
        let err = dispatcher
            .send(Channel::Sms, &Uuid::new_v4(), "hi")
            .unwrap_err();
        assert!(err.to_string().contains("provider down"));
    }

    #[test]
    fn test_capture_approvals_drain() {
        let approvals = CaptureApprovals::new();
        let execution_id = Uuid::new_v4();
        approvals.request_approval(
            execution_id,
            ApprovalPreview {
                channel: Channel::Email,
                customer_id: Uuid::new_v4(),
                content: "preview".into(),
            },
        );

        assert_eq!(approvals.pending().len(), 1);
        let drained = approvals.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, execution_id);
        assert!(approvals.pending().is_empty());
    }
}
