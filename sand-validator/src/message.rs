//! Message validators: the XML rule of a check.

use sand_message::{Limits, MessageCategory, MessageError, SandEnvelope, validate_envelope};

/// Typed result of validating a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlVerdict {
    /// The body is a valid message. Validators that do not produce an
    /// envelope summary report `Valid(None)`.
    Valid(Option<SandEnvelope>),
    /// The body is not a valid message.
    Invalid(String),
    /// The validator could not reach a verdict (resource limit, broken schema).
    ValidatorError(String),
}

/// Decides whether a response body is a valid SAND message.
pub trait MessageValidator: Send + Sync {
    fn validate(&self, body: &[u8]) -> XmlVerdict;
}

/// The built-in validator: SAND envelope rules from `sand-message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeValidator {
    limits: Limits,
}

impl EnvelopeValidator {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }
}

impl MessageValidator for EnvelopeValidator {
    fn validate(&self, body: &[u8]) -> XmlVerdict {
        match validate_envelope(body, self.limits) {
            Ok(envelope) => XmlVerdict::Valid(Some(envelope)),
            Err(e @ MessageError::LimitExceeded { .. }) => XmlVerdict::ValidatorError(e.to_string()),
            Err(e) => XmlVerdict::Invalid(e.to_string()),
        }
    }
}

/// One-line summary of an envelope for the `[TEST] message` line.
#[must_use]
pub fn describe(envelope: &SandEnvelope) -> String {
    format!(
        "senderId={}|status={}|per={}",
        envelope.sender_id,
        envelope.count(MessageCategory::Status),
        envelope.count(MessageCategory::Per)
    )
}
