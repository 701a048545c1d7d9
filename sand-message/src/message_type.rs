//! Known SAND message elements and their categories.

use std::fmt;

/// Direction/category of a SAND message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCategory {
    /// Status messages, sent by DASH clients to a DANE.
    Status,
    /// Parameters Enhancing Reception, sent by a DANE to DASH clients.
    Per,
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => write!(f, "status"),
            Self::Per => write!(f, "PER"),
        }
    }
}

/// A message element allowed directly inside a `SANDMessage` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MessageType {
    AnticipatedRequests,
    AcceptedAlternatives,
    AbsoluteDeadline,
    MaxRtt,
    NextAlternatives,
    ClientCapabilities,
    SharedResourceAllocation,
    ResourceStatus,
    DaneResourceStatus,
    SharedResourceAssignment,
    MpdValidityEndTime,
    Throughput,
    AvailabilityTimeOffset,
    QosInformation,
    DeliveredAlternative,
    DaneCapabilities,
}

impl MessageType {
    /// Every known message type, status messages first.
    pub const ALL: [Self; 16] = [
        Self::AnticipatedRequests,
        Self::AcceptedAlternatives,
        Self::AbsoluteDeadline,
        Self::MaxRtt,
        Self::NextAlternatives,
        Self::ClientCapabilities,
        Self::SharedResourceAllocation,
        Self::ResourceStatus,
        Self::DaneResourceStatus,
        Self::SharedResourceAssignment,
        Self::MpdValidityEndTime,
        Self::Throughput,
        Self::AvailabilityTimeOffset,
        Self::QosInformation,
        Self::DeliveredAlternative,
        Self::DaneCapabilities,
    ];

    /// The XML local name of the element.
    #[must_use]
    pub fn element_name(self) -> &'static str {
        match self {
            Self::AnticipatedRequests => "AnticipatedRequests",
            Self::AcceptedAlternatives => "AcceptedAlternatives",
            Self::AbsoluteDeadline => "AbsoluteDeadline",
            Self::MaxRtt => "MaxRTT",
            Self::NextAlternatives => "NextAlternatives",
            Self::ClientCapabilities => "ClientCapabilities",
            Self::SharedResourceAllocation => "SharedResourceAllocation",
            Self::ResourceStatus => "ResourceStatus",
            Self::DaneResourceStatus => "DaneResourceStatus",
            Self::SharedResourceAssignment => "SharedResourceAssignment",
            Self::MpdValidityEndTime => "MPDValidityEndTime",
            Self::Throughput => "Throughput",
            Self::AvailabilityTimeOffset => "AvailabilityTimeOffset",
            Self::QosInformation => "QoSInformation",
            Self::DeliveredAlternative => "DeliveredAlternative",
            Self::DaneCapabilities => "DaneCapabilities",
        }
    }

    /// Look up a message type by its XML local name (case-sensitive).
    #[must_use]
    pub fn from_element_name(name: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.element_name().as_bytes() == name)
    }

    #[must_use]
    pub fn category(self) -> MessageCategory {
        match self {
            Self::AnticipatedRequests
            | Self::AcceptedAlternatives
            | Self::AbsoluteDeadline
            | Self::MaxRtt
            | Self::NextAlternatives
            | Self::ClientCapabilities
            | Self::SharedResourceAllocation => MessageCategory::Status,
            Self::ResourceStatus
            | Self::DaneResourceStatus
            | Self::SharedResourceAssignment
            | Self::MpdValidityEndTime
            | Self::Throughput
            | Self::AvailabilityTimeOffset
            | Self::QosInformation
            | Self::DeliveredAlternative
            | Self::DaneCapabilities => MessageCategory::Per,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_names_resolve_back() {
        for t in MessageType::ALL {
            assert_eq!(
                MessageType::from_element_name(t.element_name().as_bytes()),
                Some(t)
            );
        }
    }

    #[test]
    fn test_element_name_is_case_sensitive() {
        assert_eq!(MessageType::from_element_name(b"MaxRTT"), Some(MessageType::MaxRtt));
        assert_eq!(MessageType::from_element_name(b"maxrtt"), None);
        assert_eq!(MessageType::from_element_name(b"SANDMessage"), None);
    }

    #[test]
    fn test_categories() {
        assert_eq!(MessageType::MaxRtt.category(), MessageCategory::Status);
        assert_eq!(MessageType::ResourceStatus.category(), MessageCategory::Per);
        assert_eq!(MessageType::DaneCapabilities.category(), MessageCategory::Per);
        assert_eq!(
            MessageType::ALL
                .iter()
                .filter(|t| t.category() == MessageCategory::Per)
                .count(),
            9
        );
    }
}
