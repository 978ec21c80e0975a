//! Mapping from raw push message types to bus events.

use workpulse_proto::push::NEW_CHAT_MESSAGE;

use super::{Domain, TargetedKind};

/// What a raw message type means to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Delivered to the subscribers of one kind; no counter moves.
    Targeted(TargetedKind),
    /// A change to one domain's data.
    Domain(Domain),
    /// Not recognized; every domain is treated as changed.
    Unrecognized,
}

/// Message types the server sends for domain changes.
const DOMAIN_MESSAGES: &[(&str, Domain)] = &[
    ("TaskAssigned", Domain::Tasks),
    ("TaskUpdated", Domain::Tasks),
    ("TaskStatusChanged", Domain::Tasks),
    ("TaskDeleted", Domain::Tasks),
    ("EmployeeAdded", Domain::Employees),
    ("EmployeeUpdated", Domain::Employees),
    ("EmployeeRemoved", Domain::Employees),
    ("LeaveRequestSubmitted", Domain::Leave),
    ("LeaveRequestUpdated", Domain::Leave),
    ("AnnouncementPosted", Domain::Announcements),
    ("GoalAssigned", Domain::Goals),
    ("GoalUpdated", Domain::Goals),
    ("PerformanceReviewSubmitted", Domain::Goals),
    ("PayrollProcessed", Domain::Payroll),
    ("PayslipGenerated", Domain::Payroll),
    ("NotificationCreated", Domain::Notifications),
];

/// Classify a raw message type.
///
/// Matching is exact and case-sensitive.
#[must_use]
pub fn classify(message_type: &str) -> Classification {
    if message_type == NEW_CHAT_MESSAGE {
        return Classification::Targeted(TargetedKind::ChatMessage);
    }
    DOMAIN_MESSAGES
        .iter()
        .find(|(name, _)| *name == message_type)
        .map_or(Classification::Unrecognized, |(_, domain)| {
            Classification::Domain(*domain)
        })
}
