//! Status enums and transition rules for connection requests and bookings.
//!
//! The stores persist statuses as plain text; these types are the single
//! place the legal values and transitions are written down.

use std::fmt;
use std::str::FromStr;

/// Role of the party sending a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderRole {
    Student,
    Mentor,
    Employer,
    Alumni,
    Admin,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Student => "student",
            SenderRole::Mentor => "mentor",
            SenderRole::Employer => "employer",
            SenderRole::Alumni => "alumni",
            SenderRole::Admin => "admin",
        }
    }
}

impl FromStr for SenderRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(SenderRole::Student),
            "mentor" => Ok(SenderRole::Mentor),
            "employer" => Ok(SenderRole::Employer),
            "alumni" => Ok(SenderRole::Alumni),
            "admin" => Ok(SenderRole::Admin),
            other => Err(format!("unknown sender type: {other}")),
        }
    }
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// pending -> accepted | rejected; both outcomes are terminal.
    pub fn can_transition(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Accepted)
                | (RequestStatus::Pending, RequestStatus::Rejected)
        )
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Scheduled,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// pending -> accepted | rejected | cancelled;
    /// accepted -> scheduled | cancelled;
    /// scheduled -> completed | cancelled;
    /// rejected, completed and cancelled are terminal.
    pub fn can_transition(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Accepted, Scheduled)
                | (Accepted, Cancelled)
                | (Scheduled, Completed)
                | (Scheduled, Cancelled)
        )
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "accepted" => Ok(BookingStatus::Accepted),
            "rejected" => Ok(BookingStatus::Rejected),
            "scheduled" => Ok(BookingStatus::Scheduled),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{BookingStatus, RequestStatus, SenderRole};

    #[test]
    fn sender_role_parses_all_five_roles() {
        for role in ["student", "mentor", "employer", "alumni", "admin"] {
            let parsed: SenderRole = role.parse().expect("role parses");
            assert_eq!(parsed.as_str(), role);
        }
        assert!("recruiter".parse::<SenderRole>().is_err());
    }

    #[test_case(RequestStatus::Pending, RequestStatus::Accepted, true)]
    #[test_case(RequestStatus::Pending, RequestStatus::Rejected, true)]
    #[test_case(RequestStatus::Accepted, RequestStatus::Rejected, false)]
    #[test_case(RequestStatus::Rejected, RequestStatus::Accepted, false)]
    #[test_case(RequestStatus::Pending, RequestStatus::Pending, false)]
    fn request_transitions(from: RequestStatus, to: RequestStatus, allowed: bool) {
        assert_eq!(from.can_transition(to), allowed);
    }

    #[test_case(BookingStatus::Pending, BookingStatus::Accepted, true)]
    #[test_case(BookingStatus::Pending, BookingStatus::Rejected, true)]
    #[test_case(BookingStatus::Pending, BookingStatus::Cancelled, true)]
    #[test_case(BookingStatus::Pending, BookingStatus::Scheduled, false)]
    #[test_case(BookingStatus::Accepted, BookingStatus::Scheduled, true)]
    #[test_case(BookingStatus::Accepted, BookingStatus::Completed, false)]
    #[test_case(BookingStatus::Scheduled, BookingStatus::Completed, true)]
    #[test_case(BookingStatus::Scheduled, BookingStatus::Cancelled, true)]
    #[test_case(BookingStatus::Rejected, BookingStatus::Accepted, false)]
    #[test_case(BookingStatus::Completed, BookingStatus::Cancelled, false)]
    #[test_case(BookingStatus::Cancelled, BookingStatus::Pending, false)]
    fn booking_transitions(from: BookingStatus, to: BookingStatus, allowed: bool) {
        assert_eq!(from.can_transition(to), allowed);
    }
}
