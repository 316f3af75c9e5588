//! Student and session models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub student_id: String,
    pub created_at: String,
}

/// Identity of an authenticated caller, resolved from a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub student_id: String,
}

/// A login session issued by the portal's login service.
#[derive(Debug, Clone)]
pub struct Session {
    pub student_id: String,
    pub expires_at: String,
}

impl Session {
    /// Whether the session is still usable at `now`. Unparseable expiry counts as expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .map(|expires| expires.with_timezone(&Utc) > now)
            .unwrap_or(false)
    }
}

/// Request body for registering a student.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStudentRequest {
    pub student_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_at: String) -> Session {
        Session {
            student_id: "S1".to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_session_validity() {
        let now = Utc::now();
        assert!(session((now + Duration::hours(1)).to_rfc3339()).is_valid_at(now));
        assert!(!session((now - Duration::hours(1)).to_rfc3339()).is_valid_at(now));
        assert!(!session("tomorrow".to_string()).is_valid_at(now));
    }
}
