//! Access candidates and per-operation access requests.
//!
//! An `AccessCandidate` identifies the caller (user, team, or agent) on
//! whose behalf an operation runs. Every connector operation is scoped
//! by a candidate; the candidate plus a requested level form an
//! `AccessRequest` that is evaluated against the target resource's ACL.

use serde::{Deserialize, Serialize};

/// Role of the identity performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    User,
    Team,
    Agent,
}

/// Access level requested by or granted to a candidate.
///
/// Levels are totally ordered: `Read < Write < Owner`. A grant at a
/// given level satisfies any request at that level or below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
    Owner,
}

impl AccessLevel {
    /// Whether a grant at this level satisfies a request at `requested`.
    pub fn satisfies(&self, requested: AccessLevel) -> bool {
        *self >= requested
    }
}

/// The identity on whose behalf an operation runs.
///
/// Immutable; created once per request and passed by reference (or
/// cheap clone) through every layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessCandidate {
    pub id: String,
    pub role: AccessRole,
}

impl AccessCandidate {
    pub fn new(id: impl Into<String>, role: AccessRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// A user candidate.
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(id, AccessRole::User)
    }

    /// A team candidate.
    pub fn team(id: impl Into<String>) -> Self {
        Self::new(id, AccessRole::Team)
    }

    /// An agent candidate.
    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(id, AccessRole::Agent)
    }

    /// Build a read-level request for this candidate.
    pub fn read_request(&self) -> AccessRequest {
        AccessRequest::new(self.clone(), AccessLevel::Read)
    }

    /// Build a write-level request for this candidate.
    pub fn write_request(&self) -> AccessRequest {
        AccessRequest::new(self.clone(), AccessLevel::Write)
    }

    /// Build an owner-level request for this candidate.
    pub fn owner_request(&self) -> AccessRequest {
        AccessRequest::new(self.clone(), AccessLevel::Owner)
    }
}

/// A candidate paired with the access level an operation needs.
///
/// Created per operation, consumed by ACL evaluation, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub candidate: AccessCandidate,
    pub level: AccessLevel,
}

impl AccessRequest {
    pub fn new(candidate: AccessCandidate, level: AccessLevel) -> Self {
        Self { candidate, level }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(AccessLevel::Read < AccessLevel::Write);
        assert!(AccessLevel::Write < AccessLevel::Owner);
    }

    #[test]
    fn test_level_satisfies() {
        assert!(AccessLevel::Owner.satisfies(AccessLevel::Read));
        assert!(AccessLevel::Owner.satisfies(AccessLevel::Write));
        assert!(AccessLevel::Owner.satisfies(AccessLevel::Owner));
        assert!(AccessLevel::Write.satisfies(AccessLevel::Read));
        assert!(!AccessLevel::Write.satisfies(AccessLevel::Owner));
        assert!(!AccessLevel::Read.satisfies(AccessLevel::Write));
    }

    #[test]
    fn test_candidate_constructors() {
        let user = AccessCandidate::user("u1");
        assert_eq!(user.role, AccessRole::User);
        assert_eq!(user.id, "u1");

        let team = AccessCandidate::team("t1");
        assert_eq!(team.role, AccessRole::Team);

        let agent = AccessCandidate::agent("a1");
        assert_eq!(agent.role, AccessRole::Agent);
    }

    #[test]
    fn test_request_helpers() {
        let candidate = AccessCandidate::agent("a1");
        assert_eq!(candidate.read_request().level, AccessLevel::Read);
        assert_eq!(candidate.write_request().level, AccessLevel::Write);
        assert_eq!(candidate.owner_request().level, AccessLevel::Owner);
        assert_eq!(candidate.read_request().candidate, candidate);
    }

    #[test]
    fn test_role_serde_roundtrip() {
        for role in [AccessRole::User, AccessRole::Team, AccessRole::Agent] {
            let json = serde_json::to_string(&role).unwrap();
            let back: AccessRole = serde_json::from_str(&json).unwrap();
            assert_eq!(role, back);
        }
    }
}
