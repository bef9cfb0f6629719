//! Access control lists.
//!
//! An `Acl` is an ordered set of `(role, id, level)` grants attached to
//! every resource. Mutation is builder-style: `with_access` returns a
//! modified copy and never touches the original, so a connector can
//! hand an ACL to a caller without risking aliased mutation.

use crate::access::{AccessLevel, AccessRequest, AccessRole};
use crate::AccessCandidate;
use serde::{Deserialize, Serialize};

/// A single grant on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub role: AccessRole,
    pub id: String,
    pub level: AccessLevel,
}

/// Ordered set of grants on a resource.
///
/// Entries are kept in insertion order. At most one entry exists per
/// `(role, id)` pair; re-granting replaces the previous level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acl {
    entries: Vec<AclEntry>,
}

impl Acl {
    /// An empty ACL (denies everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// An ACL granting `Owner` to the given candidate.
    ///
    /// This is the entry every connector inserts for the creating
    /// candidate at resource-creation time, before any caller-supplied
    /// grants.
    pub fn owner(candidate: &AccessCandidate) -> Self {
        Self::new().with_access(candidate.role, &candidate.id, AccessLevel::Owner)
    }

    /// Return a copy of this ACL with an additional grant.
    ///
    /// If a grant for `(role, id)` already exists its level is replaced
    /// in place; otherwise the new entry is appended. The original ACL
    /// is unmodified.
    pub fn with_access(&self, role: AccessRole, id: &str, level: AccessLevel) -> Acl {
        let mut entries = self.entries.clone();
        if let Some(existing) = entries.iter_mut().find(|e| e.role == role && e.id == id) {
            existing.level = level;
        } else {
            entries.push(AclEntry {
                role,
                id: id.to_string(),
                level,
            });
        }
        Acl { entries }
    }

    /// Return a copy guaranteed to contain an `Owner` grant for the
    /// given candidate.
    ///
    /// Used by `set_acl` paths: a caller may supply a replacement ACL
    /// that omits the original owner, and the connector re-inserts the
    /// owner grant before persisting so ownership can never be silently
    /// dropped.
    pub fn ensure_owner(&self, candidate: &AccessCandidate) -> Acl {
        if self
            .entries
            .iter()
            .any(|e| e.role == candidate.role && e.id == candidate.id && e.level == AccessLevel::Owner)
        {
            return self.clone();
        }
        self.with_access(candidate.role, &candidate.id, AccessLevel::Owner)
    }

    /// Evaluate an access request against this ACL.
    ///
    /// True iff an entry matches the request's `(role, id)` with a
    /// level that satisfies the requested level.
    pub fn check_exact_access(&self, request: &AccessRequest) -> bool {
        self.entries.iter().any(|e| {
            e.role == request.candidate.role
                && e.id == request.candidate.id
                && e.level.satisfies(request.level)
        })
    }

    /// The grants in insertion order.
    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deserialize an ACL from its canonical JSON form.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Serialize this ACL to its canonical JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Array(vec![]))
    }
}

// =============================================================================
// TESTS
// =============================================================================
