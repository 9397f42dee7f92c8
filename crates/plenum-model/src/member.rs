// SPDX-License-Identifier: Apache-2.0

use crate::ids::{MemberId, TermId};
use serde::{Deserialize, Serialize};

/// A parliamentary representative as stored in the `members` table.
/// Immutable within a term once ingested; superseded wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub country: String,
    pub political_group: String,
    pub national_party: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum RoleType {
    /// EU-chamber leadership (president, vice-president, quaestor).
    Chamber,
    Committee,
    Delegation,
}

impl RoleType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chamber => "chamber",
            Self::Committee => "committee",
            Self::Delegation => "delegation",
        }
    }

    #[must_use]
    pub fn from_str_opt(raw: &str) -> Option<Self> {
        match raw {
            "chamber" => Some(Self::Chamber),
            "committee" => Some(Self::Committee),
            "delegation" => Some(Self::Delegation),
            _ => None,
        }
    }
}

/// One row per (member, term, role). A member may hold zero or more roles
/// per term; only the single highest-value role contributes to scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFact {
    pub member_id: MemberId,
    pub term: TermId,
    pub role_type: RoleType,
    pub role_name: String,
    pub body: Option<String>,
}

/// Source shape of one roster record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub national_party: String,
    #[serde(default)]
    pub roles: Vec<RoleRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub term: u8,
    pub role_type: String,
    pub role_name: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{RoleType, RosterRecord};

    #[test]
    fn role_type_round_trips_known_names() {
        for t in [RoleType::Chamber, RoleType::Committee, RoleType::Delegation] {
            assert_eq!(RoleType::from_str_opt(t.as_str()), Some(t));
        }
        assert_eq!(RoleType::from_str_opt("working_group"), None);
    }

    #[test]
    fn roster_record_tolerates_missing_optionals() {
        let rec: RosterRecord =
            serde_json::from_str(r#"{"id": 124936, "name": "Jane Doe"}"#).expect("roster");
        assert_eq!(rec.id, 124936);
        assert!(rec.roles.is_empty());
        assert!(rec.country.is_empty());
    }
}
