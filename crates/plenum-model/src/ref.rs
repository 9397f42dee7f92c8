// SPDX-License-Identifier: Apache-2.0

use crate::ids::MemberId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys a nested member reference may carry its identifier under, probed in
/// this fixed order.
pub const MEMBER_REF_KEYS: [&str; 3] = ["id", "mep_id", "member_id"];

/// A member reference as it appears in source records: either a bare numeric
/// identifier or a nested structure carrying the identifier under one of the
/// known keys. A closed tagged variant, not duck-typed field probing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberRef {
    Id(u64),
    Nested(BTreeMap<String, serde_json::Value>),
}

impl MemberRef {
    /// Normalize to a member id. Returns `None` when no known key holds a
    /// positive integer; such records are stored with zero member links.
    #[must_use]
    pub fn normalize(&self) -> Option<MemberId> {
        match self {
            Self::Id(raw) => MemberId::parse(*raw).ok(),
            Self::Nested(fields) => MEMBER_REF_KEYS.iter().find_map(|key| {
                fields
                    .get(*key)
                    .and_then(serde_json::Value::as_u64)
                    .and_then(|raw| MemberId::parse(raw).ok())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MemberRef;

    fn parse(raw: &str) -> MemberRef {
        serde_json::from_str(raw).expect("member ref")
    }

    #[test]
    fn bare_id_normalizes() {
        assert_eq!(
            parse("124936").normalize().map(|m| m.as_u64()),
            Some(124936)
        );
    }

    #[test]
    fn nested_keys_probe_in_fixed_order() {
        assert_eq!(
            parse(r#"{"mep_id": 7}"#).normalize().map(|m| m.as_u64()),
            Some(7)
        );
        // `id` wins over `mep_id` when both are present.
        assert_eq!(
            parse(r#"{"mep_id": 7, "id": 9}"#)
                .normalize()
                .map(|m| m.as_u64()),
            Some(9)
        );
    }

    #[test]
    fn unknown_shapes_normalize_to_none() {
        assert_eq!(parse(r#"{"identifier": 7}"#).normalize(), None);
        assert_eq!(parse(r#"{"id": "seven"}"#).normalize(), None);
        assert_eq!(parse(r#"{"id": 0}"#).normalize(), None);
    }
}
