use crate::r#ref::MemberRef;
use serde::{Deserialize, Serialize};

/// Source shape of one amendment occurrence. Structured payloads (`new_text`,
/// `old_text`, `dossiers`) stay opaque JSON and are serialized to blobs on
/// write, decoded only on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmendmentRecord {
    pub date: String,
    pub reference: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub committee: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub new_text: Option<serde_json::Value>,
    #[serde(default)]
    pub old_text: Option<serde_json::Value>,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub dossiers: Option<serde_json::Value>,
    #[serde(default)]
    pub members: Vec<MemberRef>,
}
