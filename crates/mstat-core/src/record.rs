//! Aggregated fetch-cycle records.

use crate::source::SourceId;
use serde::{Deserialize, Serialize};

/// One entry of a fetch cycle: a source identity and its status text.
///
/// Serialized for viewers as `{"Machine": "<host:port>", "Data": "<text>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    /// Source identity.
    #[serde(rename = "Machine")]
    pub source: SourceId,
    /// Status text, or the offline placeholder.
    #[serde(rename = "Data")]
    pub status: String,
}

impl AggregatedRecord {
    pub fn new(source: SourceId, status: impl Into<String>) -> Self {
        Self {
            source,
            status: status.into(),
        }
    }
}
