//! Per-message processing and cache statistics, and backend-wide chat info.

use serde::{Deserialize, Serialize};

use crate::upstream::lenient_id;

/// Lifecycle timestamps for one assistant message (ISO-8601 strings).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_token_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<String>,
}

impl ProcessingInfo {
    /// Processing has finished once the end timestamp is known.
    pub fn is_complete(&self) -> bool {
        self.end_timestamp.is_some()
    }
}

/// Response cache outcome for one assistant message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheInfo {
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<String>,
    pub hit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_timestamp: Option<String>,
    #[serde(default)]
    pub num_hits: u64,
}

/// The `cache_hit` field on lifecycle payloads.
///
/// Backends send either a bare flag or the full cache record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheHit {
    Flag(bool),
    Detail(CacheInfo),
}

impl CacheHit {
    /// Normalise into a [`CacheInfo`] for `message_id`.
    pub fn into_cache_info(self, message_id: Option<String>) -> CacheInfo {
        match self {
            Self::Flag(hit) => CacheInfo {
                message_id,
                hit,
                num_hits: u64::from(hit),
                ..Default::default()
            },
            Self::Detail(mut info) => {
                if info.message_id.is_none() {
                    info.message_id = message_id;
                }
                info
            }
        }
    }
}

/// Aggregate backend statistics served by `/chat/info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub chats_created: u64,
    pub messages_received: u64,
    /// Seconds.
    pub average_response_time: f64,
    /// Seconds.
    #[serde(default)]
    pub average_first_token_time: f64,
}

/// Response of the backend's `/chat/create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedChat {
    pub id: i64,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_flag() {
        let hit: CacheHit = serde_json::from_str("true").unwrap();
        let info = hit.into_cache_info(Some("m-1".into()));
        assert!(info.hit);
        assert_eq!(info.num_hits, 1);
        assert_eq!(info.message_id.as_deref(), Some("m-1"));
    }

    #[test]
    fn test_cache_hit_detail_keeps_its_own_id() {
        let hit: CacheHit = serde_json::from_str(
            r#"{"message_id":"m-9","hit":true,"num_hits":4,"cache_timestamp":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let info = hit.into_cache_info(Some("m-1".into()));
        assert_eq!(info.message_id.as_deref(), Some("m-9"));
        assert_eq!(info.num_hits, 4);
    }

    #[test]
    fn test_processing_info_partial_payload() {
        let info: ProcessingInfo =
            serde_json::from_str(r#"{"message_id":"m-1","start_timestamp":"t0"}"#).unwrap();
        assert_eq!(info.start_timestamp.as_deref(), Some("t0"));
        assert!(!info.is_complete());
    }

    #[test]
    fn test_integer_ids_become_strings() {
        let info: ProcessingInfo = serde_json::from_str(
            r#"{"id":7,"message_id":42,"start_timestamp":"t0","end_timestamp":"t1"}"#,
        )
        .unwrap();
        assert_eq!(info.id.as_deref(), Some("7"));
        assert_eq!(info.message_id.as_deref(), Some("42"));
        assert!(info.is_complete());

        let cache: CacheInfo =
            serde_json::from_str(r#"{"id":3,"message_id":42,"hit":true,"num_hits":2}"#).unwrap();
        assert_eq!(cache.id.as_deref(), Some("3"));
        assert_eq!(cache.message_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_cache_hit_detail_with_integer_id() {
        let hit: CacheHit =
            serde_json::from_str(r#"{"message_id":42,"hit":false,"num_hits":0}"#).unwrap();
        let info = hit.into_cache_info(None);
        assert_eq!(info.message_id.as_deref(), Some("42"));
        assert!(!info.hit);
    }

    #[test]
    fn test_chat_info_tolerates_missing_first_token_average() {
        let info: ChatInfo = serde_json::from_str(
            r#"{"chats_created":3,"messages_received":10,"average_response_time":1.5}"#,
        )
        .unwrap();
        assert_eq!(info.chats_created, 3);
        assert_eq!(info.average_first_token_time, 0.0);
    }
}
