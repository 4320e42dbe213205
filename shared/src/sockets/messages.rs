use serde::{Deserialize, Serialize};

/// Incoming WebSocket message from client
#[derive(Debug, Deserialize)]
pub struct WebSocketMessage {
    pub action: String,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Frame sent to feed subscribers
#[derive(Debug, Serialize)]
pub struct FeedMessage {
    pub r#type: String,
    pub feed: String,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl FeedMessage {
    pub fn new(message_type: &str, feed: &str, data: serde_json::Value) -> Self {
        Self {
            r#type: message_type.to_string(),
            feed: feed.to_string(),
            data,
        }
    }

    /// Initial document set delivered on subscribe.
    pub fn snapshot(feed: &str, documents: serde_json::Value) -> Self {
        Self::new("snapshot", feed, serde_json::json!({ "documents": documents }))
    }

    /// A document was inserted or updated.
    pub fn changed(feed: &str, document: serde_json::Value) -> Self {
        Self::new("changed", feed, serde_json::json!({ "document": document }))
    }

    /// A document was deleted.
    pub fn removed(feed: &str, id: &str) -> Self {
        Self::new("removed", feed, serde_json::json!({ "id": id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_message_carries_feed_in_data() {
        let message: WebSocketMessage =
            serde_json::from_str(r#"{"action": "subscribe", "feed": "affiliations"}"#).unwrap();

        assert_eq!(message.action, "subscribe");
        assert_eq!(
            message.data.get("feed").and_then(|v| v.as_str()),
            Some("affiliations")
        );
    }

    #[test]
    fn removed_frame_shape() {
        let frame = FeedMessage::removed("affiliations", "aff-1");
        let value = serde_json::to_value(&frame).unwrap();

        assert_eq!(value["type"], "removed");
        assert_eq!(value["feed"], "affiliations");
        assert_eq!(value["id"], "aff-1");
    }

    #[test]
    fn snapshot_frame_wraps_documents() {
        let frame = FeedMessage::snapshot("users", serde_json::json!([{"user_id": "u-1"}]));
        let value = serde_json::to_value(&frame).unwrap();

        assert_eq!(value["type"], "snapshot");
        assert_eq!(value["documents"][0]["user_id"], "u-1");
    }
}
