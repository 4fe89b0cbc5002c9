use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw inbound event message from the ingestion queue. `eventId` is the only
/// required field; a payload without it can never be processed and is dropped
/// as poison rather than requeued.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEventMessage {
    pub event_id: Uuid,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub severity: Option<i32>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub camera_id: Option<String>,
    #[serde(default)]
    pub frame_reference: Option<String>,
}

/// Message the outbox relay publishes downstream. Consumers must be
/// idempotent on `assignmentId`/`eventId`; the relay delivers at least once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage {
    pub assignment_id: i64,
    pub event_id: Uuid,
    pub reviewer_id: i64,
}

/// Downstream confirmation closing the relay loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckMessage {
    pub assignment_id: i64,
    pub event_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_event_parses_with_sparse_payload() {
        let json = r#"{"eventId": "8c1f3f8e-58b7-4b29-9e6e-0d1f9f6f9f00", "severity": 4}"#;
        let message: InboundEventMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.severity, Some(4));
        assert!(message.region.is_none());
    }

    #[test]
    fn inbound_event_rejects_missing_event_id() {
        let json = r#"{"region": "EU", "severity": 2}"#;
        assert!(serde_json::from_str::<InboundEventMessage>(json).is_err());
    }

    #[test]
    fn inbound_event_rejects_malformed_event_id() {
        let json = r#"{"eventId": "not-a-uuid"}"#;
        assert!(serde_json::from_str::<InboundEventMessage>(json).is_err());
    }

    #[test]
    fn relay_message_uses_camel_case_keys() {
        let message = RelayMessage {
            assignment_id: 12,
            event_id: Uuid::nil(),
            reviewer_id: 3,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("assignmentId").is_some());
        assert!(json.get("eventId").is_some());
        assert!(json.get("reviewerId").is_some());
    }

    #[test]
    fn ack_message_roundtrip() {
        let json = r#"{"assignmentId": 9, "eventId": "8c1f3f8e-58b7-4b29-9e6e-0d1f9f6f9f00"}"#;
        let message: AckMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.assignment_id, 9);
    }
}
