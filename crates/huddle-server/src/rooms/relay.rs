use crate::ws::connections::ConnectionManager;
use huddle_protocol::{ConnectionId, ServerMessage, SignalKind};
use serde_json::Value;
use std::sync::Arc;

/// One offer, answer or ICE candidate on its way to a single connection
#[derive(Debug, Clone)]
pub struct SignalingEnvelope {
    pub kind: SignalKind,
    pub from: ConnectionId,
    pub to: ConnectionId,
    pub body: Value,
}

/// Point-to-point forwarding of negotiation messages.
///
/// Delivery is best effort: if the recipient is gone the message is dropped
/// and the sender is not told. The recipient's own disconnect path cleans up
/// after it.
#[derive(Clone)]
pub struct SignalingRelay {
    connections: Arc<ConnectionManager>,
}

impl SignalingRelay {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    /// Returns whether the message was queued for the recipient
    pub async fn relay(&self, envelope: SignalingEnvelope) -> bool {
        let SignalingEnvelope {
            kind,
            from,
            to,
            body,
        } = envelope;

        let delivered = self
            .connections
            .send_to_connection(to, &ServerMessage::signal(kind, from, body))
            .await;

        if !delivered {
            tracing::debug!(%kind, %from, %to, "Dropped signal for unknown connection");
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test]
    async fn delivers_to_addressee_only() {
        let connections = Arc::new(ConnectionManager::new());
        let relay = SignalingRelay::new(connections.clone());

        let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        let (c_tx, mut c_rx) = mpsc::unbounded_channel();
        connections.add_connection(a, Uuid::new_v4(), a_tx).await;
        connections.add_connection(b, Uuid::new_v4(), b_tx).await;
        connections.add_connection(c, Uuid::new_v4(), c_tx).await;

        let delivered = relay
            .relay(SignalingEnvelope {
                kind: SignalKind::Offer,
                from: a,
                to: b,
                body: json!({"sdp": "v=0"}),
            })
            .await;
        assert!(delivered);

        let received: ServerMessage = serde_json::from_str(&b_rx.try_recv().unwrap()).unwrap();
        match received {
            ServerMessage::Offer { from, offer } => {
                assert_eq!(from, a);
                assert_eq!(offer, json!({"sdp": "v=0"}));
            }
            other => panic!("Expected offer, got {:?}", other),
        }
        assert!(a_rx.try_recv().is_err());
        assert!(c_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn absent_recipient_is_silently_dropped() {
        let connections = Arc::new(ConnectionManager::new());
        let relay = SignalingRelay::new(connections.clone());

        let a = ConnectionId::new();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        connections.add_connection(a, Uuid::new_v4(), a_tx).await;

        let delivered = relay
            .relay(SignalingEnvelope {
                kind: SignalKind::Answer,
                from: a,
                to: ConnectionId::new(),
                body: json!({}),
            })
            .await;

        assert!(!delivered);
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn preserves_order_per_pair() {
        let connections = Arc::new(ConnectionManager::new());
        let relay = SignalingRelay::new(connections.clone());

        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        connections.add_connection(b, Uuid::new_v4(), b_tx).await;

        for i in 0..20 {
            relay
                .relay(SignalingEnvelope {
                    kind: SignalKind::IceCandidate,
                    from: a,
                    to: b,
                    body: json!(i),
                })
                .await;
        }

        for i in 0..20 {
            let msg: ServerMessage = serde_json::from_str(&b_rx.try_recv().unwrap()).unwrap();
            assert!(matches!(msg, ServerMessage::IceCandidate { candidate, .. } if candidate == json!(i)));
        }
    }
}
