//! Outbound seam: where addressed events leave the engine.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::engine::models::{Event, PlayerId};
use crate::games::mahjong::messages::MjEvent;

pub trait Transport: Send + Sync {
    fn send(&self, player_id: &str, event: Event);
}

/// Wrap a round event in the generic envelope.
pub fn to_event(player_id: Option<&str>, event: &MjEvent) -> Event {
    Event {
        event_type: event.event_type().to_string(),
        player_id: player_id.map(str::to_string),
        payload: serde_json::to_value(event).unwrap_or_default(),
    }
}

/// Keeps everything it is handed; used by tests and the demo host.
#[derive(Default)]
pub struct CollectingTransport {
    sent: Mutex<Vec<(PlayerId, Event)>>,
}

impl CollectingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(PlayerId, Event)> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Event types delivered to one player, in order, without draining.
    pub fn event_types_for(&self, player_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(p, _)| p == player_id)
            .map(|(_, e)| e.event_type.clone())
            .collect()
    }
}

impl Transport for CollectingTransport {
    fn send(&self, player_id: &str, event: Event) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((player_id.to_string(), event));
    }
}

/// Forwards into a bounded channel; a full channel drops the event.
pub struct ChannelTransport {
    tx: mpsc::Sender<(PlayerId, Event)>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<(PlayerId, Event)>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, player_id: &str, event: Event) {
        if let Err(e) = self.tx.try_send((player_id.to_string(), event)) {
            tracing::warn!(player_id, error = %e, "outbound event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_carries_tag() {
        let event = to_event(Some("alice"), &MjEvent::Ready { seat: 2 });
        assert_eq!(event.event_type, "ready");
        assert_eq!(event.player_id.as_deref(), Some("alice"));
        assert_eq!(event.payload["seat"], 2);
    }

    #[test]
    fn test_channel_transport_drops_when_full() {
        let (transport, mut rx) = ChannelTransport::new(1);
        transport.send("a", to_event(None, &MjEvent::HistoryBegin));
        transport.send("a", to_event(None, &MjEvent::HistoryEnd));
        let (player, event) = rx.try_recv().unwrap();
        assert_eq!(player, "a");
        assert_eq!(event.event_type, "history_begin");
        assert!(rx.try_recv().is_err());
    }
}
