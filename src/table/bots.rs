//! Bot actors: one task per bot seat fed through a bounded queue.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use super::supervisor::Table;
use crate::engine::bot_strategy::BotStrategy;
use crate::games::mahjong::state::Prompt;

/// Sending half of a bot seat's queue.
pub struct BotQueue {
    seat: usize,
    tx: mpsc::Sender<Prompt>,
    last_request: u32,
}

impl BotQueue {
    pub fn new(seat: usize, tx: mpsc::Sender<Prompt>) -> Self {
        Self {
            seat,
            tx,
            last_request: 0,
        }
    }

    /// Request ids restart with every round.
    pub fn reset(&mut self) {
        self.last_request = 0;
    }

    /// Hand a prompt to the bot once. A full queue drops it; the round
    /// timeout then plays for the seat.
    pub fn offer(&mut self, prompt: &Prompt) {
        if prompt.request_id <= self.last_request {
            return;
        }
        self.last_request = prompt.request_id;
        if let Err(e) = self.tx.try_send(prompt.clone()) {
            tracing::warn!(seat = self.seat, request_id = prompt.request_id, error = %e, "bot prompt dropped");
        }
    }
}

/// Spawn the actor for `seat`. Answers re-enter through the table like any
/// player message.
pub fn spawn_bot(table: Arc<Table>, seat: usize, strategy: Box<dyn BotStrategy>, capacity: usize) -> BotQueue {
    let (tx, mut rx) = mpsc::channel::<Prompt>(capacity);
    tokio::spawn(async move {
        while let Some(prompt) = rx.recv().await {
            let request = strategy.choose_action(&prompt);
            if let Err(e) = table.on_seat_msg(seat, request, Instant::now()) {
                tracing::debug!(
                    table_id = table.id(),
                    seat,
                    strategy = strategy.name(),
                    error = %e,
                    "bot answer rejected"
                );
            }
        }
        tracing::debug!(table_id = table.id(), seat, "bot queue closed");
    });
    BotQueue::new(seat, tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::mahjong::operates::Operates;

    fn prompt(request_id: u32) -> Prompt {
        Prompt {
            seat: 1,
            request_id,
            operates: Operates::default(),
            tile: None,
            self_turn: true,
            hand: Vec::new(),
            ting_tiles: Vec::new(),
            wildcards: Vec::new(),
            shapes: Vec::new(),
        }
    }

    #[test]
    fn test_offer_once_and_drop_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut queue = BotQueue::new(1, tx);
        queue.offer(&prompt(4));
        queue.offer(&prompt(4));
        queue.offer(&prompt(5));
        assert_eq!(rx.try_recv().map(|p| p.request_id).ok(), Some(4));
        assert!(rx.try_recv().is_err());
        queue.offer(&prompt(6));
        assert_eq!(rx.try_recv().map(|p| p.request_id).ok(), Some(6));
        queue.reset();
        queue.offer(&prompt(1));
        assert_eq!(rx.try_recv().map(|p| p.request_id).ok(), Some(1));
    }
}
