//! Outbound event queue of a round and the request ids stamped on prompts.

use super::messages::MjEvent;
use crate::engine::errors::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Seat(usize),
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Target,
    pub event: MjEvent,
}

#[derive(Debug, Default)]
pub struct Outbox {
    items: Vec<Outbound>,
}

impl Outbox {
    pub fn send_to(&mut self, seat: usize, event: MjEvent) {
        self.items.push(Outbound {
            target: Target::Seat(seat),
            event,
        });
    }

    pub fn broadcast(&mut self, event: MjEvent) {
        self.items.push(Outbound {
            target: Target::All,
            event,
        });
    }

    /// Send `own` to `seat` and `others` to every other seat.
    pub fn split(&mut self, seat: usize, seats: usize, own: MjEvent, others: MjEvent) {
        for s in 0..seats {
            if s == seat {
                self.send_to(s, own.clone());
            } else {
                self.send_to(s, others.clone());
            }
        }
    }

    pub fn drain(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.items)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Monotonic ids; each seat only answers its latest prompt.
#[derive(Debug, Clone)]
pub struct RequestIds {
    next: u32,
    current: Vec<Option<u32>>,
}

impl RequestIds {
    pub fn new(seats: usize) -> Self {
        Self {
            next: 1,
            current: vec![None; seats],
        }
    }

    pub fn issue(&mut self, seat: usize) -> u32 {
        let id = self.next;
        self.next += 1;
        if let Some(slot) = self.current.get_mut(seat) {
            *slot = Some(id);
        }
        id
    }

    pub fn current(&self, seat: usize) -> Option<u32> {
        self.current.get(seat).copied().flatten()
    }

    /// Accept `id` only if it is the seat's outstanding prompt.
    pub fn check(&self, seat: usize, id: u32) -> EngineResult<()> {
        match self.current(seat) {
            Some(current) if current == id => Ok(()),
            Some(_) => Err(EngineError::StaleRequest { seat, request_id: id }),
            None => Err(EngineError::NotYourTurn { seat }),
        }
    }

    pub fn clear(&mut self, seat: usize) {
        if let Some(slot) = self.current.get_mut(seat) {
            *slot = None;
        }
    }

    pub fn clear_all(&mut self) {
        self.current.iter_mut().for_each(|slot| *slot = None);
    }
}
