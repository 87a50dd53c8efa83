//! Bounded, typed event queues.
//!
//! Every client component reports what happened during a tick by pushing
//! enum-tagged events into an [`EventQueue`]. The host drains each queue once
//! per tick, so ordering is the push order and back-pressure is explicit: when
//! a queue is full the oldest event is dropped and a warning is logged.

use std::collections::VecDeque;

/// Default capacity used by components that do not configure their own.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// FIFO queue of events with a fixed upper bound.
#[derive(Debug, Clone)]
pub struct EventQueue<E> {
    events: VecDeque<E>,
    capacity: usize,
    dropped: u64,
}

impl<E> EventQueue<E> {
    /// Creates an empty queue holding at most `capacity` events.
    ///
    /// A capacity of zero is bumped to one so that the most recent event is
    /// always observable.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_EVENT_CAPACITY)),
            capacity,
            dropped: 0,
        }
    }

    /// Appends an event, evicting the oldest one if the queue is full.
    pub fn push(&mut self, event: E) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
            self.dropped += 1;
            tracing::warn!(
                capacity = self.capacity,
                dropped = self.dropped,
                "event queue full, dropping oldest event"
            );
        }
        self.events.push_back(event);
    }

    /// Removes and returns every queued event in push order.
    pub fn drain(&mut self) -> impl Iterator<Item = E> + '_ {
        self.events.drain(..)
    }

    /// Removes and returns the oldest queued event.
    pub fn pop(&mut self) -> Option<E> {
        self.events.pop_front()
    }

    /// Iterates over queued events without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.events.iter()
    }

    /// Number of events currently queued.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if no events are queued.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum number of events the queue holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raises the bound so that `additional` more events fit without
    /// evicting anything already queued. Never lowers it.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.events.len().saturating_add(additional);
        if needed > self.capacity {
            tracing::debug!(from = self.capacity, to = needed, "Growing event queue");
            self.capacity = needed;
        }
    }

    /// Total number of events evicted because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Discards all queued events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
