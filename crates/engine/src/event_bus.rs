// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed pub/sub with per-subscriber buffering.
//!
//! Each subscriber owns a bounded queue (default 100). Publishing never
//! blocks: on overflow the oldest undelivered event is dropped and a
//! counter ticks up. Progress events are full snapshots, so a subscriber
//! that lost events recovers with the next delivery. Delivery order per
//! subscriber follows publish order.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use sky_core::{Event, EventFilter};
use tokio::sync::Notify;

const DEFAULT_BUFFER: usize = 100;

struct SubscriberInner {
    filter: EventFilter,
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

/// A live subscription. Dropping it unsubscribes; dropping twice (or
/// explicitly unsubscribing after drop) is harmless.
pub struct Subscription {
    inner: Arc<SubscriberInner>,
}

impl Subscription {
    /// Wait for the next matching event.
    pub async fn recv(&self) -> Event {
        loop {
            if let Some(event) = self.inner.queue.lock().pop_front() {
                return event;
            }
            self.inner.notify.notified().await;
        }
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.queue.lock().pop_front()
    }

    /// Events discarded to overflow since subscribing.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn filter(&self) -> EventFilter {
        self.inner.filter
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.closed.store(true, Ordering::Relaxed);
        self.inner.queue.lock().clear();
    }
}

pub struct EventBus {
    subscribers: Mutex<Vec<Arc<SubscriberInner>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { subscribers: Mutex::new(Vec::new()), capacity: capacity.max(1) }
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let inner = Arc::new(SubscriberInner {
            filter,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        self.subscribers.lock().push(Arc::clone(&inner));
        Subscription { inner }
    }

    /// Fan an event out to every matching subscriber. Never blocks.
    pub fn publish(&self, event: &Event) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| !s.closed.load(Ordering::Relaxed));
        for sub in subscribers.iter() {
            if !sub.filter.matches(event) {
                continue;
            }
            {
                let mut queue = sub.queue.lock();
                if queue.len() >= self.capacity {
                    queue.pop_front();
                    sub.dropped.fetch_add(1, Ordering::Relaxed);
                }
                queue.push_back(event.clone());
            }
            sub.notify.notify_one();
        }
    }

    /// Current live subscriber count (after pruning closed ones).
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| !s.closed.load(Ordering::Relaxed));
        subscribers.len()
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
