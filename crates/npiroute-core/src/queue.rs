//! Bounded FIFO queues, one per traffic channel.

use std::collections::VecDeque;
use std::fmt;

use crate::message::MessageContainer;

/// Default per-channel capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// The four router-owned channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    AsyncTx,
    AsyncRx,
    SyncTx,
    SyncRx,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::AsyncTx,
        Channel::AsyncRx,
        Channel::SyncTx,
        Channel::SyncRx,
    ];

    fn index(self) -> usize {
        match self {
            Self::AsyncTx => 0,
            Self::AsyncRx => 1,
            Self::SyncTx => 2,
            Self::SyncRx => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AsyncTx => "ASYNC-TX",
            Self::AsyncRx => "ASYNC-RX",
            Self::SyncTx => "SYNC-TX",
            Self::SyncRx => "SYNC-RX",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected enqueue. Holds the message so the caller decides how to release it.
#[derive(Debug)]
pub struct QueueFull(pub MessageContainer);

impl QueueFull {
    pub fn into_inner(self) -> MessageContainer {
        self.0
    }
}

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue full, {} byte message rejected", self.0.len())
    }
}

impl std::error::Error for QueueFull {}

#[derive(Debug)]
struct BoundedQueue {
    items: VecDeque<MessageContainer>,
    capacity: usize,
}

impl BoundedQueue {
    fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }
}

/// The router's channel queues.
///
/// Not synchronized on its own: the router mutates it only while holding its
/// state lock.
#[derive(Debug)]
pub struct QueueSet {
    queues: [BoundedQueue; 4],
}

impl QueueSet {
    /// Every channel gets the same `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: std::array::from_fn(|_| BoundedQueue::new(capacity)),
        }
    }

    /// Append to the back of `channel`. A full channel rejects the new message.
    pub fn enqueue(
        &mut self,
        channel: Channel,
        container: MessageContainer,
    ) -> Result<(), QueueFull> {
        let queue = &mut self.queues[channel.index()];
        if queue.items.len() >= queue.capacity {
            return Err(QueueFull(container));
        }
        queue.items.push_back(container);
        Ok(())
    }

    /// Take the oldest message on `channel`.
    pub fn dequeue(&mut self, channel: Channel) -> Option<MessageContainer> {
        self.queues[channel.index()].items.pop_front()
    }

    pub fn is_empty(&self, channel: Channel) -> bool {
        self.queues[channel.index()].items.is_empty()
    }

    pub fn len(&self, channel: Channel) -> usize {
        self.queues[channel.index()].items.len()
    }

    pub fn capacity(&self, channel: Channel) -> usize {
        self.queues[channel.index()].capacity
    }

    /// Release every message on `channel`; returns how many were dropped.
    pub fn clear(&mut self, channel: Channel) -> usize {
        let queue = &mut self.queues[channel.index()];
        let released = queue.items.len();
        queue.items.clear();
        released
    }

    /// Release the messages on `channel` matching `stale`, keeping FIFO order
    /// for the rest. Returns how many were dropped.
    pub fn remove_where(
        &mut self,
        channel: Channel,
        mut stale: impl FnMut(&MessageContainer) -> bool,
    ) -> usize {
        let queue = &mut self.queues[channel.index()];
        let before = queue.items.len();
        queue.items.retain(|item| !stale(item));
        before - queue.items.len()
    }
}

impl Default for QueueSet {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
