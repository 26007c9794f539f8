use crate::domain::ChannelKind;
use std::collections::VecDeque;

/// A reliable send held back until the peer has joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub lane: ChannelKind,
    pub data: Vec<u8>,
}

/// FIFO of deferred reliable sends (unbounded unless a limit is set)
#[derive(Debug, Default)]
pub struct MessageQueue {
    queue: VecDeque<QueuedMessage>,
    max_size: Option<usize>,
}

impl MessageQueue {
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            queue: VecDeque::new(),
            max_size,
        }
    }

    /// Push a message (returns error if full)
    pub fn push(&mut self, msg: QueuedMessage) -> Result<(), QueueError> {
        if let Some(max) = self.max_size {
            if self.queue.len() >= max {
                return Err(QueueError::Full { max });
            }
        }
        self.queue.push_back(msg);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<QueuedMessage> {
        self.queue.pop_front()
    }

    /// Drain all messages in enqueue order
    pub fn drain(&mut self) -> Vec<QueuedMessage> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.max_size
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QueueError {
    #[error("Queue is full (max size: {max})")]
    Full { max: usize },
}
