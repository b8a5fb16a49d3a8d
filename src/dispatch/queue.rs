use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

/// Producer half of a fixed-capacity follower queue. Cloneable so any
/// append-path thread can offer; offers never block.
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    capacity: usize,
}

/// Consumer half, held by exactly one dispatch worker.
pub struct QueueConsumer<T> {
    rx: Receiver<T>,
}

/// Creates the two halves of a follower queue. Dropping every producer
/// wakes a blocked `take` with `None`, which is the worker's exit signal.
pub fn bounded<T>(capacity: usize) -> (BoundedQueue<T>, QueueConsumer<T>) {
    assert!(capacity > 0, "follower queue requires a positive capacity");
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (BoundedQueue { tx, capacity }, QueueConsumer { rx })
}

impl<T> BoundedQueue<T> {
    /// Non-blocking insert; false when the queue is full or the consumer is
    /// gone.
    pub fn try_offer(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> QueueConsumer<T> {
    /// Blocks until an item arrives; `None` once every producer is gone.
    pub fn take(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Moves every currently-queued item into `buf`, preserving FIFO order.
    /// Never blocks. Returns how many items moved.
    pub fn drain_to(&self, buf: &mut Vec<T>) -> usize {
        let mut moved = 0;
        loop {
            match self.rx.try_recv() {
                Ok(item) => {
                    buf.push(item);
                    moved += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        moved
    }
}
