//! Lock-free handoff from interrupt context to the polling loop.
//!
//! `CommandQueue` is a single-producer / single-consumer ring buffer. The
//! queue itself only answers snapshot questions; items go in through the
//! [`Producer`] and come out through the [`Consumer`] returned by
//! [`CommandQueue::split`]. The split borrows the queue mutably, so there is
//! exactly one of each for as long as either is alive.
//!
//! The producer publishes a slot with a release store to `head`; the consumer
//! acquires `head` before reading the slot, and releases `tail` after copying
//! it out so the producer's fullness check sees the slot as free only once the
//! copy is done.

use core::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Fixed-capacity SPSC ring buffer. `N` must be a power of two; one slot is
/// kept free to tell "full" from "empty", so at most `N - 1` items are queued.
pub struct CommandQueue<T, const N: usize> {
    buffer: [UnsafeCell<MaybeUninit<T>>; N],
    head: AtomicUsize,
    tail: AtomicUsize,
}

// Slots are only reached through the one `Producer` and the one `Consumer`,
// which hand them over with the head/tail protocol above.
unsafe impl<T: Copy + Send, const N: usize> Sync for CommandQueue<T, N> {}

impl<T: Copy, const N: usize> Default for CommandQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, const N: usize> CommandQueue<T, N> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "queue size must be a power of two");
        N - 1
    };

    pub const fn new() -> Self {
        Self {
            buffer: [const { UnsafeCell::new(MaybeUninit::uninit()) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Hand out the two ends of the queue.
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let queue: &Self = self;
        (Producer { queue }, Consumer { queue })
    }

    /// Number of items the queue holds before it reports full.
    pub const fn capacity(&self) -> usize {
        Self::MASK
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        ((self.head.load(Ordering::Acquire) + 1) & Self::MASK)
            == self.tail.load(Ordering::Acquire)
    }

    /// Snapshot of the number of queued items.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) & Self::MASK
    }

    fn write_slot(
        &self,
        item: T,
    ) {
        let head = self.head.load(Ordering::Relaxed);
        // Only the producer writes, and `head` is never a slot the consumer
        // may be reading unless the caller overran the queue.
        unsafe { (*self.buffer[head].get()).write(item) };
        self.head.store((head + 1) & Self::MASK, Ordering::Release);
    }
}

/// Write end of a [`CommandQueue`]. Lives in the receive interrupt.
pub struct Producer<'a, T, const N: usize> {
    queue: &'a CommandQueue<T, N>,
}

impl<T: Copy, const N: usize> Producer<'_, T, N> {
    /// Queue `item` unless the queue is full, in which case it is handed back
    /// untouched.
    pub fn try_push(
        &mut self,
        item: T,
    ) -> Result<(), T> {
        if self.queue.is_full() {
            return Err(item);
        }
        self.queue.write_slot(item);
        Ok(())
    }

    /// Write unconditionally. If the consumer has fallen a whole buffer
    /// behind, head catches up with tail and every unread item is lost.
    ///
    /// # Safety
    ///
    /// When the queue is full this writes the slot the consumer reads next.
    /// The caller must ensure the [`Consumer`] is not inside
    /// [`Consumer::pop`] while a push overruns the queue, for instance by
    /// only overrunning from a context the consumer cannot preempt.
    pub unsafe fn push(
        &mut self,
        item: T,
    ) {
        self.queue.write_slot(item);
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Read end of a [`CommandQueue`]. Lives in the polling loop.
pub struct Consumer<'a, T, const N: usize> {
    queue: &'a CommandQueue<T, N>,
}

impl<T: Copy, const N: usize> Consumer<'_, T, N> {
    /// Oldest queued item, or `None` when empty.
    pub fn pop(&mut self) -> Option<T> {
        let queue = self.queue;
        let tail = queue.tail.load(Ordering::Relaxed);
        if tail == queue.head.load(Ordering::Acquire) {
            return None;
        }
        // The acquire on `head` makes the producer's write to this slot
        // visible; the producer leaves it alone until `tail` moves past it.
        let item = unsafe { (*queue.buffer[tail].get()).assume_init_read() };
        queue.tail.store((tail + 1) & CommandQueue::<T, N>::MASK, Ordering::Release);
        Some(item)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
