//! Ring buffer that grows by a fixed increment when full.
//!
//! Growth replaces the backing store: a new store `increment` slots larger
//! is allocated, the live elements are compacted to index 0 in FIFO order,
//! and the storage handle is swapped with the consumer held out. The
//! increment is always the original starting capacity, so a buffer started
//! at 3 expands to 6, 9, 12 and so on.
//!
//! # Example
//!
//! ```
//! use carousel::GrowableRingBuffer;
//!
//! let mut buf = GrowableRingBuffer::new(2)?;
//! buf.put(1);
//! buf.put(2);
//! buf.put(3); // full: grows to capacity 4
//! assert_eq!(buf.capacity(), 4);
//! assert_eq!(buf.get()?, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{BufferEmpty, BufferFull, CopyError, InvalidCapacity};
use crate::ring::OverflowPolicy;
use crate::ring::core::RingCore;
use crate::ring::fixed::{Consumer, PhantomUnsync};
use crate::ring::snapshot::Snapshot;

/// Capacity used by [`GrowableRingBuffer::default`].
pub const DEFAULT_CAPACITY: usize = 4;

/// A circular buffer that reallocates instead of rejecting or overwriting.
///
/// Inserts into a buffer with room are allocation-free; only the full-buffer
/// path allocates. Retrieval is the strict-capacity behavior unchanged.
pub struct GrowableRingBuffer<T> {
    core: RingCore<T>,
    increment: usize,
    _unsync: PhantomUnsync,
}

impl<T> GrowableRingBuffer<T> {
    /// Creates a buffer with the given starting capacity, which is also
    /// recorded as the growth increment.
    ///
    /// # Errors
    ///
    /// Fails with [`InvalidCapacity`] if `start_capacity` is zero.
    pub fn new(start_capacity: usize) -> Result<Self, InvalidCapacity> {
        if start_capacity == 0 {
            return Err(InvalidCapacity);
        }
        Ok(Self {
            core: RingCore::new(start_capacity, OverflowPolicy::Reject),
            increment: start_capacity,
            _unsync: PhantomData,
        })
    }

    /// Adds an item at the tail of the buffer, growing it if full.
    ///
    /// Never fails; a full buffer triggers a reallocation by
    /// [`increment`](Self::increment) slots before the insert.
    pub fn put(&mut self, item: T) {
        // SAFETY: `&mut self` - this thread is the only producer, and the
        // growth section cannot race itself.
        unsafe { self.core.push_growing(item, self.increment) }
    }

    /// Bounded insert: fails instead of growing.
    ///
    /// # Errors
    ///
    /// Fails with [`BufferFull`] on a full buffer, handing the item back.
    /// Capacity is never changed by this operation.
    pub fn try_put(&mut self, item: T) -> Result<(), BufferFull<T>> {
        // SAFETY: `&mut self` - this thread is the only producer.
        unsafe { self.core.push(item) }
    }

    /// Retrieves the oldest item.
    ///
    /// # Errors
    ///
    /// Fails with [`BufferEmpty`] when no elements are live.
    pub fn get(&mut self) -> Result<T, BufferEmpty> {
        // SAFETY: `&mut self` - this thread is the only consumer.
        unsafe { self.core.pop() }
    }

    /// Number of live elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Current number of slots; increases on growth.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// The fixed number of slots added on each growth.
    #[must_use]
    pub fn increment(&self) -> usize {
        self.increment
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Resets every slot to empty and zeroes the cursors. Capacity keeps its
    /// grown value.
    pub fn clear(&mut self) {
        self.core.clear();
    }

    /// Whether an equal element is live in the buffer.
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        // SAFETY: on an unsplit buffer every mutating operation takes
        // `&mut self`, so `&self` rules out concurrent mutation.
        unsafe { self.core.contains(item) }
    }

    /// Removes the first occurrence of `item` in FIFO order.
    pub fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.core.remove(item)
    }

    /// Clones the live elements into `dest` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails if the destination cannot hold [`len`](Self::len) elements past
    /// `offset`; `dest` is untouched on error.
    pub fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<(), CopyError>
    where
        T: Clone,
    {
        // SAFETY: `&self` on an unsplit buffer rules out concurrent mutation.
        unsafe { self.core.copy_to(dest, offset) }
    }

    /// Iterates over a point-in-time snapshot of the live elements in FIFO
    /// order. Each call takes a fresh snapshot.
    #[must_use]
    pub fn iter(&self) -> Snapshot<T>
    where
        T: Clone,
    {
        Snapshot::new(self.to_vec())
    }

    /// Clones the live elements into a vector in FIFO order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        // SAFETY: `&self` on an unsplit buffer rules out concurrent mutation.
        unsafe { self.core.snapshot() }
    }

    /// Splits the buffer into its producer and consumer ends.
    ///
    /// The producer end keeps the growing insert; the consumer end is the
    /// same type the strict-capacity buffer yields, since retrieval is
    /// unchanged by growth.
    #[must_use]
    pub fn split(self) -> (GrowingProducer<T>, Consumer<T>)
    where
        T: Send,
    {
        let increment = self.increment;
        let core = Arc::new(self.core);
        (
            GrowingProducer {
                core: Arc::clone(&core),
                increment,
                _unsync: PhantomData,
            },
            Consumer::new(core),
        )
    }
}

impl<T> Default for GrowableRingBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY).expect("default capacity is positive")
    }
}

impl<'a, T: Clone> IntoIterator for &'a GrowableRingBuffer<T> {
    type Item = T;
    type IntoIter = Snapshot<T>;

    fn into_iter(self) -> Snapshot<T> {
        self.iter()
    }
}

/// Write end of a split growable buffer.
///
/// See [`Producer`](crate::ring::fixed::Producer) for thread safety details
/// (same semantics apply: `Send`, not `Sync`, one per buffer).
pub struct GrowingProducer<T: Send> {
    core: Arc<RingCore<T>>,
    increment: usize,
    _unsync: PhantomUnsync,
}

impl<T: Send> GrowingProducer<T> {
    /// Adds an item at the tail of the buffer, growing it if full.
    ///
    /// Growth briefly coordinates with the consumer while the storage handle
    /// is swapped; steady-state inserts never block.
    #[inline]
    pub fn put(&self, item: T) {
        // SAFETY: producer handles are unique and !Sync, so this thread is
        // the single producer; the growth section mutex serializes growth.
        unsafe { self.core.push_growing(item, self.increment) }
    }

    /// Bounded insert: fails with [`BufferFull`] instead of growing.
    #[inline]
    pub fn try_put(&self, item: T) -> Result<(), BufferFull<T>> {
        // SAFETY: as for `put`.
        unsafe { self.core.push(item) }
    }

    /// The fixed number of slots added on each growth.
    #[must_use]
    pub fn increment(&self) -> usize {
        self.increment
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.core.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }
}
