//! Strict-capacity ring buffer: reject or overwrite on full.
//!
//! # Overview
//!
//! - [`FixedRingBuffer`] - owned buffer; mutations take `&mut self`
//! - [`Producer`] / [`Consumer`] - split endpoint handles for SPSC use
//!   across threads (single producer per buffer, single consumer per buffer)
//!
//! # Example
//!
//! ```
//! use carousel::{FixedRingBuffer, OverflowPolicy};
//!
//! let mut buf = FixedRingBuffer::new(4, OverflowPolicy::Reject)?;
//! buf.put("a")?;
//! buf.put("b")?;
//! assert_eq!(buf.get()?, "a");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{BufferEmpty, BufferFull, CopyError, InvalidCapacity};
use crate::ring::OverflowPolicy;
use crate::ring::core::RingCore;
use crate::ring::snapshot::Snapshot;

/// Marker type to opt-out of `Sync` while remaining `Send`.
pub(crate) type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// A circular buffer with fixed capacity.
///
/// A full buffer either rejects the insert or evicts its oldest element,
/// depending on the [`OverflowPolicy`] chosen at construction. Capacity
/// never changes; steady-state operation allocates nothing.
///
/// The owned form is `Send` but not `Sync`: every operation runs from the
/// owning thread, and the borrow checker supplies the exclusivity the scan
/// and rewrite operations require. Use [`split`](Self::split) to hand the
/// two ends to different threads.
pub struct FixedRingBuffer<T> {
    core: RingCore<T>,
    _unsync: PhantomUnsync,
}

impl<T> FixedRingBuffer<T> {
    /// Creates a buffer with the given capacity and overflow policy.
    ///
    /// # Errors
    ///
    /// Fails with [`InvalidCapacity`] if `capacity` is zero. The capacity is
    /// never clamped.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Result<Self, InvalidCapacity> {
        if capacity == 0 {
            return Err(InvalidCapacity);
        }
        Ok(Self {
            core: RingCore::new(capacity, policy),
            _unsync: PhantomData,
        })
    }

    /// Adds an item at the tail of the buffer.
    ///
    /// # Errors
    ///
    /// With [`OverflowPolicy::Reject`], fails on a full buffer and hands the
    /// item back; nothing is mutated. With [`OverflowPolicy::Overwrite`] the
    /// insert always succeeds, evicting the oldest element when full.
    pub fn put(&mut self, item: T) -> Result<(), BufferFull<T>> {
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

    /// Total number of slots.
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

    /// The overflow policy chosen at construction.
    #[must_use]
    pub fn policy(&self) -> OverflowPolicy {
        self.core.policy()
    }

    /// Resets every slot to empty and zeroes the cursors.
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

    /// Removes the first occurrence of `item` in FIFO order, closing the gap
    /// so the remaining elements keep their relative order.
    ///
    /// O(len); not part of the SPSC fast path.
    pub fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.core.remove(item)
    }

    /// Clones the live elements into `dest` starting at `offset`, in FIFO
    /// order.
    ///
    /// # Errors
    ///
    /// Fails if `offset` lies past the end of `dest` or the remaining room
    /// cannot hold [`len`](Self::len) elements; `dest` is untouched on error.
    pub fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<(), CopyError>
    where
        T: Clone,
    {
        // SAFETY: `&self` on an unsplit buffer rules out concurrent mutation.
        unsafe { self.core.copy_to(dest, offset) }
    }

    /// Iterates over a point-in-time snapshot of the live elements in FIFO
    /// order.
    ///
    /// Each call takes a fresh snapshot; mutating the buffer afterwards does
    /// not affect an already-taken one.
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
    /// The handles can be moved to different threads; each is `Send` but not
    /// `Sync`, so at most one thread produces and one consumes at a time.
    #[must_use]
    pub fn split(self) -> (Producer<T>, Consumer<T>)
    where
        T: Send,
    {
        let core = Arc::new(self.core);
        (Producer::new(Arc::clone(&core)), Consumer::new(core))
    }
}

impl<'a, T: Clone> IntoIterator for &'a FixedRingBuffer<T> {
    type Item = T;
    type IntoIter = Snapshot<T>;

    fn into_iter(self) -> Snapshot<T> {
        self.iter()
    }
}

/// Write end of a split ring buffer.
///
/// Only one producer exists per buffer.
///
/// # Thread Safety
///
/// `Producer` is [`Send`] but **not** [`Sync`]:
/// - Can transfer ownership to another thread
/// - Cannot share `&Producer` (no concurrent `put()`)
pub struct Producer<T: Send> {
    core: Arc<RingCore<T>>,
    _unsync: PhantomUnsync,
}

impl<T: Send> Producer<T> {
    pub(crate) fn new(core: Arc<RingCore<T>>) -> Self {
        Self {
            core,
            _unsync: PhantomData,
        }
    }

    /// Adds an item at the tail of the buffer.
    ///
    /// # Errors
    ///
    /// In reject mode, fails on a full buffer and hands the item back for
    /// retry. In overwrite mode the insert always succeeds; eviction briefly
    /// coordinates with the consumer.
    #[inline]
    pub fn put(&self, item: T) -> Result<(), BufferFull<T>> {
        // SAFETY: producer handles are unique and !Sync, so this thread is
        // the single producer; consumer coordination happens in the core.
        unsafe { self.core.push(item) }
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

/// Read end of a split ring buffer.
///
/// Only one consumer exists per buffer. See [`Producer`] for thread safety
/// details (same semantics apply).
pub struct Consumer<T: Send> {
    core: Arc<RingCore<T>>,
    _unsync: PhantomUnsync,
}

impl<T: Send> Consumer<T> {
    pub(crate) fn new(core: Arc<RingCore<T>>) -> Self {
        Self {
            core,
            _unsync: PhantomData,
        }
    }

    /// Retrieves the oldest item.
    ///
    /// # Errors
    ///
    /// Fails with [`BufferEmpty`] when no elements are live; callers
    /// implement their own backoff around it.
    #[inline]
    pub fn get(&self) -> Result<T, BufferEmpty> {
        // SAFETY: consumer handles are unique and !Sync, so this thread is
        // the single consumer.
        unsafe { self.core.pop() }
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject(capacity: usize) -> FixedRingBuffer<u64> {
        FixedRingBuffer::new(capacity, OverflowPolicy::Reject).unwrap()
    }

    #[test]
    fn test_basic_put_get() {
        let mut buf = reject(8);
        buf.put(42).unwrap();
        assert_eq!(buf.get(), Ok(42));
        assert_eq!(buf.get(), Err(BufferEmpty));
    }

    #[test]
    fn test_fifo_order() {
        let mut buf = reject(16);
        for i in 0..10 {
            buf.put(i).unwrap();
        }
        for i in 0..10 {
            assert_eq!(buf.get(), Ok(i), "incorrect sequence");
        }
        assert_eq!(buf.get(), Err(BufferEmpty));
    }

    #[test]
    fn test_put_increments_len() {
        let mut buf = reject(32);
        for i in 0..32 {
            buf.put(i).unwrap();
            assert_eq!(buf.len(), (i + 1) as usize);
        }
    }

    #[test]
    fn test_get_decrements_len() {
        let mut buf = reject(32);
        for i in 0..32 {
            buf.put(i).unwrap();
        }
        for i in (0..32usize).rev() {
            buf.get().unwrap();
            assert_eq!(buf.len(), i);
        }
    }

    #[test]
    fn test_reject_when_full() {
        let mut buf = reject(4);
        for i in 0..4 {
            buf.put(i).unwrap();
        }
        assert!(buf.is_full());

        // The rejected item comes back and nothing changes.
        let err = buf.put(999).unwrap_err();
        assert_eq!(err.into_inner(), 999);
        assert_eq!(buf.len(), 4);

        assert_eq!(buf.get(), Ok(0));
        buf.put(4).unwrap();
        assert!(buf.put(1000).is_err());
    }

    #[test]
    fn test_overwrite_evicts_oldest() {
        let mut buf = FixedRingBuffer::new(3, OverflowPolicy::Overwrite).unwrap();
        for i in 1..=4 {
            buf.put(i).unwrap();
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.get(), Ok(2));
        assert_eq!(buf.get(), Ok(3));
        assert_eq!(buf.get(), Ok(4));
        assert_eq!(buf.get(), Err(BufferEmpty));
    }

    #[test]
    fn test_overwrite_capacity_one() {
        let mut buf = FixedRingBuffer::new(1, OverflowPolicy::Overwrite).unwrap();
        buf.put(1).unwrap();
        buf.put(2).unwrap();
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.get(), Ok(2));
    }

    #[test]
    fn test_wrapping_behavior() {
        let mut buf = reject(4);
        for round in 0..5 {
            for i in 0..4 {
                buf.put(round * 10 + i).unwrap();
            }
            for i in 0..4 {
                assert_eq!(buf.get(), Ok(round * 10 + i));
            }
            assert_eq!(buf.get(), Err(BufferEmpty));
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            FixedRingBuffer::<u64>::new(0, OverflowPolicy::Reject).unwrap_err(),
            InvalidCapacity
        );
    }

    #[test]
    fn test_clear() {
        let mut buf = reject(8);
        for i in 0..5 {
            buf.put(i).unwrap();
        }
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.get(), Err(BufferEmpty));

        // The buffer stays fully usable afterwards.
        buf.put(7).unwrap();
        assert_eq!(buf.get(), Ok(7));
    }

    #[test]
    fn test_contains() {
        let mut buf = reject(8);
        buf.put(10).unwrap();
        assert!(!buf.contains(&11));
        buf.put(11).unwrap();
        assert!(buf.contains(&11));
        buf.get().unwrap();
        buf.get().unwrap();
        assert!(!buf.contains(&11));
    }

    #[test]
    fn test_copy_to_with_offset() {
        let mut buf = reject(8);
        for i in 1..=5 {
            buf.put(i).unwrap();
        }
        let mut dest = [0u64; 6];
        buf.copy_to(&mut dest, 1).unwrap();
        assert_eq!(dest, [0, 1, 2, 3, 4, 5]);
        // The buffer itself is untouched by the copy.
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_copy_to_insufficient_destination() {
        let mut buf = reject(8);
        for i in 0..5 {
            buf.put(i).unwrap();
        }
        let mut dest = [0u64; 4];
        assert_eq!(
            buf.copy_to(&mut dest, 0),
            Err(CopyError::InsufficientDestination {
                needed: 5,
                available: 4,
            })
        );
        assert_eq!(dest, [0; 4]);
    }

    #[test]
    fn test_copy_to_offset_out_of_range() {
        let mut buf = reject(4);
        buf.put(1).unwrap();
        let mut dest = [0u64; 2];
        assert_eq!(
            buf.copy_to(&mut dest, 3),
            Err(CopyError::OffsetOutOfRange { offset: 3, len: 2 })
        );
    }

    #[test]
    fn test_remove_middle_preserves_order() {
        let mut buf = reject(5);
        for i in 1..=5 {
            buf.put(i).unwrap();
        }
        assert!(buf.remove(&3));
        assert_eq!(buf.len(), 4);
        assert!(!buf.contains(&3));

        // The freed slot is reusable and FIFO order holds across it.
        buf.put(6).unwrap();
        for expected in [1, 2, 4, 5, 6] {
            assert_eq!(buf.get(), Ok(expected));
        }
        assert_eq!(buf.get(), Err(BufferEmpty));
    }

    #[test]
    fn test_remove_sole_element() {
        let mut buf = reject(4);
        buf.put(9).unwrap();
        assert!(buf.remove(&9));
        assert!(buf.is_empty());
        buf.put(1).unwrap();
        assert_eq!(buf.get(), Ok(1));
    }

    #[test]
    fn test_remove_absent() {
        let mut buf = reject(4);
        buf.put(1).unwrap();
        assert!(!buf.remove(&2));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_remove_from_wrapped_window() {
        let mut buf = reject(4);
        // Advance the cursors so the live window wraps the end of the store.
        for i in 0..3 {
            buf.put(i).unwrap();
        }
        buf.get().unwrap();
        buf.get().unwrap();
        for i in 3..6 {
            buf.put(i).unwrap();
        }
        // Window is now [2, 3, 4, 5] with head near the end of the store.
        assert!(buf.remove(&4));
        buf.put(6).unwrap();
        for expected in [2, 3, 5, 6] {
            assert_eq!(buf.get(), Ok(expected));
        }
    }

    #[test]
    fn test_snapshot_is_stable() {
        let mut buf = reject(8);
        for i in 0..4 {
            buf.put(i).unwrap();
        }
        let snap: Vec<u64> = buf.iter().collect();
        assert_eq!(snap, [0, 1, 2, 3]);

        // Mutations after the snapshot was taken do not affect it.
        let mut iter = buf.iter();
        assert_eq!(iter.next(), Some(0));
        buf.get().unwrap();
        buf.put(4).unwrap();
        assert_eq!(iter.collect::<Vec<_>>(), [1, 2, 3]);

        // A fresh snapshot sees the new state.
        assert_eq!(buf.to_vec(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_for_loop_over_reference() {
        let mut buf = reject(4);
        buf.put(1).unwrap();
        buf.put(2).unwrap();
        let mut count = 0;
        for item in &buf {
            count += 1;
            assert!(item == 1 || item == 2);
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_split_basic() {
        let buf = reject(8);
        let (producer, consumer) = buf.split();
        producer.put(42).unwrap();
        assert_eq!(consumer.len(), 1);
        assert_eq!(consumer.get(), Ok(42));
        assert_eq!(consumer.get(), Err(BufferEmpty));
    }

    #[test]
    fn test_split_send_to_thread() {
        let (producer, consumer) = reject(16).split();
        let handle = std::thread::spawn(move || {
            for i in 0..10 {
                producer.put(i).unwrap();
            }
        });
        handle.join().unwrap();
        for i in 0..10 {
            assert_eq!(consumer.get(), Ok(i));
        }
    }

    #[test]
    fn test_non_copy_type() {
        let mut buf = FixedRingBuffer::new(4, OverflowPolicy::Reject).unwrap();
        buf.put("hello".to_string()).unwrap();
        buf.put("world".to_string()).unwrap();
        assert_eq!(buf.get().as_deref(), Ok("hello"));
        assert_eq!(buf.get().as_deref(), Ok("world"));
        assert_eq!(buf.get(), Err(BufferEmpty));
    }

    #[test]
    fn test_live_elements_dropped_with_buffer() {
        use std::sync::Arc;

        let marker = Arc::new(());
        let mut buf = FixedRingBuffer::new(4, OverflowPolicy::Reject).unwrap();
        for _ in 0..3 {
            buf.put(Arc::clone(&marker)).unwrap();
        }
        buf.get().unwrap();
        assert_eq!(Arc::strong_count(&marker), 3);
        drop(buf);
        assert_eq!(Arc::strong_count(&marker), 1);
    }
}
