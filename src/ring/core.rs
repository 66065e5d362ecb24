//! Core circular buffer algorithm shared by the fixed and growable flavors.
//!
//! The buffer owns a heap store of slots reached through an atomically
//! published handle, plus `head`/`tail` cursors and a live-element counter.
//! Slot contents are plain (non-atomic) memory; publication happens through
//! the counter: the producer writes a slot and then releases `len`, the
//! consumer acquires `len` before reading, and the reverse edge (slot
//! cleared, then `len` decremented) tells the producer a slot is reusable.
//!
//! Growth swaps the store handle. The handle alone does not make freeing the
//! old store safe, so growth and overwrite-eviction additionally hold the
//! consumer out through the [`QuiesceGate`] while they rewrite shared state.
//!
//! # Safety
//!
//! `push`, `pop` and the scan operations have unsafe APIs because they
//! require the caller to uphold the access contract: exactly one producer
//! and one consumer for the cursor operations, full exclusivity for the
//! scans and multi-slot rewrites. The safe wrappers in
//! [`fixed`](crate::ring::fixed) and [`growable`](crate::ring::growable)
//! discharge these contracts through `&mut self` receivers and `!Sync`
//! endpoint handles.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::Mutex;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering, fence};

use crate::error::{BufferEmpty, BufferFull, CopyError};
use crate::ring::OverflowPolicy;
use crate::sync::gate::QuiesceGate;
use crate::trace;

/// A single slot: either a live element or the empty marker.
///
/// Clearing a slot (writing `None`) drops the evicted element in place, so
/// consumed or overwritten values never linger in the store.
struct Slot<T> {
    value: UnsafeCell<Option<T>>,
}

impl<T> Slot<T> {
    const fn new() -> Self {
        Self {
            value: UnsafeCell::new(None),
        }
    }
}

/// One backing store. Replaced wholesale on growth, never resized in place.
struct Store<T> {
    slots: Box<[Slot<T>]>,
}

impl<T> Store<T> {
    fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Slot::new()).collect();
        Self { slots }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Producer-side cursor: index of the next free slot to write.
#[repr(C)]
#[repr(align(64))]
struct ProducerState {
    /// Owned by the producer; read by eviction/growth inside the gate.
    tail: AtomicUsize,
}

/// Consumer-side cursor: index of the oldest live element.
#[repr(C)]
#[repr(align(64))]
struct ConsumerState {
    /// Owned by the consumer; rewritten by eviction/growth inside the gate.
    head: AtomicUsize,
}

/// Counters both sides touch, on their own cache line.
#[repr(C)]
#[repr(align(64))]
struct SharedState {
    /// Live element count; the publication edge for slot contents.
    len: AtomicUsize,
    /// Current store capacity, readable without dereferencing the handle.
    cap: AtomicUsize,
}

/// The circular buffer algorithm. See the module docs for the access contract.
pub(crate) struct RingCore<T> {
    producer: ProducerState,
    consumer: ConsumerState,
    shared: SharedState,

    /// Atomically published handle to the current store. Swapped only by
    /// growth, with the consumer quiesced; read under acquire everywhere.
    store: AtomicPtr<Store<T>>,

    /// Holds the consumer out of `pop` while a writer rewrites shared state.
    gate: QuiesceGate,

    /// Serialized growth section: fullness is re-validated under this lock
    /// before a reallocation is committed.
    growth: Mutex<()>,

    policy: OverflowPolicy,

    _marker: PhantomData<T>,
}

// SAFETY: RingCore owns the store behind the raw pointer. Moving it between
// threads moves the T elements, hence T: Send. Sharing &RingCore is safe
// because slot access is mediated by the SPSC protocol (len publication) and
// the quiesce gate; no operation hands out a &T, so T: Sync is not required.
unsafe impl<T: Send> Send for RingCore<T> {}
unsafe impl<T: Send> Sync for RingCore<T> {}

impl<T> RingCore<T> {
    /// Creates a core with the given capacity and overflow policy.
    ///
    /// Callers validate the capacity; zero slots is a constructor error one
    /// level up.
    pub(crate) fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        let store = Box::into_raw(Box::new(Store::new(capacity)));
        Self {
            producer: ProducerState {
                tail: AtomicUsize::new(0),
            },
            consumer: ConsumerState {
                head: AtomicUsize::new(0),
            },
            shared: SharedState {
                len: AtomicUsize::new(0),
                cap: AtomicUsize::new(capacity),
            },
            store: AtomicPtr::new(store),
            gate: QuiesceGate::new(),
            growth: Mutex::new(()),
            policy,
            _marker: PhantomData,
        }
    }

    /// Advances a cursor to the next slot index, wrapping to 0 at capacity.
    ///
    /// Equivalent to `(cursor + 1) % cap` without the division instruction.
    #[inline]
    const fn bump(cursor: usize, cap: usize) -> usize {
        let next = cursor + 1;
        if next == cap { 0 } else { next }
    }

    /// Dereferences the store handle.
    ///
    /// # Safety
    ///
    /// The caller must guarantee the store cannot be replaced and freed while
    /// the reference is live: be the producer (the only thread that swaps),
    /// hold a reader token, or have exclusive access to the buffer.
    #[inline]
    unsafe fn store_ref(&self) -> &Store<T> {
        unsafe { &*self.store.load(Ordering::Acquire) }
    }

    pub(crate) fn len(&self) -> usize {
        self.shared.len.load(Ordering::Acquire)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.shared.cap.load(Ordering::Acquire)
    }

    pub(crate) fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Plain insert into a buffer with room: write the slot, then publish.
    ///
    /// # Safety
    ///
    /// Single producer; `len < capacity` established by the caller.
    #[inline]
    unsafe fn insert(&self, item: T, store: &Store<T>, cap: usize) {
        let tail = self.producer.tail.load(Ordering::Relaxed);
        // SAFETY: the producer owns the slot at `tail`: the fullness check
        // guarantees the consumer is not reading it, and the counter update
        // that exposes it to the consumer comes after this write.
        unsafe {
            *store.slots[tail].value.get() = Some(item);
        }
        self.producer.tail.store(Self::bump(tail, cap), Ordering::Release);
        self.shared.len.fetch_add(1, Ordering::Release);
    }

    /// Attempts to insert an item, honoring the overflow policy on a full
    /// buffer.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread calls producer-side operations
    /// (`push`, `push_growing`) at a time.
    pub(crate) unsafe fn push(&self, item: T) -> Result<(), BufferFull<T>> {
        // Acquire pairs with the consumer's len decrement: a slot the
        // consumer vacated is fully cleared before the producer reuses it.
        let len = self.shared.len.load(Ordering::Acquire);
        // SAFETY: only the producer swaps the store, and we are the producer.
        let store = unsafe { self.store_ref() };
        let cap = store.capacity();

        if len == cap {
            return match self.policy {
                OverflowPolicy::Reject => Err(BufferFull(item)),
                OverflowPolicy::Overwrite => {
                    // SAFETY: single producer, per this function's contract.
                    unsafe { self.push_overwriting(item, store) };
                    Ok(())
                }
            };
        }

        // SAFETY: single producer, and len < cap was just established. The
        // consumer can only decrease len concurrently, so room remains.
        unsafe { self.insert(item, store, cap) };
        Ok(())
    }

    /// Full-buffer insert under the overwrite policy: evict the oldest
    /// element, then write the new one. Net no-op on the count.
    ///
    /// Eviction rewrites the consumer-owned head cursor and clears the slot
    /// the consumer would read next, so it runs with the consumer held out.
    ///
    /// # Safety
    ///
    /// Single producer.
    unsafe fn push_overwriting(&self, item: T, store: &Store<T>) {
        let _excl = self.gate.exclusive();
        let cap = store.capacity();

        // The consumer may have drained an element between the fullness
        // check and gate acquisition; re-check with a fresh count.
        let len = self.shared.len.load(Ordering::Acquire);
        if len < cap {
            // SAFETY: single producer, room available.
            unsafe { self.insert(item, store, cap) };
            return;
        }

        let head = self.consumer.head.load(Ordering::Relaxed);
        trace::trace!(evicted_index = head, "overwriting oldest element");
        // SAFETY: the consumer is quiesced for the lifetime of `_excl`, so
        // the producer has exclusive access to the head slot and cursor.
        unsafe {
            *store.slots[head].value.get() = None;
        }
        self.consumer.head.store(Self::bump(head, cap), Ordering::Release);

        let tail = self.producer.tail.load(Ordering::Relaxed);
        // SAFETY: as above; on a full buffer head == tail, and both cursors
        // are now exclusively ours until the gate reopens.
        unsafe {
            *store.slots[tail].value.get() = Some(item);
        }
        self.producer.tail.store(Self::bump(tail, cap), Ordering::Release);
        // len unchanged: one element evicted, one inserted.
    }

    /// Inserts an item, growing the store by `increment` slots if full.
    ///
    /// # Safety
    ///
    /// Same contract as [`push`](Self::push): single producer.
    pub(crate) unsafe fn push_growing(&self, item: T, increment: usize) {
        let len = self.shared.len.load(Ordering::Acquire);
        // SAFETY: we are the producer; the store cannot move under us.
        let store = unsafe { self.store_ref() };
        let cap = store.capacity();

        if len < cap {
            // Fast path: no growth, no lock.
            // SAFETY: single producer, room available.
            unsafe { self.insert(item, store, cap) };
            return;
        }

        let _section = self.growth.lock().expect("growth section poisoned");
        // Re-validate against fresh state: the buffer may have stopped being
        // full between the snapshot above and entering the section.
        let len = self.shared.len.load(Ordering::Acquire);
        let cap = self.shared.cap.load(Ordering::Acquire);
        if len == cap {
            // SAFETY: single producer, growth section held.
            unsafe { self.grow(increment) };
        }

        // Room is now guaranteed: either the capacity grew or the consumer
        // drained an element. The consumer can only make more room.
        // SAFETY: single producer.
        let store = unsafe { self.store_ref() };
        unsafe { self.insert(item, store, store.capacity()) };
    }

    /// Replaces the store with one `increment` slots larger, compacting the
    /// live window to index 0.
    ///
    /// # Safety
    ///
    /// Single producer, growth section held.
    unsafe fn grow(&self, increment: usize) {
        let excl = self.gate.exclusive();

        let old_ptr = self.store.load(Ordering::Acquire);
        // SAFETY: only this thread swaps the store (producer + section held).
        let old = unsafe { &*old_ptr };
        let old_cap = old.capacity();
        let new_cap = old_cap + increment;

        // The consumer is quiesced, so head and len are stable here.
        let len = self.shared.len.load(Ordering::Acquire);
        let head = self.consumer.head.load(Ordering::Acquire);

        let new = Store::new(new_cap);
        for i in 0..len {
            let src = (head + i) % old_cap;
            // SAFETY: exclusive access to both stores; take() clears each
            // old slot as its element moves over.
            unsafe {
                let moved = (*old.slots[src].value.get()).take();
                *new.slots[i].value.get() = moved;
            }
        }

        self.consumer.head.store(0, Ordering::Relaxed);
        self.producer.tail.store(len, Ordering::Relaxed);
        self.shared.cap.store(new_cap, Ordering::Release);
        self.store
            .store(Box::into_raw(Box::new(new)), Ordering::Release);
        // Everything above must be visible before the gate reopens.
        fence(Ordering::SeqCst);

        trace::debug!(old_cap, new_cap, live = len, "grew ring buffer");

        // SAFETY: the consumer is held out until `excl` drops and re-reads
        // the handle on its next entry, so no reference into the old store
        // can exist past this point.
        unsafe { drop(Box::from_raw(old_ptr)) };
        drop(excl);
    }

    /// Retrieves the oldest element: capture the value, clear the slot, then
    /// advance the cursor and counter.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread calls `pop` at a time.
    pub(crate) unsafe fn pop(&self) -> Result<T, BufferEmpty> {
        let _token = self.gate.enter();

        if self.shared.len.load(Ordering::Acquire) == 0 {
            return Err(BufferEmpty);
        }
        // SAFETY: the reader token holds writers out, so the store cannot be
        // swapped and freed while this reference is live.
        let store = unsafe { self.store_ref() };
        let cap = store.capacity();
        let head = self.consumer.head.load(Ordering::Relaxed);

        // SAFETY: len > 0 means the slot at head is a published live element
        // the producer will not touch until the counter drops below capacity.
        let item = unsafe { (*store.slots[head].value.get()).take() }
            .expect("live slot inside the logical window holds a value");

        self.consumer.head.store(Self::bump(head, cap), Ordering::Release);
        self.shared.len.fetch_sub(1, Ordering::Release);
        Ok(item)
    }

    /// Resets every slot to empty and zeroes the cursors.
    pub(crate) fn clear(&mut self) {
        // SAFETY: `&mut self` means no other reference to the store exists.
        let store = unsafe { &mut *(*self.store.get_mut()) };
        for slot in &mut store.slots {
            *slot.value.get_mut() = None;
        }
        *self.consumer.head.get_mut() = 0;
        *self.producer.tail.get_mut() = 0;
        *self.shared.len.get_mut() = 0;
        trace::trace!("cleared ring buffer");
    }

    /// Linear scan of the logical window for an equal element.
    ///
    /// # Safety
    ///
    /// No concurrent mutation: the caller must hold the buffer exclusively.
    pub(crate) unsafe fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let len = self.shared.len.load(Ordering::Acquire);
        let head = self.consumer.head.load(Ordering::Acquire);
        // SAFETY: exclusivity per this function's contract.
        let store = unsafe { self.store_ref() };
        let cap = store.capacity();

        (0..len).any(|i| {
            // SAFETY: slots in the logical window are live; no one else is
            // touching them per the exclusivity contract.
            let slot = unsafe { &*store.slots[(head + i) % cap].value.get() };
            slot.as_ref() == Some(item)
        })
    }

    /// Clones the logical window into `dest` starting at `offset`.
    ///
    /// # Safety
    ///
    /// No concurrent mutation: the caller must hold the buffer exclusively.
    pub(crate) unsafe fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<(), CopyError>
    where
        T: Clone,
    {
        let len = self.shared.len.load(Ordering::Acquire);
        let head = self.consumer.head.load(Ordering::Acquire);

        if offset > dest.len() {
            return Err(CopyError::OffsetOutOfRange {
                offset,
                len: dest.len(),
            });
        }
        let available = dest.len() - offset;
        if available < len {
            return Err(CopyError::InsufficientDestination {
                needed: len,
                available,
            });
        }

        // SAFETY: exclusivity per this function's contract.
        let store = unsafe { self.store_ref() };
        let cap = store.capacity();
        for i in 0..len {
            // SAFETY: slots in the logical window are live.
            let slot = unsafe { &*store.slots[(head + i) % cap].value.get() };
            dest[offset + i] = slot
                .clone()
                .expect("live slot inside the logical window holds a value");
        }
        Ok(())
    }

    /// Clones the logical window into a fresh vector in FIFO order.
    ///
    /// # Safety
    ///
    /// No concurrent mutation: the caller must hold the buffer exclusively.
    pub(crate) unsafe fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        let len = self.shared.len.load(Ordering::Acquire);
        let head = self.consumer.head.load(Ordering::Acquire);
        // SAFETY: exclusivity per this function's contract.
        let store = unsafe { self.store_ref() };
        let cap = store.capacity();

        (0..len)
            .map(|i| {
                // SAFETY: slots in the logical window are live.
                let slot = unsafe { &*store.slots[(head + i) % cap].value.get() };
                slot.clone()
                    .expect("live slot inside the logical window holds a value")
            })
            .collect()
    }

    /// Removes the first logical occurrence of `item`, shifting every
    /// subsequent element one position earlier and stepping `tail` back.
    ///
    /// `tail == (head + len) % cap` holds at every operation boundary, so the
    /// slot vacated by the shift is always `tail - 1` regardless of where in
    /// the window the match sat.
    pub(crate) fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let len = *self.shared.len.get_mut();
        let head = *self.consumer.head.get_mut();
        // SAFETY: `&mut self` means no other reference to the store exists.
        let store = unsafe { &mut *(*self.store.get_mut()) };
        let cap = store.capacity();

        let found = (0..len).find(|i| {
            let slot = store.slots[(head + i) % cap].value.get_mut();
            slot.as_ref() == Some(item)
        });
        let Some(at) = found else {
            return false;
        };

        // Drop the matched element, then close the gap.
        *store.slots[(head + at) % cap].value.get_mut() = None;
        for i in at..len - 1 {
            let next = store.slots[(head + i + 1) % cap].value.get_mut().take();
            *store.slots[(head + i) % cap].value.get_mut() = next;
        }

        let tail = *self.producer.tail.get_mut();
        *self.producer.tail.get_mut() = (tail + cap - 1) % cap;
        *self.shared.len.get_mut() = len - 1;
        true
    }
}

impl<T> Drop for RingCore<T> {
    fn drop(&mut self) {
        // SAFETY: exclusive access; the handle always points at a live store,
        // and dropping it frees the slots along with any live elements.
        unsafe { drop(Box::from_raw(*self.store.get_mut())) };
    }
}
