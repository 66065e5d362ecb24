//! Fixed-capacity and growable circular buffers for single-producer /
//! single-consumer pipelines.
//!
//! # Overview
//!
//! - [`FixedRingBuffer`] - strict capacity; a full buffer rejects the insert
//!   or overwrites the oldest element, chosen by [`OverflowPolicy`]
//! - [`GrowableRingBuffer`] - reallocates by a fixed increment (the original
//!   starting capacity) when full
//! - `split()` turns either buffer into a pair of `Send + !Sync` endpoint
//!   handles for lock-free use across two threads
//!
//! Steady-state `put`/`get` are allocation-free and lock-free: slot contents
//! are published through acquire/release operations on the element counter.
//! Only buffer growth (and overwrite-eviction) briefly coordinates with the
//! consumer while the backing store is rewritten.
//!
//! # Example
//!
//! ```
//! use carousel::{FixedRingBuffer, OverflowPolicy};
//!
//! let (producer, consumer) = FixedRingBuffer::new(64, OverflowPolicy::Reject)?.split();
//!
//! let feeder = std::thread::spawn(move || {
//!     for i in 0..100u64 {
//!         let mut item = i;
//!         // Busy-poll on a full buffer; the error hands the item back.
//!         while let Err(full) = producer.put(item) {
//!             item = full.into_inner();
//!             std::hint::spin_loop();
//!         }
//!     }
//! });
//!
//! let mut received = 0;
//! while received < 100 {
//!     if consumer.get().is_ok() {
//!         received += 1;
//!     } else {
//!         std::hint::spin_loop();
//!     }
//! }
//! feeder.join().unwrap();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod ring;
pub(crate) mod sync;
mod trace;

pub use error::{BufferEmpty, BufferFull, CopyError, InvalidCapacity};
pub use ring::OverflowPolicy;
pub use ring::fixed::{Consumer, FixedRingBuffer, Producer};
pub use ring::growable::{DEFAULT_CAPACITY, GrowableRingBuffer, GrowingProducer};
pub use ring::snapshot::Snapshot;
pub use trace::init_tracing;
