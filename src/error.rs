//! Error types for buffer construction and access.
//!
//! Every recoverable error leaves the buffer unchanged; retry policy belongs
//! to the caller.

use thiserror::Error;

/// Construction was given a zero capacity.
///
/// Capacities are never silently clamped; the constructor fails instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("capacity must be greater than zero")]
pub struct InvalidCapacity;

/// The buffer is full and the insert was rejected.
///
/// Carries the rejected item so the caller can retry or drop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ring buffer is full")]
pub struct BufferFull<T>(pub T);

impl<T> BufferFull<T> {
    /// Recovers the item that could not be inserted.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// `get` was called on an empty buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ring buffer is empty")]
pub struct BufferEmpty;

/// The destination passed to `copy_to` cannot hold the live elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CopyError {
    /// The starting offset lies past the end of the destination.
    #[error("offset {offset} is out of range for a destination of length {len}")]
    OffsetOutOfRange { offset: usize, len: usize },
    /// The destination has too little room past the offset.
    #[error("destination has room for {available} elements, {needed} required")]
    InsufficientDestination { needed: usize, available: usize },
}
