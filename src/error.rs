//! Error types returned by [`IndexedSlotQueue`](crate::IndexedSlotQueue).

use core::fmt;

use thiserror::Error;

/// Reasons a queue operation can fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
  /// Every slot is occupied.
  #[error("queue is full (capacity {capacity})")]
  Full {
    /// Fixed slot count of the queue.
    capacity: usize,
  },

  /// The item's identity does not fit in the identity table.
  #[error("identity {key} is outside the key domain 0..{key_bound}")]
  KeyOutOfRange {
    /// The rejected identity.
    key: usize,
    /// Length of the identity table.
    key_bound: usize,
  },

  /// The requested capacity or key bound cannot be represented or allocated.
  #[error("invalid capacity")]
  InvalidCapacity,
}

/// A rejected [`enqueue`](crate::IndexedSlotQueue::enqueue).
///
/// Ownership of the item is handed back so the caller can retry, reroute or
/// drop it.
#[derive(Clone, PartialEq, Eq)]
pub struct PushError<T> {
  kind: QueueError,
  value: T,
}

impl<T> PushError<T> {
  pub(crate) fn new(kind: QueueError, value: T) -> Self {
    PushError { kind, value }
  }

  /// Why the item was rejected.
  #[inline]
  pub fn kind(&self) -> QueueError {
    self.kind
  }

  /// Borrows the rejected item.
  #[inline]
  pub fn value(&self) -> &T {
    &self.value
  }

  /// Recovers the rejected item.
  #[inline]
  pub fn into_inner(self) -> T {
    self.value
  }
}

// Hand-written so `T` does not need `Debug` for the error to be printable.
impl<T> fmt::Debug for PushError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PushError")
      .field("kind", &self.kind)
      .finish_non_exhaustive()
  }
}

impl<T> fmt::Display for PushError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.kind, f)
  }
}

impl<T> core::error::Error for PushError<T> {
  fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
    Some(&self.kind)
  }
}
