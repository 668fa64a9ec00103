#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::iter::{self, FusedIterator};

mod error;

pub use error::{PushError, QueueError};

/// Prelude re-exporting the most commonly used items.
pub mod prelude {
  pub use super::{
    Identity, IndexedSlotQueue, PushError, PushResult, QueueError,
  };
}

/// Out-of-band index meaning "no link" in the link tables and "not enqueued"
/// in the identity table.
const NIL: usize = usize::MAX;

/// Allocates a table of exactly `len` entries, failing instead of panicking
/// when the size overflows or the allocator refuses.
fn try_table<V>(
  len: usize,
  fill: impl FnMut() -> V,
) -> Result<Box<[V]>, QueueError> {
  let mut table = Vec::new();
  table
    .try_reserve_exact(len)
    .map_err(|_| QueueError::InvalidCapacity)?;
  table.extend(iter::repeat_with(fill).take(len));
  Ok(table.into_boxed_slice())
}

/// Stable integer identity of a queue member.
///
/// Two items with the same identity are the same member as far as the queue is
/// concerned, whatever their other fields hold. The identity of an item must not
/// change while it is enqueued.
pub trait Identity {
  /// Returns the item's key in the queue's identity domain.
  fn identity(&self) -> usize;
}

macro_rules! impl_identity_for_uint {
  ($($ty:ty),* $(,)?) => {
    $(
      impl Identity for $ty {
        #[inline(always)]
        fn identity(&self) -> usize {
          usize::from(*self)
        }
      }
    )*
  };
}

impl_identity_for_uint!(u8, u16, usize);

impl<I: Identity + ?Sized> Identity for &I {
  #[inline(always)]
  fn identity(&self) -> usize {
    (**self).identity()
  }
}

/// Result of a successful enqueue.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PushResult {
  /// The item was linked in at the tail.
  Inserted,
  /// An item with the same identity was already enqueued; nothing changed.
  AlreadyPresent,
}

/// A fixed-capacity FIFO queue with constant-time removal by identity.
///
/// Items live in an arena of `capacity` slots. Active slots form a doubly-linked
/// chain from head to tail in arrival order; free slots form a singly-linked
/// list threaded through the same forward-link table. A direct-mapped identity
/// table records which slot each enqueued identity occupies, so
/// [`remove`](Self::remove) unlinks a member without scanning the queue.
///
/// # Sizing
///
/// The queue allocates its tables once and **never resizes**. The identity
/// table covers keys `0..key_bound`; [`new`](Self::new) and
/// [`try_new`](Self::try_new) use `key_bound = capacity + 1`, so a queue of
/// capacity `n` accepts keys `0..=n`. Use [`with_key_bound`](Self::with_key_bound)
/// for larger or smaller identity domains.
pub struct IndexedSlotQueue<T> {
  data: Box<[Option<T>]>,
  next: Box<[usize]>,
  prev: Box<[usize]>,
  slot_of: Box<[usize]>,
  len: usize,
  head: usize,
  tail: usize,
  free_head: usize,
}

impl<T> IndexedSlotQueue<T> {
  /// Constructs an empty queue with `capacity` slots and identity domain
  /// `0..=capacity`.
  ///
  /// # Panics
  ///
  /// Panics if `capacity + 1` overflows `usize` or the tables cannot be
  /// allocated.
  pub fn new(capacity: usize) -> Self {
    match Self::try_new(capacity) {
      Ok(queue) => queue,
      Err(err) => panic!("cannot build queue with capacity {capacity}: {err}"),
    }
  }

  /// Constructs an empty queue, rejecting capacities that are negative or
  /// otherwise not representable as a slot count.
  ///
  /// # Errors
  ///
  /// Returns [`QueueError::InvalidCapacity`] if `capacity` does not convert to
  /// `usize`, leaves no room for the identity table, or is too large to
  /// allocate.
  pub fn try_new<C>(capacity: C) -> Result<Self, QueueError>
  where
    C: TryInto<usize>,
  {
    let capacity = capacity
      .try_into()
      .map_err(|_| QueueError::InvalidCapacity)?;
    let key_bound = capacity
      .checked_add(1)
      .ok_or(QueueError::InvalidCapacity)?;
    Self::with_key_bound(capacity, key_bound)
  }

  /// Constructs an empty queue with `capacity` slots whose identity table
  /// accepts keys `0..key_bound`.
  ///
  /// # Errors
  ///
  /// Returns [`QueueError::InvalidCapacity`] if `capacity` collides with the
  /// internal link sentinel, or if the slot tables or the `key_bound`-entry
  /// identity table cannot be allocated.
  pub fn with_key_bound(
    capacity: usize,
    key_bound: usize,
  ) -> Result<Self, QueueError> {
    if capacity == NIL {
      return Err(QueueError::InvalidCapacity);
    }
    let mut queue = IndexedSlotQueue {
      data: try_table(capacity, || None)?,
      next: try_table(capacity, || NIL)?,
      prev: try_table(capacity, || NIL)?,
      slot_of: try_table(key_bound, || NIL)?,
      len: 0,
      head: NIL,
      tail: NIL,
      free_head: NIL,
    };
    queue.chain_all_free();
    tracing::debug!(capacity, key_bound, "indexed slot queue created");
    Ok(queue)
  }

  /// Threads every slot onto the free list in ascending order and empties the
  /// active list.
  fn chain_all_free(&mut self) {
    let capacity = self.data.len();
    for slot in 0..capacity {
      self.next[slot] = if slot + 1 < capacity { slot + 1 } else { NIL };
      self.prev[slot] = slot.checked_sub(1).unwrap_or(NIL);
    }
    self.free_head = if capacity > 0 { 0 } else { NIL };
    self.head = NIL;
    self.tail = NIL;
    self.len = 0;
  }

  /// Drops every enqueued item and restores the freshly constructed state.
  pub fn clear(&mut self) {
    self.data.iter_mut().for_each(|slot| *slot = None);
    self.slot_of.fill(NIL);
    self.chain_all_free();
  }

  /// Returns the fixed number of slots.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.data.len()
  }

  /// Returns the length of the identity table; valid keys are `0..key_bound`.
  #[inline]
  pub fn key_bound(&self) -> usize {
    self.slot_of.len()
  }

  /// Returns the number of items currently enqueued.
  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  /// Returns `true` when the queue is empty.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Returns `true` when no free slot is left.
  #[inline]
  pub fn is_full(&self) -> bool {
    self.free_head == NIL
  }

  /// Returns `true` if an item with identity `key` is enqueued.
  #[inline]
  pub fn contains_key(&self, key: usize) -> bool {
    self.slot_for(key).is_some()
  }

  /// Returns the item enqueued under `key`, if any.
  pub fn get(&self, key: usize) -> Option<&T> {
    self.slot_for(key).and_then(|slot| self.data[slot].as_ref())
  }

  /// Returns the item at the head of the queue without removing it.
  pub fn peek(&self) -> Option<&T> {
    self.data.get(self.head).and_then(Option::as_ref)
  }

  /// Returns the most recently enqueued item.
  pub fn peek_back(&self) -> Option<&T> {
    self.data.get(self.tail).and_then(Option::as_ref)
  }

  /// Iterates over the enqueued items from head to tail.
  pub fn iter(&self) -> Iter<'_, T> {
    Iter {
      data: &self.data,
      next: &self.next,
      prev: &self.prev,
      front: self.head,
      back: self.tail,
      remaining: self.len,
    }
  }

  #[inline]
  fn slot_for(&self, key: usize) -> Option<usize> {
    self.slot_of.get(key).copied().filter(|&slot| slot != NIL)
  }

  /// Unlinks active `slot` and pushes it onto the free list.
  ///
  /// The caller guarantees the queue holds at least two items. When `slot` is
  /// the head, the caller advances `head` itself.
  fn retire(&mut self, slot: usize) {
    debug_assert!(self.len > 1);
    if slot == self.tail {
      self.tail = self.prev[slot];
      self.next[self.tail] = NIL;
    } else if slot != self.head {
      let before = self.prev[slot];
      let after = self.next[slot];
      self.next[before] = after;
      self.prev[after] = before;
    }

    // Backward links on the free list are bookkeeping only.
    if self.free_head != NIL {
      self.prev[self.free_head] = slot;
    }
    self.next[slot] = self.free_head;
    self.prev[slot] = self.tail;
    self.free_head = slot;
    self.len -= 1;
  }
}

impl<T: Identity> IndexedSlotQueue<T> {
  /// Appends `item` at the tail unless its identity is already enqueued.
  ///
  /// Membership is decided by identity alone: a different item carrying an
  /// enqueued identity is not stored and the queue is left untouched.
  ///
  /// # Errors
  ///
  /// Hands `item` back inside a [`PushError`] when its identity is outside the
  /// identity table ([`QueueError::KeyOutOfRange`]) or when every slot is
  /// occupied ([`QueueError::Full`]). A full queue rejects even an identity that
  /// is already enqueued.
  pub fn enqueue(&mut self, item: T) -> Result<PushResult, PushError<T>> {
    let key = item.identity();
    if key >= self.slot_of.len() {
      tracing::debug!(
        key,
        key_bound = self.slot_of.len(),
        "enqueue rejected: identity out of range"
      );
      let kind = QueueError::KeyOutOfRange {
        key,
        key_bound: self.slot_of.len(),
      };
      return Err(PushError::new(kind, item));
    }

    let slot = self.free_head;
    if slot == NIL {
      tracing::debug!(key, capacity = self.capacity(), "enqueue rejected: full");
      let kind = QueueError::Full {
        capacity: self.capacity(),
      };
      return Err(PushError::new(kind, item));
    }

    if self.slot_of[key] != NIL {
      return Ok(PushResult::AlreadyPresent);
    }

    self.data[slot] = Some(item);
    self.free_head = self.next[slot];
    self.prev[slot] = self.tail;
    self.next[slot] = NIL;
    if self.tail == NIL {
      self.head = slot;
    } else {
      self.next[self.tail] = slot;
    }
    self.tail = slot;
    self.slot_of[key] = slot;
    self.len += 1;

    tracing::trace!(key, slot, len = self.len, "enqueued");
    Ok(PushResult::Inserted)
  }

  /// Removes and returns the item at the head, or `None` if the queue is
  /// empty.
  pub fn dequeue(&mut self) -> Option<T> {
    if self.len == 0 {
      return None;
    }

    let slot = self.head;
    let item = self.data[slot].take()?;
    let key = item.identity();
    self.slot_of[key] = NIL;

    if self.len == 1 {
      if self.free_head != NIL {
        self.prev[self.free_head] = slot;
      }
      self.next[slot] = self.free_head;
      self.prev[slot] = NIL;
      self.free_head = slot;
      self.head = NIL;
      self.tail = NIL;
      self.len = 0;
    } else {
      let successor = self.next[slot];
      self.retire(slot);
      self.head = successor;
      self.prev[successor] = NIL;
    }

    tracing::trace!(key, slot, len = self.len, "dequeued");
    Some(item)
  }

  /// Removes the member sharing `item`'s identity, wherever it sits.
  ///
  /// Returns the stored item, which may differ from `item` in every field but
  /// its identity. Does nothing and returns `None` when the identity is not
  /// enqueued.
  pub fn remove(&mut self, item: &T) -> Option<T> {
    self.remove_key(item.identity())
  }

  /// Removes the member with identity `key` in constant time.
  ///
  /// Keys outside the identity table are treated as absent.
  pub fn remove_key(&mut self, key: usize) -> Option<T> {
    let slot = self.slot_for(key)?;
    if slot == self.head {
      return self.dequeue();
    }

    self.retire(slot);
    self.slot_of[key] = NIL;
    tracing::trace!(key, slot, len = self.len, "removed");
    self.data[slot].take()
  }

  /// Returns `true` if an item with `item`'s identity is enqueued.
  #[inline]
  pub fn contains(&self, item: &T) -> bool {
    self.contains_key(item.identity())
  }
}

impl<T: fmt::Debug> fmt::Debug for IndexedSlotQueue<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IndexedSlotQueue")
      .field("capacity", &self.capacity())
      .field("key_bound", &self.key_bound())
      .field("items", &self.iter())
      .finish()
  }
}

impl<'a, T> IntoIterator for &'a IndexedSlotQueue<T> {
  type Item = &'a T;
  type IntoIter = Iter<'a, T>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

/// Borrowing iterator over an [`IndexedSlotQueue`] in arrival order.
///
/// Walks forward links from the head and, from the back, backward links from
/// the tail.
pub struct Iter<'a, T> {
  data: &'a [Option<T>],
  next: &'a [usize],
  prev: &'a [usize],
  front: usize,
  back: usize,
  remaining: usize,
}

impl<T> Clone for Iter<'_, T> {
  fn clone(&self) -> Self {
    Iter {
      data: self.data,
      next: self.next,
      prev: self.prev,
      front: self.front,
      back: self.back,
      remaining: self.remaining,
    }
  }
}

impl<'a, T> Iterator for Iter<'a, T> {
  type Item = &'a T;

  fn next(&mut self) -> Option<&'a T> {
    if self.remaining == 0 {
      return None;
    }
    let slot = self.front;
    self.front = self.next[slot];
    self.remaining -= 1;
    self.data[slot].as_ref()
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
  fn next_back(&mut self) -> Option<&'a T> {
    if self.remaining == 0 {
      return None;
    }
    let slot = self.back;
    self.back = self.prev[slot];
    self.remaining -= 1;
    self.data[slot].as_ref()
  }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T: fmt::Debug> fmt::Debug for Iter<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.clone()).finish()
  }
}

#[cfg(test)]
impl<T: Identity> IndexedSlotQueue<T> {
  /// Walks every table and panics if the queue's structural invariants are
  /// broken.
  fn assert_invariants(&self) {
    let capacity = self.capacity();
    let mut seen = alloc::vec![false; capacity];

    assert_eq!(self.head == NIL, self.len == 0, "head/len disagree");
    assert_eq!(self.tail == NIL, self.len == 0, "tail/len disagree");

    let mut forward = Vec::new();
    let mut before = NIL;
    let mut slot = self.head;
    while slot != NIL {
      assert!(!seen[slot], "slot {slot} visited twice");
      seen[slot] = true;
      assert_eq!(self.prev[slot], before, "broken backward link at {slot}");
      forward.push(slot);
      before = slot;
      slot = self.next[slot];
    }
    assert_eq!(before, self.tail, "forward walk does not end at tail");
    assert_eq!(forward.len(), self.len);

    let mut backward = Vec::new();
    let mut slot = self.tail;
    while slot != NIL && backward.len() <= capacity {
      backward.push(slot);
      slot = self.prev[slot];
    }
    backward.reverse();
    assert_eq!(backward, forward, "backward walk is not the reverse");

    for &slot in &forward {
      let item = self.data[slot].as_ref().expect("active slot is empty");
      assert_eq!(self.slot_of[item.identity()], slot);
    }
    let mapped = self.slot_of.iter().filter(|&&slot| slot != NIL).count();
    assert_eq!(mapped, self.len, "stale identity mappings");

    let mut free = 0;
    let mut slot = self.free_head;
    while slot != NIL {
      assert!(!seen[slot], "free slot {slot} overlaps or repeats");
      seen[slot] = true;
      assert!(self.data[slot].is_none(), "free slot {slot} holds a payload");
      free += 1;
      slot = self.next[slot];
    }
    assert_eq!(free + self.len, capacity, "slots leaked");
  }
}


#[cfg(all(test, feature = "std"))]
mod property_tests {
  use super::{IndexedSlotQueue, PushResult, QueueError};
  use proptest::prelude::*;
  use std::collections::VecDeque;

  const MAX_CAPACITY: usize = 8;

  #[derive(Debug, Clone)]
  enum Op {
    Enqueue(usize),
    Dequeue,
    Remove(usize),
  }

  fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
      (0..=MAX_CAPACITY + 1).prop_map(Op::Enqueue),
      Just(Op::Dequeue),
      (0..=MAX_CAPACITY + 1).prop_map(Op::Remove),
    ]
  }

  proptest! {
    /// Any operation sequence matches a `VecDeque` model and keeps the tables
    /// consistent.
    #[test]
    fn matches_model(
      capacity in 0..=MAX_CAPACITY,
      ops in prop::collection::vec(op(), 0..200),
    ) {
      let mut queue = IndexedSlotQueue::new(capacity);
      let mut model: VecDeque<usize> = VecDeque::new();

      for op in ops {
        match op {
          Op::Enqueue(key) => {
            let got = queue.enqueue(key).map_err(|err| err.kind());
            let expected = if key > capacity {
              Err(QueueError::KeyOutOfRange { key, key_bound: capacity + 1 })
            } else if model.len() == capacity {
              Err(QueueError::Full { capacity })
            } else if model.contains(&key) {
              Ok(PushResult::AlreadyPresent)
            } else {
              model.push_back(key);
              Ok(PushResult::Inserted)
            };
            prop_assert_eq!(got, expected);
          }
          Op::Dequeue => {
            prop_assert_eq!(queue.dequeue(), model.pop_front());
          }
          Op::Remove(key) => {
            let expected = model
              .iter()
              .position(|&k| k == key)
              .and_then(|pos| model.remove(pos));
            prop_assert_eq!(queue.remove_key(key), expected);
          }
        }

        queue.assert_invariants();
        prop_assert_eq!(queue.len(), model.len());
        prop_assert!(queue.iter().eq(model.iter()));
        prop_assert!(queue.iter().rev().eq(model.iter().rev()));
      }
    }

    /// Without removals, dequeues replay the insertion order.
    #[test]
    fn fifo_without_removals(keys in prop::collection::vec(0..64usize, 0..64)) {
      let mut queue = IndexedSlotQueue::with_key_bound(64, 64).unwrap();
      let mut expected = Vec::new();
      for key in keys {
        if queue.enqueue(key) == Ok(PushResult::Inserted) {
          expected.push(key);
        }
      }
      let drained: Vec<usize> = std::iter::from_fn(|| queue.dequeue()).collect();
      prop_assert_eq!(drained, expected);
    }
  }
}
