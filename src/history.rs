//! Fixed-capacity FIFO buffer used for chat session history.

use std::collections::VecDeque;

/// Keeps the most recent `capacity` items; the oldest is dropped first.
#[derive(Clone, Debug)]
pub struct BoundedHistory<T> {
  items: VecDeque<T>,
  capacity: usize,
}

impl<T> BoundedHistory<T> {
  /// A capacity of zero is bumped to one so a push is always retained.
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self { items: VecDeque::with_capacity(capacity), capacity }
  }

  /// Append `item`, evicting and returning the oldest entry when full.
  pub fn push(&mut self, item: T) -> Option<T> {
    let evicted = if self.items.len() >= self.capacity { self.items.pop_front() } else { None };
    self.items.push_back(item);
    evicted
  }

  pub fn len(&self) -> usize { self.items.len() }

  pub fn capacity(&self) -> usize { self.capacity }

  pub fn clear(&mut self) { self.items.clear(); }

  /// Oldest to newest.
  pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator { self.items.iter() }

  /// Contiguous view in oldest-to-newest order.
  pub fn as_slice(&mut self) -> &[T] { self.items.make_contiguous() }
}

impl<T: Clone> BoundedHistory<T> {
  pub fn to_vec(&self) -> Vec<T> { self.iter().cloned().collect() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_up_to_capacity_without_evicting() {
    let mut h = BoundedHistory::new(3);
    assert_eq!(h.push(1), None);
    assert_eq!(h.push(2), None);
    assert_eq!(h.push(3), None);
    assert_eq!(h.to_vec(), vec![1, 2, 3]);
  }

  #[test]
  fn evicts_oldest_first() {
    let mut h = BoundedHistory::new(3);
    for i in 1..=3 {
      h.push(i);
    }
    assert_eq!(h.push(4), Some(1));
    assert_eq!(h.push(5), Some(2));
    assert_eq!(h.to_vec(), vec![3, 4, 5]);
  }

  #[test]
  fn keeps_exactly_the_last_fifty_in_order() {
    let mut h = BoundedHistory::new(50);
    for n in [51usize, 75, 200] {
      h.clear();
      for i in 0..n {
        h.push(i);
      }
      assert_eq!(h.len(), 50);
      let expected: Vec<usize> = (n - 50..n).collect();
      assert_eq!(h.to_vec(), expected);
    }
  }

  #[test]
  fn fifty_one_markers_drop_only_the_first() {
    let mut h = BoundedHistory::new(50);
    for i in 1..=51 {
      h.push(format!("msg-{i}"));
    }
    let kept = h.to_vec();
    assert!(!kept.contains(&"msg-1".to_string()));
    for i in 2..=51 {
      assert!(kept.contains(&format!("msg-{i}")));
    }
    assert_eq!(kept.first().map(String::as_str), Some("msg-2"));
    assert_eq!(kept.last().map(String::as_str), Some("msg-51"));
  }

  #[test]
  fn iter_walks_oldest_to_newest_after_eviction() {
    let mut h = BoundedHistory::new(3);
    for i in 1..=5 {
      h.push(i);
    }
    assert_eq!(h.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    assert_eq!(h.iter().next_back(), Some(&5));
    assert_eq!(h.iter().len(), 3);
  }

  #[test]
  fn zero_capacity_still_retains_latest() {
    let mut h = BoundedHistory::new(0);
    h.push("a");
    assert_eq!(h.push("b"), Some("a"));
    assert_eq!(h.capacity(), 1);
    assert_eq!(h.as_slice(), &["b"]);
  }
}
