//! Observable vectors with positional edits.
//!
//! Every edit replaces the whole list in one write, so subscribers see a
//! single notification per call. Edits with an index outside the list leave
//! it untouched and notify nobody, except [`ReactiveList::insert`], which
//! appends instead.

use std::cmp::Ordering;

use crate::{MaybeSignal, Signal, signal};

/// A [`Signal<Vec<T>>`] with list helpers.
pub struct ReactiveList<T>(Signal<Vec<T>>);

impl<T> Clone for ReactiveList<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReactiveList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReactiveList").field(&self.0).finish()
    }
}

impl<T: Clone> ReactiveList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self(signal(items))
    }

    /// The backing signal, for watching or reading without a clone.
    pub fn signal(&self) -> &Signal<Vec<T>> {
        &self.0
    }

    pub fn get(&self) -> Vec<T> {
        self.0.get()
    }

    pub fn len(&self) -> usize {
        self.0.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces every item.
    pub fn set(&self, items: Vec<T>) {
        self.0.set(items);
    }

    /// Inserts `item` before `at`; `None` or an index past the end appends.
    pub fn insert(&self, item: T, at: Option<usize>) {
        self.0.update(|list| {
            let at = at.filter(|&i| i <= list.len()).unwrap_or(list.len());
            list.insert(at, item);
        });
    }

    pub fn push(&self, item: T) {
        self.insert(item, None);
    }

    /// Removes the item at `at`, or the last one for `None`.
    pub fn remove(&self, at: Option<usize>) -> Option<T> {
        let len = self.len();
        let at = match at {
            Some(i) => i,
            None => len.checked_sub(1)?,
        };
        if at >= len {
            return None;
        }
        let mut removed = None;
        self.0.update(|list| removed = Some(list.remove(at)));
        removed
    }

    /// Exchanges two items. Returns whether the list changed.
    pub fn swap(&self, a: usize, b: usize) -> bool {
        let len = self.len();
        if a == b || a >= len || b >= len {
            return false;
        }
        self.0.update(|list| list.swap(a, b));
        true
    }

    /// Takes the item at `from` out and reinserts it at `to`. Both indices
    /// refer to the list before the move. Returns whether the list changed.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        let len = self.len();
        if from == to || from >= len || to >= len {
            return false;
        }
        self.0.update(|list| {
            let item = list.remove(from);
            list.insert(to, item);
        });
        true
    }

    /// Stable sort; always notifies.
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> Ordering) {
        self.0.update(|list| list.sort_by(compare));
    }

    /// Whether no adjacent pair compares as `Greater`.
    pub fn is_sorted_by(&self, mut compare: impl FnMut(&T, &T) -> Ordering) -> bool {
        self.0
            .with(|list| list.windows(2).all(|w| compare(&w[0], &w[1]) != Ordering::Greater))
    }
}

impl<T> From<&ReactiveList<T>> for MaybeSignal<Vec<T>> {
    fn from(list: &ReactiveList<T>) -> Self {
        MaybeSignal::Dynamic(list.0.clone())
    }
}

pub fn create_list<T: Clone>(items: Vec<T>) -> ReactiveList<T> {
    ReactiveList::new(items)
}
