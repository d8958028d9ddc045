//! Ordered sibling-list algebra shared by all three tiers.
//!
//! Every structural edit ends in [`renumber`], which is the single place
//! that re-establishes `order == position + 1`.

use crate::model::template::Ordered;

/// Reassign `order = position + 1` in current array order. Idempotent.
pub fn renumber<T: Ordered>(list: &mut [T]) {
    for (i, item) in list.iter_mut().enumerate() {
        item.set_order(i as u32 + 1);
    }
}

/// Stable-sort by the stored `order`, then renumber. Used on load so that
/// array position matches reading order before any index-based edit.
pub fn normalize<T: Ordered>(list: &mut [T]) {
    list.sort_by_key(|item| item.order());
    renumber(list);
}

/// Swap the element at `index` with its predecessor.
/// No-op at the top boundary and for out-of-range indices. Returns whether it moved.
pub fn move_up<T: Ordered>(list: &mut [T], index: usize) -> bool {
    if index == 0 || index >= list.len() {
        return false;
    }
    list.swap(index - 1, index);
    renumber(list);
    true
}

/// Swap the element at `index` with its successor.
/// No-op at the bottom boundary and for out-of-range indices. Returns whether it moved.
pub fn move_down<T: Ordered>(list: &mut [T], index: usize) -> bool {
    if index + 1 >= list.len() {
        return false;
    }
    list.swap(index, index + 1);
    renumber(list);
    true
}

/// Append with `order = len + 1`
pub fn push<T: Ordered>(list: &mut Vec<T>, mut item: T) -> usize {
    item.set_order(list.len() as u32 + 1);
    list.push(item);
    list.len() - 1
}

/// Insert immediately after `index` and renumber. Returns the new element's index.
pub fn insert_after<T: Ordered>(list: &mut Vec<T>, index: usize, item: T) -> usize {
    let at = (index + 1).min(list.len());
    list.insert(at, item);
    renumber(list);
    at
}

/// Remove the element at `index` and renumber the rest. `None` if out of range.
pub fn remove_at<T: Ordered>(list: &mut Vec<T>, index: usize) -> Option<T> {
    if index >= list.len() {
        return None;
    }
    let item = list.remove(index);
    renumber(list);
    Some(item)
}

/// True when `order` is exactly 1..=N in array order
pub fn is_contiguous<T: Ordered>(list: &[T]) -> bool {
    list.iter()
        .enumerate()
        .all(|(i, item)| item.order() == i as u32 + 1)
}
