#![forbid(unsafe_code)]

//! Path addressing for nested value trees.
//!
//! A key such as `customers[0].firstName` names a location inside a
//! [`serde_json::Value`] tree. Dot segments address object keys and bracketed
//! integers address array slots; both spellings are interchangeable, so
//! `customers.0.firstName` names the same location.
//!
//! - [`to_path`] splits a key into segments.
//! - [`get_in`] reads a location, returning `None` for anything missing.
//! - [`set_in`] returns a new tree with one location written or deleted.
//!
//! # Invariants
//!
//! 1. `set_in` never mutates its input; all untouched data is preserved.
//! 2. `get_in(&set_in(t, k, Some(v)), k) == Some(&v)` for every non-empty key.
//! 3. Deleting a location removes every container the deletion leaves empty,
//!    except the root, which collapses to `{}`.
//! 4. A segment can never contain `.`, `[` or `]`, so object keys holding one
//!    of those characters are unreachable by path. The engine relies on this
//!    for its whole-form error slot.
//!
//! # Failure Modes
//!
//! None. Both accessors are total: a non-integer segment applied to an array,
//! or any segment applied to a scalar, reads as missing. Writing through a
//! scalar replaces it with a fresh container. Deleting a missing location
//! returns the tree unchanged.
//!
//! Array padding is bounded by [`MAX_INDEX_GAP`]. A write whose index lies
//! further past the end of an existing array leaves the tree unchanged; below
//! a missing or scalar node such an index becomes an object key instead.

use serde_json::{Map, Value};

/// Largest number of `null` slots a single write may pad an array with.
pub const MAX_INDEX_GAP: usize = 1 << 16;

/// Split `key` into path segments, dropping empty ones.
///
/// An empty key yields an empty path, which addresses the root.
#[must_use]
pub fn to_path(key: &str) -> Vec<&str> {
    key.split(['.', '[', ']'])
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Read the value stored at `key`, or `None` if any segment is missing.
#[must_use]
pub fn get_in<'a>(tree: &'a Value, key: &str) -> Option<&'a Value> {
    to_path(key)
        .into_iter()
        .try_fold(tree, |node, segment| child(node, segment))
}

/// Return a copy of `tree` with `key` set to `value`.
///
/// `None` deletes the location; deleting a location that does not exist
/// returns an identical tree. Deleting an inner array slot leaves `null`
/// behind; deleting the last slot also drops any trailing `null` padding.
/// Containers are created on demand: an integer segment below a missing or
/// scalar node creates an array (padded with `null`, at most
/// [`MAX_INDEX_GAP`] slots), any other segment creates an object.
#[must_use]
pub fn set_in(tree: &Value, key: &str, value: Option<Value>) -> Value {
    let path = to_path(key);
    match assign(Some(tree), &path, value) {
        Some(root) => root,
        None => Value::Object(Map::new()),
    }
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn assign(node: Option<&Value>, path: &[&str], value: Option<Value>) -> Option<Value> {
    let Some((segment, rest)) = path.split_first() else {
        return value;
    };
    let current = node.and_then(|n| child(n, segment));
    if value.is_none() && current.is_none() {
        return node.cloned();
    }
    let next = assign(current, rest, value);

    match (node, segment.parse::<usize>()) {
        (Some(Value::Object(map)), _) => assign_key(map.clone(), segment, next),
        (Some(Value::Array(items)), Ok(index)) if within_gap(items.len(), index) => {
            assign_index(items.clone(), index, next)
        }
        (Some(Value::Array(_)), Ok(_)) => node.cloned(),
        (_, Ok(index)) if within_gap(0, index) => assign_index(Vec::new(), index, next),
        (_, _) => assign_key(Map::new(), segment, next),
    }
}

fn within_gap(len: usize, index: usize) -> bool {
    index.saturating_sub(len) <= MAX_INDEX_GAP
}

fn assign_key(mut map: Map<String, Value>, key: &str, value: Option<Value>) -> Option<Value> {
    match value {
        Some(value) => {
            map.insert(key.to_owned(), value);
        }
        None => {
            map.remove(key);
            if map.is_empty() {
                return None;
            }
        }
    }
    Some(Value::Object(map))
}

fn assign_index(mut items: Vec<Value>, index: usize, value: Option<Value>) -> Option<Value> {
    match value {
        Some(value) => {
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            items[index] = value;
        }
        None => {
            if items.len().checked_sub(1) == Some(index) {
                items.pop();
                while items.last().is_some_and(Value::is_null) {
                    items.pop();
                }
            } else if let Some(slot) = items.get_mut(index) {
                *slot = Value::Null;
            }
            if items.is_empty() {
                return None;
            }
        }
    }
    Some(Value::Array(items))
}
