#![forbid(unsafe_code)]

//! Interest masks and the index-keyed subscriber registry.
//!
//! Every observer is registered together with a mask naming the projected
//! keys it cares about. Entries live in a [`Registry`] under a monotonically
//! increasing index, so removing one entry never disturbs another.
//!
//! # Invariants
//!
//! 1. Indices are allocated monotonically and never reused within one
//!    registry's lifetime.
//! 2. Iteration yields entries in registration (index) order.
//! 3. Removal is a single map deletion; other indices are untouched.

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Which [`FormState`](crate::FormState) keys a form observer receives.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FormSubscription: u16 {
        const ACTIVE = 1 << 0;
        const DIRTY = 1 << 1;
        const DIRTY_SINCE_LAST_SUBMIT = 1 << 2;
        const ERROR = 1 << 3;
        const ERRORS = 1 << 4;
        const INITIAL_VALUES = 1 << 5;
        const INVALID = 1 << 6;
        const PRISTINE = 1 << 7;
        const SUBMIT_ERROR = 1 << 8;
        const SUBMIT_ERRORS = 1 << 9;
        const SUBMIT_FAILED = 1 << 10;
        const SUBMIT_SUCCEEDED = 1 << 11;
        const SUBMITTING = 1 << 12;
        const VALID = 1 << 13;
        const VALIDATING = 1 << 14;
        const VALUES = 1 << 15;
    }
}

bitflags! {
    /// Which [`FieldState`](crate::FieldState) keys a field observer receives.
    ///
    /// `name` and the bound [`FieldHandle`](crate::FieldHandle) are always
    /// delivered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldSubscription: u16 {
        const ACTIVE = 1 << 0;
        const DIRTY = 1 << 1;
        const DIRTY_SINCE_LAST_SUBMIT = 1 << 2;
        const ERROR = 1 << 3;
        const INITIAL = 1 << 4;
        const INVALID = 1 << 5;
        const LENGTH = 1 << 6;
        const PRISTINE = 1 << 7;
        const SUBMIT_ERROR = 1 << 8;
        const SUBMIT_FAILED = 1 << 9;
        const SUBMIT_SUCCEEDED = 1 << 10;
        const TOUCHED = 1 << 11;
        const VALID = 1 << 12;
        const VALUE = 1 << 13;
        const VISITED = 1 << 14;
    }
}

const FORM_SUBSCRIPTION_ITEMS: [&str; 16] = [
    "active",
    "dirty",
    "dirtySinceLastSubmit",
    "error",
    "errors",
    "initialValues",
    "invalid",
    "pristine",
    "submitError",
    "submitErrors",
    "submitFailed",
    "submitSucceeded",
    "submitting",
    "valid",
    "validating",
    "values",
];

const FIELD_SUBSCRIPTION_ITEMS: [&str; 15] = [
    "active",
    "dirty",
    "dirtySinceLastSubmit",
    "error",
    "initial",
    "invalid",
    "length",
    "pristine",
    "submitError",
    "submitFailed",
    "submitSucceeded",
    "touched",
    "valid",
    "value",
    "visited",
];

/// Names of every form subscription key, in flag order.
#[must_use]
pub fn form_subscription_items() -> &'static [&'static str] {
    &FORM_SUBSCRIPTION_ITEMS
}

/// Names of every field subscription key, in flag order.
#[must_use]
pub fn field_subscription_items() -> &'static [&'static str] {
    &FIELD_SUBSCRIPTION_ITEMS
}

/// Subscriber entries keyed by registration index.
pub(crate) struct Registry<E> {
    next_index: u64,
    entries: BTreeMap<u64, E>,
}

impl<E> Registry<E> {
    pub(crate) fn new() -> Self {
        Self {
            next_index: 0,
            entries: BTreeMap::new(),
        }
    }

    /// Store `entry` under a fresh index and return that index.
    pub(crate) fn add(&mut self, entry: E) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        self.entries.insert(index, entry);
        index
    }

    pub(crate) fn remove(&mut self, index: u64) -> Option<E> {
        self.entries.remove(&index)
    }

    pub(crate) fn get_mut(&mut self, index: u64) -> Option<&mut E> {
        self.entries.get_mut(&index)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (u64, &mut E)> {
        self.entries.iter_mut().map(|(index, entry)| (*index, entry))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Registry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("next_index", &self.next_index)
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Removes a subscription or field registration when invoked.
///
/// Dropping an `Unsubscribe` without calling [`unsubscribe`](Self::unsubscribe)
/// leaves the subscription in place for the lifetime of the form.
#[must_use = "dropping an Unsubscribe keeps the subscription alive"]
pub struct Unsubscribe {
    action: Option<Box<dyn FnOnce()>>,
}

impl Unsubscribe {
    pub(crate) fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// Remove the subscription.
    pub fn unsubscribe(mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("pending", &self.action.is_some())
            .finish()
    }
}
