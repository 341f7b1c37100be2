#![forbid(unsafe_code)]

//! Notification dispatch.
//!
//! Each subscriber entry remembers the masked payload it last received.
//! A regular pass delivers to an entry only when its masked view of the new
//! state differs from that payload; a forced delivery ([`Entry::prime`])
//! always delivers and seeds the memory.
//!
//! Deliveries are collected while the store is borrowed and invoked after
//! the borrow is released, so observers may call back into the form.
//!
//! # Invariants
//!
//! 1. An observer is invoked only when its masked projection differs from the
//!    one it last received, or on its single forced delivery.
//! 2. Entries that have not been primed yet are skipped by regular passes.
//! 3. Collection walks a registry in registration order.

use std::fmt;
use std::rc::Rc;

use crate::state::{FieldState, FormState};
use crate::subscription::{FieldSubscription, FormSubscription, Registry};

/// A projection that can be narrowed to an interest mask.
pub(crate) trait Masked: Clone + PartialEq {
    type Mask: Copy + fmt::Debug;

    fn masked(&self, mask: Self::Mask) -> Self;
}

impl Masked for FormState {
    type Mask = FormSubscription;

    fn masked(&self, mask: FormSubscription) -> Self {
        self.filtered(mask)
    }
}

impl Masked for FieldState {
    type Mask = FieldSubscription;

    fn masked(&self, mask: FieldSubscription) -> Self {
        self.filtered(mask)
    }
}

/// Observer, its mask, and the payload it last received.
pub(crate) struct Entry<S: Masked> {
    observer: Rc<dyn Fn(&S)>,
    mask: S::Mask,
    last: Option<S>,
}

pub(crate) type FormEntry = Entry<FormState>;
pub(crate) type FieldEntry = Entry<FieldState>;

impl<S: Masked> Entry<S> {
    pub(crate) fn new(observer: Rc<dyn Fn(&S)>, mask: S::Mask) -> Self {
        Self {
            observer,
            mask,
            last: None,
        }
    }

    /// Forced delivery: always produces a payload and records it.
    pub(crate) fn prime(&mut self, state: &S) -> Delivery<S> {
        let payload = state.masked(self.mask);
        self.last = Some(payload.clone());
        Delivery {
            observer: Rc::clone(&self.observer),
            payload,
        }
    }

    /// Regular delivery: a payload only if the masked view changed.
    fn offer(&mut self, state: &S) -> Option<Delivery<S>> {
        let last = self.last.as_ref()?;
        let payload = state.masked(self.mask);
        if *last == payload {
            return None;
        }
        self.last = Some(payload.clone());
        Some(Delivery {
            observer: Rc::clone(&self.observer),
            payload,
        })
    }
}

impl<S: Masked> fmt::Debug for Entry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("mask", &self.mask)
            .field("primed", &self.last.is_some())
            .finish()
    }
}

/// A payload ready to hand to its observer.
pub(crate) struct Delivery<S> {
    observer: Rc<dyn Fn(&S)>,
    payload: S,
}

impl<S> Delivery<S> {
    pub(crate) fn deliver(self) {
        (self.observer)(&self.payload);
    }
}

/// Append a delivery for every entry in `registry` whose view changed.
pub(crate) fn collect<S: Masked>(
    registry: &mut Registry<Entry<S>>,
    state: &S,
    out: &mut Vec<Delivery<S>>,
) {
    for (index, entry) in registry.iter_mut() {
        if let Some(delivery) = entry.offer(state) {
            tracing::trace!(message = "notify.deliver", index, mask = ?entry.mask);
            out.push(delivery);
        }
    }
}

/// Invoke every collected delivery in order.
pub(crate) fn deliver_all<S>(deliveries: Vec<Delivery<S>>) {
    for delivery in deliveries {
        delivery.deliver();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<FormState>>>, Rc<dyn Fn(&FormState)>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let observer: Rc<dyn Fn(&FormState)> =
            Rc::new(move |state: &FormState| sink.borrow_mut().push(state.clone()));
        (seen, observer)
    }

    fn state(valid: bool, values: serde_json::Value) -> FormState {
        FormState {
            valid: Some(valid),
            invalid: Some(!valid),
            values: Some(values),
            ..FormState::default()
        }
    }

    #[test]
    fn unprimed_entries_are_skipped() {
        let (seen, observer) = recorder();
        let mut registry = Registry::new();
        registry.add(Entry::new(observer, FormSubscription::VALID));
        let mut out = Vec::new();
        collect(&mut registry, &state(true, json!({})), &mut out);
        assert!(out.is_empty());
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn delivers_only_on_masked_change() {
        let (seen, observer) = recorder();
        let mut registry = Registry::new();
        let index = registry.add(Entry::new(observer, FormSubscription::VALID));
        if let Some(entry) = registry.get_mut(index) {
            entry.prime(&state(true, json!({}))).deliver();
        }

        let mut out = Vec::new();
        collect(&mut registry, &state(true, json!({ "a": 1 })), &mut out);
        assert!(out.is_empty(), "values are outside the mask");

        collect(&mut registry, &state(false, json!({ "a": 1 })), &mut out);
        deliver_all(out);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].valid, Some(false));
        assert_eq!(seen[1].values, None, "unmasked keys are omitted");
    }

    #[test]
    fn collection_follows_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut registry = Registry::new();
        for tag in ["first", "second", "third"] {
            let sink = Rc::clone(&order);
            let index = registry.add(Entry::new(
                Rc::new(move |_: &FormState| sink.borrow_mut().push(tag)),
                FormSubscription::VALUES,
            ));
            if let Some(entry) = registry.get_mut(index) {
                let _ = entry.prime(&state(true, json!({})));
            }
        }
        let mut out = Vec::new();
        collect(&mut registry, &state(true, json!({ "x": 1 })), &mut out);
        deliver_all(out);
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }
}
