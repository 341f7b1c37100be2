#![forbid(unsafe_code)]

//! Validation orchestration.
//!
//! A cycle runs in three steps so that no store borrow is held while user
//! validators execute:
//!
//! 1. [`plan`] snapshots values and validators for the fields in [`Scope`].
//! 2. [`Cycle::run`] invokes the validators and sorts their results into
//!    synchronous errors and [`Deferred`] work.
//! 3. [`Outcome::apply`] stamps the validated slots with a fresh cycle number,
//!    writes synchronous errors, and merges the error tree.
//!
//! Deferred results come back through [`resolve`], which applies them only
//! if their slot has not been revalidated since they were issued.
//!
//! # Invariants
//!
//! 1. Among a field's synchronous results the first-registered non-empty one
//!    wins; later validators still run.
//! 2. Field-level errors take precedence over record-level errors at the same
//!    path.
//! 3. `validating` rises by one per deferred result issued and falls by one
//!    per resolution, stale or not.
//! 4. A field outside the cycle's scope keeps its previous errors and its
//!    outstanding deferred work.
//!
//! # Failure Modes
//!
//! - **Validator panics**: not caught. The panic reaches the caller of the
//!   mutation that triggered the cycle; store state is left as it was before
//!   `apply`.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use serde_json::Value;

use crate::config::{FieldValidator, RecordValidator};
use crate::state::{Store, empty_tree, normalize_error_tree, prune_error};

/// Result of one validator call.
pub enum Validation {
    /// Known now. `None`, `null`, `false`, or a tree holding only those
    /// means no error.
    Immediate(Option<Value>),
    /// Known when the future resolves.
    Deferred(LocalBoxFuture<'static, Option<Value>>),
}

impl Validation {
    /// No error.
    #[must_use]
    pub fn ok() -> Self {
        Self::Immediate(None)
    }

    #[must_use]
    pub fn error(error: impl Into<Value>) -> Self {
        Self::Immediate(Some(error.into()))
    }

    pub fn deferred(future: impl Future<Output = Option<Value>> + 'static) -> Self {
        Self::Deferred(future.boxed_local())
    }

    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl From<Option<Value>> for Validation {
    fn from(result: Option<Value>) -> Self {
        Self::Immediate(result)
    }
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(result) => f.debug_tuple("Immediate").field(result).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// `null`, `false` and trees holding only those are not errors.
fn present(error: Option<Value>) -> Option<Value> {
    error.and_then(prune_error)
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Which fields a cycle revalidates. The record-level validator always runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Scope {
    All,
    Fields(BTreeSet<String>),
}

impl Scope {
    /// Scope for a change to `name`: its declared dependents plus itself, or
    /// every field when it declares none.
    pub(crate) fn for_change(store: &Store, name: &str) -> Self {
        match store.field(name).and_then(|field| field.validate_fields()) {
            Some(dependents) => {
                let mut names: BTreeSet<String> = dependents.iter().cloned().collect();
                names.insert(name.to_owned());
                Self::Fields(names)
            }
            None => Self::All,
        }
    }

    pub(crate) fn includes(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Fields(names) => names.contains(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

struct FieldJob {
    name: String,
    value: Option<Value>,
    validators: Vec<FieldValidator>,
}

/// Snapshot of everything one cycle needs, detached from the store.
pub(crate) struct Cycle {
    values: Value,
    record: Option<RecordValidator>,
    fields: Vec<FieldJob>,
}

/// Build a cycle, or `None` when no validator exists anywhere.
pub(crate) fn plan(store: &Store, record: Option<&RecordValidator>, scope: &Scope) -> Option<Cycle> {
    if record.is_none() && !store.has_validators() {
        return None;
    }
    let fields = store
        .fields
        .iter()
        .filter(|(name, _)| scope.includes(name))
        .map(|(name, field)| FieldJob {
            name: name.clone(),
            value: store.value(name).cloned(),
            validators: field.validators.values().cloned().collect(),
        })
        .collect();
    Some(Cycle {
        values: store.form.values.clone(),
        record: record.cloned(),
        fields,
    })
}

impl Cycle {
    pub(crate) fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Invoke every validator in the cycle.
    pub(crate) fn run(self) -> Outcome {
        let record = self.record.map(|validate| {
            let copy = self.values.clone();
            validate(&copy)
        });
        let fields = self
            .fields
            .into_iter()
            .map(|job| {
                let mut sync_error = None;
                let mut deferred = Vec::new();
                for validator in &job.validators {
                    match validator(job.value.as_ref(), &self.values) {
                        Validation::Immediate(result) => {
                            let result = present(result);
                            if sync_error.is_none() {
                                sync_error = result;
                            }
                        }
                        Validation::Deferred(future) => deferred.push(future),
                    }
                }
                FieldOutcome {
                    name: job.name,
                    sync_error,
                    deferred,
                }
            })
            .collect();
        Outcome { record, fields }
    }
}

struct FieldOutcome {
    name: String,
    sync_error: Option<Value>,
    deferred: Vec<LocalBoxFuture<'static, Option<Value>>>,
}

/// Validator results not yet written to the store.
pub(crate) struct Outcome {
    record: Option<Validation>,
    fields: Vec<FieldOutcome>,
}

/// Where a deferred result lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot {
    Record,
    Field(String),
}

/// An outstanding deferred result tagged with the cycle that issued it.
pub(crate) struct Deferred {
    pub slot: Slot,
    pub generation: u64,
    pub future: LocalBoxFuture<'static, Option<Value>>,
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("slot", &self.slot)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Outcome {
    /// Write synchronous results, merge, and hand back deferred work.
    pub(crate) fn apply(self, store: &mut Store) -> Vec<Deferred> {
        store.cycle += 1;
        let generation = store.cycle;
        let mut deferred = Vec::new();

        if let Some(result) = self.record {
            store.record_generation = generation;
            store.record_errors = match result {
                Validation::Immediate(errors) => normalize_error_tree(errors),
                Validation::Deferred(future) => {
                    deferred.push(Deferred {
                        slot: Slot::Record,
                        generation,
                        future,
                    });
                    empty_tree()
                }
            };
        }

        for outcome in self.fields {
            let Some(field) = store.fields.get_mut(&outcome.name) else {
                continue;
            };
            field.generation = generation;
            field.sync_error = outcome.sync_error;
            field.async_error = None;
            deferred.extend(outcome.deferred.into_iter().map(|future| Deferred {
                slot: Slot::Field(outcome.name.clone()),
                generation,
                future,
            }));
        }

        store.form.validating += deferred.len();
        store.merge_errors();
        deferred
    }
}

/// Apply one deferred result. Returns `false` when it was stale or its field
/// is gone; the `validating` count is released either way.
pub(crate) fn resolve(store: &mut Store, slot: &Slot, generation: u64, result: Option<Value>) -> bool {
    store.form.validating = store.form.validating.saturating_sub(1);
    let applied = match slot {
        Slot::Record if store.record_generation == generation => {
            store.record_errors = normalize_error_tree(result);
            true
        }
        Slot::Record => false,
        Slot::Field(name) => match store.fields.get_mut(name) {
            Some(field) if field.generation == generation => {
                field.async_error = present(result);
                true
            }
            _ => false,
        },
    };
    if applied {
        store.merge_errors();
    }
    applied
}
