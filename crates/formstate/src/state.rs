#![forbid(unsafe_code)]

//! The state store and its read-only projections.
//!
//! [`Store`] owns the canonical form record, one record per registered field,
//! and both subscriber registries. [`FormState`] and [`FieldState`] are
//! derived views rebuilt on demand; they are never written back.
//!
//! Every projection key is an `Option`: `None` means "not delivered" (the
//! observer's mask excludes it). A full projection, as returned by
//! [`Form::get_state`](crate::Form::get_state), has every key set. Inside a
//! delivered key, `Value::Null` stands for an absent value or error.
//!
//! # Invariants
//!
//! 1. A field record exists iff its subscriber registry is non-empty.
//! 2. `value`/`initial` are never cached on the field record; they are read
//!    by path from `values`/`initial_values`.
//! 3. `compute_form_projection` returns the previous `Rc` when the new
//!    projection is equal to it, so callers can compare by pointer.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use formstate_structure::get_in;
use serde_json::{Map, Value};

use crate::FORM_ERROR;
use crate::config::FieldValidator;
use crate::form::FormInner;
use crate::notify::{FieldEntry, FormEntry};
use crate::subscription::{FieldSubscription, FormSubscription, Registry};

// ---------------------------------------------------------------------------
// Internal records
// ---------------------------------------------------------------------------

/// Canonical form-wide state.
#[derive(Debug, Clone)]
pub(crate) struct FormRecord {
    pub active: Option<String>,
    pub values: Value,
    pub initial_values: Option<Value>,
    /// Record-level and field-level errors merged into one tree.
    pub errors: Value,
    pub error: Option<Value>,
    pub submitting: bool,
    pub submit_failed: bool,
    pub submit_succeeded: bool,
    pub submit_errors: Option<Value>,
    pub submit_error: Option<Value>,
    pub last_submitted_values: Option<Value>,
    /// Deferred validation results still outstanding.
    pub validating: usize,
    pub pristine: bool,
    pub valid: bool,
}

impl FormRecord {
    fn new(initial_values: Option<Value>) -> Self {
        Self {
            active: None,
            values: initial_values.clone().unwrap_or_else(empty_tree),
            initial_values,
            errors: empty_tree(),
            error: None,
            submitting: false,
            submit_failed: false,
            submit_succeeded: false,
            submit_errors: None,
            submit_error: None,
            last_submitted_values: None,
            validating: 0,
            pristine: true,
            valid: true,
        }
    }
}

/// Per-field internal state.
pub(crate) struct FieldRecord {
    pub active: bool,
    pub touched: bool,
    pub visited: bool,
    /// Merged error published to observers.
    pub error: Option<Value>,
    /// First non-empty synchronous field-level result of the latest pass.
    pub sync_error: Option<Value>,
    /// Latest current-generation deferred field-level result.
    pub async_error: Option<Value>,
    pub submit_error: Option<Value>,
    pub validators: BTreeMap<u64, FieldValidator>,
    pub validate_fields: BTreeMap<u64, Vec<String>>,
    /// Cycle stamp of the latest synchronous pass over this field.
    pub generation: u64,
    pub last_field_state: Option<FieldState>,
}

impl FieldRecord {
    fn new() -> Self {
        Self {
            active: false,
            touched: false,
            visited: false,
            error: None,
            sync_error: None,
            async_error: None,
            submit_error: None,
            validators: BTreeMap::new(),
            validate_fields: BTreeMap::new(),
            generation: 0,
            last_field_state: None,
        }
    }

    /// Field-level error: synchronous first-wins result, else deferred result.
    pub fn field_level_error(&self) -> Option<&Value> {
        self.sync_error.as_ref().or(self.async_error.as_ref())
    }

    /// Dependents declared by the earliest registration that declares any.
    pub fn validate_fields(&self) -> Option<&[String]> {
        self.validate_fields.values().next().map(Vec::as_slice)
    }
}

impl fmt::Debug for FieldRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRecord")
            .field("active", &self.active)
            .field("touched", &self.touched)
            .field("visited", &self.visited)
            .field("error", &self.error)
            .field("submit_error", &self.submit_error)
            .field("validators", &self.validators.len())
            .field("generation", &self.generation)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Single source of truth for one form instance.
pub(crate) struct Store {
    owner: Weak<FormInner>,
    pub form: FormRecord,
    pub fields: BTreeMap<String, FieldRecord>,
    pub form_subscribers: Registry<FormEntry>,
    pub field_subscribers: BTreeMap<String, Registry<FieldEntry>>,
    pub last_form_state: Option<Rc<FormState>>,
    /// Latest record-level error tree (always an object).
    pub record_errors: Value,
    /// Cycle stamp of the latest record-level pass.
    pub record_generation: u64,
    /// Monotonic validation-cycle counter. Stamps survive field re-registration.
    pub cycle: u64,
}

impl Store {
    pub(crate) fn new(owner: Weak<FormInner>, initial_values: Option<Value>) -> Self {
        Self {
            owner,
            form: FormRecord::new(initial_values),
            fields: BTreeMap::new(),
            form_subscribers: Registry::new(),
            field_subscribers: BTreeMap::new(),
            last_form_state: None,
            record_errors: empty_tree(),
            record_generation: 0,
            cycle: 0,
        }
    }

    /// Current value at `name`; `null` reads as absent.
    pub(crate) fn value(&self, name: &str) -> Option<&Value> {
        get_in(&self.form.values, name).filter(|v| !v.is_null())
    }

    pub(crate) fn initial(&self, name: &str) -> Option<&Value> {
        self.form
            .initial_values
            .as_ref()
            .and_then(|tree| get_in(tree, name))
            .filter(|v| !v.is_null())
    }

    /// Write `value` at `name`. Returns `false` when it was already there.
    pub(crate) fn set_value(&mut self, name: &str, value: Option<Value>) -> bool {
        let value = value.filter(|v| !v.is_null());
        if self.value(name) == value.as_ref() {
            return false;
        }
        self.form.values = formstate_structure::set_in(&self.form.values, name, value);
        true
    }

    pub(crate) fn field(&self, name: &str) -> Option<&FieldRecord> {
        self.fields.get(name)
    }

    pub(crate) fn upsert_field(&mut self, name: &str) -> &mut FieldRecord {
        self.fields
            .entry(name.to_owned())
            .or_insert_with(FieldRecord::new)
    }

    /// Drop the field record and its subscriber registry together.
    pub(crate) fn delete_field(&mut self, name: &str) -> Option<FieldRecord> {
        self.field_subscribers.remove(name);
        if self.form.active.as_deref() == Some(name) {
            self.form.active = None;
        }
        self.fields.remove(name)
    }

    pub(crate) fn has_validators(&self) -> bool {
        self.fields.values().any(|field| !field.validators.is_empty())
    }

    pub(crate) fn has_sync_errors(&self) -> bool {
        self.form.error.is_some()
            || !tree_is_empty(&self.form.errors)
            || self.fields.values().any(|field| field.error.is_some())
    }

    /// Forget every error (the no-validator fast path). Counts as a cycle, so
    /// deferred results issued before it are stale.
    pub(crate) fn clear_errors(&mut self) {
        self.cycle += 1;
        self.record_generation = self.cycle;
        self.record_errors = empty_tree();
        for field in self.fields.values_mut() {
            field.generation = self.cycle;
            field.sync_error = None;
            field.async_error = None;
            field.error = None;
        }
        self.form.error = None;
        if !tree_is_empty(&self.form.errors) {
            self.form.errors = empty_tree();
        }
    }

    /// Rebuild `errors`, `error` and each field's published error from the
    /// record-level tree and the field-level results. Field-level wins.
    pub(crate) fn merge_errors(&mut self) {
        let mut merged = self.record_errors.clone();
        for (name, field) in &self.fields {
            if let Some(error) = field.field_level_error() {
                merged = formstate_structure::set_in(&merged, name, Some(error.clone()));
            }
        }
        for (name, field) in &mut self.fields {
            field.error = get_in(&merged, name).filter(|v| !v.is_null()).cloned();
        }
        self.form.error = self
            .record_errors
            .get(FORM_ERROR)
            .filter(|v| !v.is_null())
            .cloned();
        if self.form.errors != merged {
            self.form.errors = merged;
        }
    }

    pub(crate) fn handle(&self, name: &str) -> FieldHandle {
        FieldHandle {
            form: self.owner.clone(),
            name: Rc::from(name),
        }
    }

    /// Full projection of one field, or `None` if it is not registered.
    pub(crate) fn compute_field_projection(&self, name: &str) -> Option<FieldState> {
        let field = self.fields.get(name)?;
        let value = self.value(name);
        let initial = self.initial(name);
        let pristine = value == initial;
        let valid = field.error.is_none() && field.submit_error.is_none();
        let dirty_since_last_submit = self
            .form
            .last_submitted_values
            .as_ref()
            .is_some_and(|submitted| get_in(submitted, name).filter(|v| !v.is_null()) != value);
        Some(FieldState {
            name: name.to_owned(),
            handle: self.handle(name),
            active: Some(field.active),
            dirty: Some(!pristine),
            dirty_since_last_submit: Some(dirty_since_last_submit),
            error: Some(or_null(field.error.as_ref())),
            initial: Some(or_null(initial)),
            invalid: Some(!valid),
            length: Some(value.and_then(Value::as_array).map(Vec::len)),
            pristine: Some(pristine),
            submit_error: Some(or_null(field.submit_error.as_ref())),
            submit_failed: Some(self.form.submit_failed),
            submit_succeeded: Some(self.form.submit_succeeded),
            touched: Some(field.touched),
            valid: Some(valid),
            value: Some(or_null(value)),
            visited: Some(field.visited),
        })
    }

    /// Recompute `pristine`/`valid`, then project. Reuses the previous `Rc`
    /// when nothing observable changed.
    pub(crate) fn compute_form_projection(&mut self) -> Rc<FormState> {
        self.form.pristine = self
            .fields
            .keys()
            .all(|name| self.value(name) == self.initial(name));
        self.form.valid = self.form.error.is_none()
            && self.form.submit_error.is_none()
            && tree_is_empty(&self.form.errors)
            && self.form.submit_errors.as_ref().is_none_or(tree_is_empty);

        let form = &self.form;
        let next = FormState {
            active: Some(form.active.clone()),
            dirty: Some(!form.pristine),
            dirty_since_last_submit: Some(
                form.last_submitted_values
                    .as_ref()
                    .is_some_and(|submitted| *submitted != form.values),
            ),
            error: Some(or_null(form.error.as_ref())),
            errors: Some(form.errors.clone()),
            initial_values: Some(or_null(form.initial_values.as_ref())),
            invalid: Some(!form.valid),
            pristine: Some(form.pristine),
            submit_error: Some(or_null(form.submit_error.as_ref())),
            submit_errors: Some(or_null(form.submit_errors.as_ref())),
            submit_failed: Some(form.submit_failed),
            submit_succeeded: Some(form.submit_succeeded),
            submitting: Some(form.submitting),
            valid: Some(form.valid),
            validating: Some(form.validating > 0),
            values: Some(form.values.clone()),
        };
        match &self.last_form_state {
            Some(last) if **last == next => Rc::clone(last),
            _ => Rc::new(next),
        }
    }

    pub(crate) fn field_states(&self) -> BTreeMap<String, FieldState> {
        self.fields
            .keys()
            .filter_map(|name| {
                self.compute_field_projection(name)
                    .map(|state| (name.clone(), state))
            })
            .collect()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("form", &self.form)
            .field("fields", &self.fields)
            .field("form_subscribers", &self.form_subscribers)
            .finish()
    }
}

pub(crate) fn empty_tree() -> Value {
    Value::Object(Map::new())
}

/// An error tree is empty when it is `null` or an object with no keys.
pub(crate) fn tree_is_empty(tree: &Value) -> bool {
    match tree {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Coerce a validator or submit result into an error-tree object. Absent
/// leaves are pruned first; a bare non-object value becomes the whole-form
/// error.
pub(crate) fn normalize_error_tree(result: Option<Value>) -> Value {
    match result.and_then(prune_error) {
        None => empty_tree(),
        Some(tree @ Value::Object(_)) => tree,
        Some(other) => {
            let mut map = Map::new();
            map.insert(FORM_ERROR.to_owned(), other);
            Value::Object(map)
        }
    }
}

/// Strip absent leaves (`null` and `false`) from an error value.
///
/// Objects and arrays left with nothing present collapse to `None`. Array
/// slots keep their position, so a pruned slot reads as `null`.
pub(crate) fn prune_error(error: Value) -> Option<Value> {
    match error {
        Value::Null | Value::Bool(false) => None,
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, value)| prune_error(value).map(|value| (key, value)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        Value::Array(items) => {
            let items: Vec<Value> = items
                .into_iter()
                .map(|item| prune_error(item).unwrap_or(Value::Null))
                .collect();
            items.iter().any(|item| !item.is_null()).then_some(Value::Array(items))
        }
        other => Some(other),
    }
}

fn or_null(value: Option<&Value>) -> Value {
    value.cloned().unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// Observable view of the whole form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormState {
    /// Name of the focused field, if any.
    pub active: Option<Option<String>>,
    pub dirty: Option<bool>,
    /// Values differ from the ones last handed to the submit handler.
    pub dirty_since_last_submit: Option<bool>,
    /// Whole-form error from record-level validation.
    pub error: Option<Value>,
    pub errors: Option<Value>,
    pub initial_values: Option<Value>,
    pub invalid: Option<bool>,
    pub pristine: Option<bool>,
    pub submit_error: Option<Value>,
    pub submit_errors: Option<Value>,
    pub submit_failed: Option<bool>,
    pub submit_succeeded: Option<bool>,
    pub submitting: Option<bool>,
    pub valid: Option<bool>,
    /// Whether any deferred validation is outstanding.
    pub validating: Option<bool>,
    pub values: Option<Value>,
}

impl FormState {
    /// Copy of `self` keeping only the keys in `mask`.
    #[must_use]
    pub fn filtered(&self, mask: FormSubscription) -> Self {
        let pick = |flag: FormSubscription| mask.contains(flag);
        Self {
            active: pick(FormSubscription::ACTIVE)
                .then(|| self.active.clone())
                .flatten(),
            dirty: self.dirty.filter(|_| pick(FormSubscription::DIRTY)),
            dirty_since_last_submit: self
                .dirty_since_last_submit
                .filter(|_| pick(FormSubscription::DIRTY_SINCE_LAST_SUBMIT)),
            error: keep(pick(FormSubscription::ERROR), &self.error),
            errors: keep(pick(FormSubscription::ERRORS), &self.errors),
            initial_values: keep(pick(FormSubscription::INITIAL_VALUES), &self.initial_values),
            invalid: self.invalid.filter(|_| pick(FormSubscription::INVALID)),
            pristine: self.pristine.filter(|_| pick(FormSubscription::PRISTINE)),
            submit_error: keep(pick(FormSubscription::SUBMIT_ERROR), &self.submit_error),
            submit_errors: keep(pick(FormSubscription::SUBMIT_ERRORS), &self.submit_errors),
            submit_failed: self
                .submit_failed
                .filter(|_| pick(FormSubscription::SUBMIT_FAILED)),
            submit_succeeded: self
                .submit_succeeded
                .filter(|_| pick(FormSubscription::SUBMIT_SUCCEEDED)),
            submitting: self.submitting.filter(|_| pick(FormSubscription::SUBMITTING)),
            valid: self.valid.filter(|_| pick(FormSubscription::VALID)),
            validating: self.validating.filter(|_| pick(FormSubscription::VALIDATING)),
            values: keep(pick(FormSubscription::VALUES), &self.values),
        }
    }
}

/// Observable view of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldState {
    pub name: String,
    /// Bound `change`/`blur`/`focus` for this field.
    pub handle: FieldHandle,
    pub active: Option<bool>,
    pub dirty: Option<bool>,
    /// Value differs from the one last handed to the submit handler.
    pub dirty_since_last_submit: Option<bool>,
    pub error: Option<Value>,
    pub initial: Option<Value>,
    pub invalid: Option<bool>,
    /// Element count when the value is an array.
    pub length: Option<Option<usize>>,
    pub pristine: Option<bool>,
    pub submit_error: Option<Value>,
    pub submit_failed: Option<bool>,
    pub submit_succeeded: Option<bool>,
    pub touched: Option<bool>,
    pub valid: Option<bool>,
    pub value: Option<Value>,
    pub visited: Option<bool>,
}

impl FieldState {
    /// Copy of `self` keeping only the keys in `mask` (plus name and handle).
    #[must_use]
    pub fn filtered(&self, mask: FieldSubscription) -> Self {
        let pick = |flag: FieldSubscription| mask.contains(flag);
        Self {
            name: self.name.clone(),
            handle: self.handle.clone(),
            active: self.active.filter(|_| pick(FieldSubscription::ACTIVE)),
            dirty: self.dirty.filter(|_| pick(FieldSubscription::DIRTY)),
            dirty_since_last_submit: self
                .dirty_since_last_submit
                .filter(|_| pick(FieldSubscription::DIRTY_SINCE_LAST_SUBMIT)),
            error: keep(pick(FieldSubscription::ERROR), &self.error),
            initial: keep(pick(FieldSubscription::INITIAL), &self.initial),
            invalid: self.invalid.filter(|_| pick(FieldSubscription::INVALID)),
            length: self.length.filter(|_| pick(FieldSubscription::LENGTH)),
            pristine: self.pristine.filter(|_| pick(FieldSubscription::PRISTINE)),
            submit_error: keep(pick(FieldSubscription::SUBMIT_ERROR), &self.submit_error),
            submit_failed: self
                .submit_failed
                .filter(|_| pick(FieldSubscription::SUBMIT_FAILED)),
            submit_succeeded: self
                .submit_succeeded
                .filter(|_| pick(FieldSubscription::SUBMIT_SUCCEEDED)),
            touched: self.touched.filter(|_| pick(FieldSubscription::TOUCHED)),
            valid: self.valid.filter(|_| pick(FieldSubscription::VALID)),
            value: keep(pick(FieldSubscription::VALUE), &self.value),
            visited: self.visited.filter(|_| pick(FieldSubscription::VISITED)),
        }
    }
}

fn keep(on: bool, value: &Option<Value>) -> Option<Value> {
    if on { value.clone() } else { None }
}

/// `change`/`blur`/`focus` bound to one field name.
///
/// Holds only a weak reference to the form: once the form is dropped every
/// call is a no-op.
#[derive(Clone)]
pub struct FieldHandle {
    form: Weak<FormInner>,
    name: Rc<str>,
}

impl FieldHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn change(&self, value: Value) {
        if let Some(form) = self.form.upgrade() {
            form.change(&self.name, value);
        }
    }

    pub fn blur(&self) {
        if let Some(form) = self.form.upgrade() {
            form.blur(&self.name);
        }
    }

    pub fn focus(&self) {
        if let Some(form) = self.form.upgrade() {
            form.focus(&self.name);
        }
    }
}

impl PartialEq for FieldHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Weak::ptr_eq(&self.form, &other.form)
    }
}

impl fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldHandle")
            .field("name", &self.name)
            .field("attached", &(self.form.strong_count() > 0))
            .finish()
    }
}
