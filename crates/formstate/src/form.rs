#![forbid(unsafe_code)]

//! The mutation API.
//!
//! [`Form`] is a cheap, clonable handle to one form instance. Every public
//! mutation follows the same shape: update the store, run a validation cycle
//! if the mutation can change validity, then notify field observers followed
//! by form observers.
//!
//! # Invariants
//!
//! 1. All synchronous work of a mutation (store update, synchronous
//!    validation, notification) completes before the call returns.
//! 2. No store borrow is held while user code runs (validators, submit
//!    handlers, observers, the debug hook), except inside [`Form::mutate`].
//! 3. Inside [`Form::batch`] values and errors update immediately, but
//!    notification waits until the outermost batch exits.
//! 4. A registration's forced first delivery happens exactly once, inside
//!    [`Form::register_field`], even when validation is deferred.
//!
//! # Failure Modes
//!
//! - **Validator, handler or observer panics**: propagate to the caller of
//!   the triggering mutation.
//! - **Re-entering the form from a [`Mutator`] closure**: panics with a
//!   `RefCell` borrow error, since the store is mutably borrowed for the
//!   closure's duration.
//! - **Form dropped with work pending**: deferred results and bound field
//!   handles hold only weak references and become no-ops.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::{self, Future};
use std::rc::Rc;
use std::task::Poll;

use formstate_structure::get_in;
use futures_util::FutureExt;
use serde_json::Value;

use crate::FORM_ERROR;
use crate::config::{
    DebugHook, FieldConfig, FormConfig, RecordValidator, SubmitFuture, SubmitHandler,
};
use crate::error::{FormError, Result};
use crate::notify::{self, Entry};
use crate::pending::TaskQueue;
use crate::state::{FieldState, FormState, Store, empty_tree, normalize_error_tree, tree_is_empty};
use crate::submit::SubmitCallback;
use crate::subscription::{FieldSubscription, FormSubscription, Unsubscribe};
use crate::validation::{self, Deferred, Scope, Slot};

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

/// Handle to a form instance. Clones share the same state.
#[derive(Clone)]
pub struct Form {
    inner: Rc<FormInner>,
}

impl Form {
    /// Build a form and run its initial validation.
    ///
    /// # Errors
    ///
    /// [`FormError::MissingSubmitHandler`] without an `on_submit` handler;
    /// [`FormError::InvalidInitialValues`] when initial values are not an
    /// object.
    pub fn new(config: FormConfig) -> Result<Self> {
        let FormConfig {
            on_submit,
            validate,
            options,
            debug,
        } = config;
        let on_submit = on_submit.ok_or(FormError::MissingSubmitHandler)?;
        let initial_values = match options.initial_values {
            Some(values) if !values.is_object() => {
                return Err(FormError::invalid_initial_values(&values));
            }
            other => other,
        };

        let inner = Rc::new_cyclic(|owner| FormInner {
            store: RefCell::new(Store::new(owner.clone(), initial_values)),
            on_submit,
            validate,
            validate_on_blur: options.validate_on_blur,
            debug,
            batch_depth: Cell::new(0),
            pending: TaskQueue::new(),
        });
        tracing::debug!(
            message = "form.create",
            submit_mode = inner.on_submit.mode(),
            record_validator = inner.validate.is_some(),
            validate_on_blur = inner.validate_on_blur
        );
        inner.run_validation(&Scope::All);
        Ok(Self { inner })
    }

    /// Observe form state. The observer receives the masked state once
    /// immediately, then again whenever a masked key changes.
    pub fn subscribe(
        &self,
        observer: impl Fn(&FormState) + 'static,
        mask: FormSubscription,
    ) -> Unsubscribe {
        let observer: Rc<dyn Fn(&FormState)> = Rc::new(observer);
        let (index, delivery) = {
            let mut store = self.inner.store.borrow_mut();
            let state = store.compute_form_projection();
            let index = store.form_subscribers.add(Entry::new(observer, mask));
            let delivery = store
                .form_subscribers
                .get_mut(index)
                .map(|entry| entry.prime(&state));
            // The new entry saw `state` without the other observers; the next
            // pass must compare per entry rather than against the cache.
            store.last_form_state = None;
            (index, delivery)
        };
        tracing::debug!(message = "form.subscribe", index, mask = ?mask);
        if let Some(delivery) = delivery {
            delivery.deliver();
        }

        let owner = Rc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = owner.upgrade() {
                inner.store.borrow_mut().form_subscribers.remove(index);
                tracing::debug!(message = "form.unsubscribe", index);
            }
        })
    }

    /// Register an observer (and optional validator) for field `name`,
    /// creating the field if needed.
    pub fn register_field(
        &self,
        name: &str,
        observer: impl Fn(&FieldState) + 'static,
        mask: FieldSubscription,
        config: FieldConfig,
    ) -> Unsubscribe {
        self.inner.register_field(name, Rc::new(observer), mask, config)
    }

    /// Set the value of registered field `name`. Revalidates unless the form
    /// validates on blur; unknown names are ignored.
    pub fn change(&self, name: &str, value: Value) {
        self.inner.change(name, value);
    }

    /// Mark `name` active and visited. A no-op if it is already active.
    pub fn focus(&self, name: &str) {
        self.inner.focus(name);
    }

    /// Mark the active field `name` inactive and touched, validating it when
    /// the form validates on blur.
    pub fn blur(&self, name: &str) {
        self.inner.blur(name);
    }

    /// Run `mutations` with notification suspended, then notify once.
    pub fn batch(&self, mutations: impl FnOnce()) {
        {
            let _scope = BatchGuard::enter(&self.inner.batch_depth);
            mutations();
        }
        if self.inner.batch_depth.get() == 0 {
            self.inner.notify_field_listeners();
            self.inner.notify_form_listeners();
        }
    }

    /// Replace both values and initial values, clearing `touched`/`visited`.
    ///
    /// # Errors
    ///
    /// [`FormError::InvalidInitialValues`] when `values` is not an object.
    pub fn initialize(&self, values: Value) -> Result<()> {
        if !values.is_object() {
            return Err(FormError::invalid_initial_values(&values));
        }
        self.inner.initialize(values);
        Ok(())
    }

    /// Clear submission state and re-initialize from the initial values.
    pub fn reset(&self) {
        self.inner.reset();
    }

    /// Submit the current values.
    ///
    /// Returns `None` when the submission is blocked by synchronous errors,
    /// ignored because one is already running or deferred validation is
    /// outstanding, or completed synchronously.
    /// Otherwise returns a future resolving to the handler's error result.
    pub fn submit(&self) -> Option<SubmitFuture> {
        self.inner.submit()
    }

    /// Full snapshot of form state.
    #[must_use]
    pub fn get_state(&self) -> FormState {
        let state = self.inner.store.borrow_mut().compute_form_projection();
        FormState::clone(&state)
    }

    #[must_use]
    pub fn get_field_state(&self, name: &str) -> Option<FieldState> {
        self.inner.store.borrow().compute_field_projection(name)
    }

    /// Registered field names, sorted.
    #[must_use]
    pub fn get_registered_fields(&self) -> Vec<String> {
        self.inner.store.borrow().fields.keys().cloned().collect()
    }

    /// Run a custom multi-field mutation, then validate and notify once.
    pub fn mutate<R>(&self, mutation: impl FnOnce(&mut Mutator<'_>) -> R) -> R {
        let result = {
            let mut store = self.inner.store.borrow_mut();
            let mut mutator = Mutator { store: &mut *store };
            mutation(&mut mutator)
        };
        tracing::debug!(message = "form.mutate");
        self.inner.run_validation(&Scope::All);
        self.inner.notify_field_listeners();
        self.inner.notify_form_listeners();
        result
    }

    /// Poll deferred work once. Returns how many tasks are still pending.
    pub fn run_until_stalled(&self) -> usize {
        self.inner.pending.run_until_stalled()
    }

    /// Resolves once every deferred validation and submission has finished.
    pub fn settled(&self) -> impl Future<Output = ()> + 'static {
        let inner = Rc::clone(&self.inner);
        future::poll_fn(move |cx| {
            if inner.pending.poll_tasks(cx) == 0 {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
    }

    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.inner.pending.len()
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Form");
        match self.inner.store.try_borrow() {
            Ok(store) => out.field("store", &*store),
            Err(_) => out.field("store", &"<borrowed>"),
        };
        out.field("pending", &self.inner.pending)
            .field("batch_depth", &self.inner.batch_depth.get())
            .finish()
    }
}

/// Store access for [`Form::mutate`].
pub struct Mutator<'a> {
    store: &'a mut Store,
}

impl Mutator<'_> {
    /// Current value at `name`.
    #[must_use]
    pub fn get_in(&self, name: &str) -> Option<&Value> {
        self.store.value(name)
    }

    #[must_use]
    pub fn values(&self) -> &Value {
        &self.store.form.values
    }

    /// Replace the value at `name` with `update(current)`; `None` deletes it.
    /// Returns whether the value changed.
    pub fn change_value(
        &mut self,
        name: &str,
        update: impl FnOnce(Option<Value>) -> Option<Value>,
    ) -> bool {
        let current = self.store.value(name).cloned();
        self.store.set_value(name, update(current))
    }
}

impl fmt::Debug for Mutator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutator")
            .field("values", &self.store.form.values)
            .finish()
    }
}

struct BatchGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> BatchGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

// ---------------------------------------------------------------------------
// FormInner
// ---------------------------------------------------------------------------

pub(crate) struct FormInner {
    store: RefCell<Store>,
    on_submit: SubmitHandler,
    validate: Option<RecordValidator>,
    validate_on_blur: bool,
    debug: Option<DebugHook>,
    batch_depth: Cell<usize>,
    pending: TaskQueue,
}

impl FormInner {
    fn in_batch(&self) -> bool {
        self.batch_depth.get() > 0
    }

    // -- validation ---------------------------------------------------------

    fn run_validation(self: &Rc<Self>, scope: &Scope) {
        let _span = tracing::debug_span!("form.validate", scope = ?scope).entered();
        let cycle = validation::plan(&self.store.borrow(), self.validate.as_ref(), scope);
        let Some(cycle) = cycle else {
            self.store.borrow_mut().clear_errors();
            return;
        };
        tracing::trace!(message = "form.validate.plan", fields = cycle.field_count());
        let outcome = cycle.run();
        let deferred = outcome.apply(&mut self.store.borrow_mut());
        if !deferred.is_empty() {
            tracing::debug!(message = "form.validate.deferred", count = deferred.len());
        }
        self.spawn_deferred(deferred);
    }

    fn spawn_deferred(self: &Rc<Self>, deferred: Vec<Deferred>) {
        for Deferred {
            slot,
            generation,
            future,
        } in deferred
        {
            let owner = Rc::downgrade(self);
            self.pending.push(
                async move {
                    let result = future.await;
                    if let Some(form) = owner.upgrade() {
                        form.resolve_deferred(&slot, generation, result);
                    }
                }
                .boxed_local(),
            );
        }
    }

    fn resolve_deferred(&self, slot: &Slot, generation: u64, result: Option<Value>) {
        let applied =
            validation::resolve(&mut self.store.borrow_mut(), slot, generation, result);
        if applied {
            tracing::debug!(message = "form.validate.resolved", slot = ?slot, generation);
        } else {
            tracing::debug!(message = "form.validate.stale", slot = ?slot, generation);
        }
        self.notify_field_listeners();
        self.notify_form_listeners();
    }

    // -- notification -------------------------------------------------------

    fn notify_field_listeners(&self) {
        if self.in_batch() {
            return;
        }
        let mut deliveries = Vec::new();
        {
            let mut store = self.store.borrow_mut();
            let store = &mut *store;
            let names: Vec<String> = store.fields.keys().cloned().collect();
            for name in names {
                let Some(state) = store.compute_field_projection(&name) else {
                    continue;
                };
                let Some(field) = store.fields.get_mut(&name) else {
                    continue;
                };
                if field.last_field_state.as_ref() == Some(&state) {
                    continue;
                }
                field.last_field_state = Some(state.clone());
                if let Some(registry) = store.field_subscribers.get_mut(&name) {
                    notify::collect(registry, &state, &mut deliveries);
                }
            }
        }
        notify::deliver_all(deliveries);
    }

    fn notify_form_listeners(&self) {
        self.call_debug();
        if self.in_batch() {
            return;
        }
        let mut deliveries = Vec::new();
        {
            let mut store = self.store.borrow_mut();
            let next = store.compute_form_projection();
            if store
                .last_form_state
                .as_ref()
                .is_some_and(|last| Rc::ptr_eq(last, &next))
            {
                return;
            }
            store.last_form_state = Some(Rc::clone(&next));
            notify::collect(&mut store.form_subscribers, &*next, &mut deliveries);
        }
        notify::deliver_all(deliveries);
    }

    fn call_debug(&self) {
        let Some(hook) = &self.debug else {
            return;
        };
        let (state, fields) = {
            let mut store = self.store.borrow_mut();
            (store.compute_form_projection(), store.field_states())
        };
        hook(&state, &fields);
    }

    fn notify_all(&self) {
        self.notify_field_listeners();
        self.notify_form_listeners();
    }

    // -- fields -------------------------------------------------------------

    fn register_field(
        self: &Rc<Self>,
        name: &str,
        observer: Rc<dyn Fn(&FieldState)>,
        mask: FieldSubscription,
        config: FieldConfig,
    ) -> Unsubscribe {
        let index = {
            let mut store = self.store.borrow_mut();
            let index = store
                .field_subscribers
                .entry(name.to_owned())
                .or_default()
                .add(Entry::new(observer, mask));
            let field = store.upsert_field(name);
            if let Some(validator) = config.validate {
                field.validators.insert(index, validator);
            }
            if let Some(dependents) = config.validate_fields {
                field.validate_fields.insert(index, dependents);
            }
            index
        };
        tracing::debug!(message = "form.register_field", field = name, index, mask = ?mask);

        self.run_validation(&Scope::All);
        self.notify_form_listeners();
        let first = {
            let mut store = self.store.borrow_mut();
            let state = store.compute_field_projection(name);
            if let Some(field) = store.fields.get_mut(name) {
                field.last_field_state = None;
            }
            state.and_then(|state| {
                store
                    .field_subscribers
                    .get_mut(name)?
                    .get_mut(index)
                    .map(|entry| entry.prime(&state))
            })
        };
        if let Some(delivery) = first {
            delivery.deliver();
        }
        self.notify_field_listeners();

        let owner = Rc::downgrade(self);
        let name = name.to_owned();
        Unsubscribe::new(move || {
            if let Some(form) = owner.upgrade() {
                form.unregister_field(&name, index);
            }
        })
    }

    fn unregister_field(self: &Rc<Self>, name: &str, index: u64) {
        let removed = {
            let mut store = self.store.borrow_mut();
            if let Some(field) = store.fields.get_mut(name) {
                field.validators.remove(&index);
                field.validate_fields.remove(&index);
            }
            let now_empty = match store.field_subscribers.get_mut(name) {
                Some(registry) => {
                    registry.remove(index);
                    registry.is_empty()
                }
                None => false,
            };
            if now_empty {
                store.delete_field(name);
            }
            now_empty
        };
        tracing::debug!(message = "form.unregister_field", field = name, index, removed);
        self.run_validation(&Scope::All);
        self.notify_all();
    }

    pub(crate) fn change(self: &Rc<Self>, name: &str, value: Value) {
        let changed = {
            let mut store = self.store.borrow_mut();
            store.field(name).is_some() && store.set_value(name, Some(value))
        };
        if !changed {
            return;
        }
        tracing::debug!(message = "form.change", field = name);
        if !self.validate_on_blur {
            let scope = Scope::for_change(&self.store.borrow(), name);
            self.run_validation(&scope);
        }
        self.notify_all();
    }

    pub(crate) fn focus(self: &Rc<Self>, name: &str) {
        {
            let mut store = self.store.borrow_mut();
            match store.fields.get_mut(name) {
                Some(field) if !field.active => {
                    field.active = true;
                    field.visited = true;
                }
                _ => return,
            }
            store.form.active = Some(name.to_owned());
        }
        tracing::debug!(message = "form.focus", field = name);
        self.notify_all();
    }

    pub(crate) fn blur(self: &Rc<Self>, name: &str) {
        {
            let mut store = self.store.borrow_mut();
            match store.fields.get_mut(name) {
                Some(field) if field.active => {
                    field.active = false;
                    field.touched = true;
                }
                _ => return,
            }
            store.form.active = None;
        }
        tracing::debug!(message = "form.blur", field = name);
        if self.validate_on_blur {
            let scope = Scope::for_change(&self.store.borrow(), name);
            self.run_validation(&scope);
        }
        self.notify_all();
    }

    // -- lifecycle ----------------------------------------------------------

    fn initialize(self: &Rc<Self>, values: Value) {
        {
            let mut store = self.store.borrow_mut();
            store.form.initial_values = Some(values.clone());
            store.form.values = values;
            for field in store.fields.values_mut() {
                field.touched = false;
                field.visited = false;
            }
        }
        tracing::debug!(message = "form.initialize");
        self.run_validation(&Scope::All);
        self.notify_all();
    }

    fn reset(self: &Rc<Self>) {
        let initial = {
            let mut store = self.store.borrow_mut();
            let form = &mut store.form;
            form.submit_failed = false;
            form.submit_succeeded = false;
            form.submit_errors = None;
            form.submit_error = None;
            form.last_submitted_values = None;
            for field in store.fields.values_mut() {
                field.submit_error = None;
            }
            store.form.initial_values.clone().unwrap_or_else(empty_tree)
        };
        tracing::debug!(message = "form.reset");
        self.initialize(initial);
    }

    // -- submission ---------------------------------------------------------

    fn submit(self: &Rc<Self>) -> Option<SubmitFuture> {
        let blocked = {
            let mut store = self.store.borrow_mut();
            if store.form.submitting {
                tracing::debug!(message = "form.submit.ignored", reason = "submitting");
                return None;
            }
            if store.form.validating > 0 {
                tracing::debug!(message = "form.submit.ignored", reason = "validating");
                return None;
            }
            let blocked = store.has_sync_errors();
            if blocked {
                for field in store.fields.values_mut() {
                    field.touched = true;
                }
                store.form.submit_failed = true;
            }
            blocked
        };
        if blocked {
            tracing::debug!(message = "form.submit.blocked");
            self.notify_all();
            return None;
        }

        let values = {
            let mut store = self.store.borrow_mut();
            let form = &mut store.form;
            form.submitting = true;
            form.submit_failed = false;
            form.submit_succeeded = false;
            form.last_submitted_values = Some(form.values.clone());
            form.values.clone()
        };
        let handler = self.on_submit.clone();
        let _span = tracing::debug_span!("form.submit", mode = handler.mode()).entered();

        match handler {
            SubmitHandler::Sync(handler) => {
                let errors = handler(&values);
                self.complete_submit(errors);
                None
            }
            SubmitHandler::Callback(handler) => {
                let (done, outcome) = async_channel::bounded(1);
                let completed = Rc::new(Cell::new(false));
                let callback = SubmitCallback::new(Rc::downgrade(self), done, Rc::clone(&completed));
                handler(&values, callback);
                if completed.get() {
                    return None;
                }
                self.notify_all();
                Some(async move { outcome.recv().await.ok().flatten() }.boxed_local())
            }
            SubmitHandler::Async(handler) => {
                let future = handler(&values);
                let owner = Rc::downgrade(self);
                let shared = async move {
                    let errors = future.await;
                    if let Some(form) = owner.upgrade() {
                        form.complete_submit(errors.clone());
                    }
                    errors
                }
                .boxed_local()
                .shared();
                self.pending.push(shared.clone().map(|_| ()).boxed_local());
                self.notify_all();
                Some(shared.boxed_local())
            }
        }
    }

    pub(crate) fn complete_submit(&self, errors: Option<Value>) {
        let failed = {
            let mut store = self.store.borrow_mut();
            let store = &mut *store;
            store.form.submitting = false;
            let errors = errors
                .map(|result| normalize_error_tree(Some(result)))
                .filter(|tree| !tree_is_empty(tree));
            match errors {
                Some(tree) => {
                    for (name, field) in &mut store.fields {
                        field.submit_error = get_in(&tree, name).filter(|v| !v.is_null()).cloned();
                        field.touched = true;
                    }
                    store.form.submit_error = tree.get(FORM_ERROR).filter(|v| !v.is_null()).cloned();
                    store.form.submit_errors = Some(tree);
                    store.form.submit_failed = true;
                    store.form.submit_succeeded = false;
                    true
                }
                None => {
                    for field in store.fields.values_mut() {
                        field.submit_error = None;
                    }
                    store.form.submit_errors = None;
                    store.form.submit_error = None;
                    store.form.submit_failed = false;
                    store.form.submit_succeeded = true;
                    false
                }
            }
        };
        tracing::debug!(message = "form.submit.complete", failed);
        self.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(config: FormConfig) -> Form {
        Form::new(config.on_submit(SubmitHandler::sync(|_| None))).expect("valid config")
    }

    #[test]
    fn missing_submit_handler_is_rejected() {
        let err = Form::new(FormConfig::new()).expect_err("must fail");
        assert!(matches!(err, FormError::MissingSubmitHandler));
    }

    #[test]
    fn non_object_initial_values_are_rejected() {
        let err = Form::new(
            FormConfig::new()
                .initial_values(json!([1, 2]))
                .on_submit(SubmitHandler::sync(|_| None)),
        )
        .expect_err("must fail");
        assert_eq!(err.to_string(), "initial values must be an object, found array");
    }

    #[test]
    fn change_ignores_unregistered_fields() {
        let form = form(FormConfig::new());
        form.change("ghost", json!("boo"));
        assert_eq!(form.get_state().values, Some(json!({})));
    }

    #[test]
    fn focus_and_blur_track_active_field() {
        let form = form(FormConfig::new());
        let unsubscribe = form.register_field("a", |_| {}, FieldSubscription::all(), FieldConfig::new());
        form.focus("a");
        assert_eq!(form.get_state().active, Some(Some("a".to_owned())));
        let state = form.get_field_state("a").expect("registered");
        assert_eq!((state.active, state.visited, state.touched), (Some(true), Some(true), Some(false)));

        form.blur("a");
        assert_eq!(form.get_state().active, Some(None));
        let state = form.get_field_state("a").expect("registered");
        assert_eq!((state.active, state.touched), (Some(false), Some(true)));
        unsubscribe.unsubscribe();
        assert!(form.get_registered_fields().is_empty());
    }

    #[test]
    fn unregistering_active_field_clears_active() {
        let form = form(FormConfig::new());
        let unsubscribe = form.register_field("a", |_| {}, FieldSubscription::empty(), FieldConfig::new());
        form.focus("a");
        unsubscribe.unsubscribe();
        assert_eq!(form.get_state().active, Some(None));
    }

    #[test]
    fn mutator_changes_several_values_in_one_pass() {
        let form = form(FormConfig::new().initial_values(json!({ "a": 1, "b": 2 })));
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let _sub = form.subscribe(move |_| counter.set(counter.get() + 1), FormSubscription::VALUES);
        let swapped = form.mutate(|m| {
            let a = m.get_in("a").cloned();
            let b = m.get_in("b").cloned();
            m.change_value("a", |_| b) && m.change_value("b", |_| a)
        });
        assert!(swapped);
        assert_eq!(form.get_state().values, Some(json!({ "a": 2, "b": 1 })));
        assert_eq!(calls.get(), 2, "initial delivery plus one pass");
    }

    #[test]
    fn debug_hook_sees_every_field() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let form = form(FormConfig::new().debug(move |state, fields| {
            sink.borrow_mut()
                .push((state.pristine, fields.keys().cloned().collect::<Vec<_>>()));
        }));
        let _a = form.register_field("a", |_| {}, FieldSubscription::VALUE, FieldConfig::new());
        form.change("a", json!("x"));
        let seen = seen.borrow();
        assert_eq!(seen.last(), Some(&(Some(false), vec!["a".to_owned()])));
    }

    #[test]
    fn form_debug_formats() {
        let form = form(FormConfig::new());
        let rendered = format!("{form:?}");
        assert!(rendered.starts_with("Form"));
        assert!(rendered.contains("batch_depth: 0"));
    }
}
