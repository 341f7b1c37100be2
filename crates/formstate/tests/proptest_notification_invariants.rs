//! Property-based invariant tests for form notification and derived state.
//!
//! Drives a form through random sequences of changes, focus moves,
//! submissions, resets, batches (which may attach observers part way
//! through) and deferred-work polling, then checks:
//!
//! 1. Never panics on any operation sequence
//! 2. Minimality: consecutive deliveries to one observer always differ
//! 3. `pristine` holds iff every registered field equals its initial value
//! 4. `valid` holds iff no error, no errors, and no submission errors
//! 5. Draining deferred work always returns `validating` to false
//! 6. Reset restores initial values and clears submission state
//! 7. The form's `active` pointer always names an active field
//! 8. Freshness: every observer's latest delivery matches the current masked
//!    state, including observers attached in the middle of a batch

use std::cell::RefCell;
use std::rc::Rc;

use formstate::{
    FieldConfig, FieldState, FieldSubscription, Form, FormConfig, FormState, FormSubscription,
    SubmitHandler, Validation,
};
use proptest::prelude::*;
use serde_json::{Value, json};

// ── Helpers ──────────────────────────────────────────────────────────

const FIELDS: [&str; 3] = ["a", "b.c", "list[1]"];

#[derive(Debug, Clone)]
enum Op {
    Change(usize, Value),
    Focus(usize),
    Blur(usize),
    Submit,
    Reset,
    Batch(Vec<Step>),
    Drain,
}

#[derive(Debug, Clone)]
enum Step {
    Change(usize, Value),
    Subscribe,
    Register(usize),
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!("x")),
        Just(json!("bad")),
        (0i64..4).prop_map(Value::from),
    ]
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0..FIELDS.len(), arb_value()).prop_map(|(i, v)| Step::Change(i, v)),
        1 => Just(Step::Subscribe),
        1 => (0..FIELDS.len()).prop_map(Step::Register),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..FIELDS.len(), arb_value()).prop_map(|(i, v)| Op::Change(i, v)),
        1 => (0..FIELDS.len()).prop_map(Op::Focus),
        1 => (0..FIELDS.len()).prop_map(Op::Blur),
        1 => Just(Op::Submit),
        1 => Just(Op::Reset),
        1 => proptest::collection::vec(arb_step(), 1..5).prop_map(Op::Batch),
        1 => Just(Op::Drain),
    ]
}

type Log<S> = Rc<RefCell<Vec<S>>>;

const FORM_MASK: FormSubscription = FormSubscription::PRISTINE
    .union(FormSubscription::VALID)
    .union(FormSubscription::SUBMIT_FAILED)
    .union(FormSubscription::VALUES);

const FIELD_MASK: FieldSubscription = FieldSubscription::VALUE
    .union(FieldSubscription::ERROR)
    .union(FieldSubscription::TOUCHED);

struct Harness {
    form: Form,
    form_logs: RefCell<Vec<Log<FormState>>>,
    field_logs: RefCell<Vec<(usize, Log<FieldState>)>>,
}

impl Harness {
    fn subscribe(&self) {
        let log: Log<FormState> = Rc::default();
        let sink = Rc::clone(&log);
        // Dropping an `Unsubscribe` keeps the subscription alive.
        let _ = self
            .form
            .subscribe(move |state| sink.borrow_mut().push(state.clone()), FORM_MASK);
        self.form_logs.borrow_mut().push(log);
    }

    fn register(&self, i: usize, config: FieldConfig) {
        let log: Log<FieldState> = Rc::default();
        let sink = Rc::clone(&log);
        let _ = self.form.register_field(
            FIELDS[i],
            move |state| sink.borrow_mut().push(state.clone()),
            FIELD_MASK,
            config,
        );
        self.field_logs.borrow_mut().push((i, log));
    }
}

fn harness() -> Harness {
    let form = Form::new(
        FormConfig::new()
            .initial_values(json!({ "a": 1, "b": { "c": "x" } }))
            .validate(|values| match values.get("a") {
                Some(Value::String(s)) if s == "bad" => Validation::error(json!({ "a": "Bad" })),
                _ => Validation::ok(),
            })
            .on_submit(SubmitHandler::sync(|values| {
                (values.get("a") == Some(&json!(3))).then(|| json!({ "a": "Rejected" }))
            })),
    )
    .expect("valid config");

    let h = Harness {
        form,
        form_logs: RefCell::default(),
        field_logs: RefCell::default(),
    };
    h.subscribe();
    for (i, &name) in FIELDS.iter().enumerate() {
        let config = if name == "b.c" {
            FieldConfig::new().validate(|value, _| {
                let bad = value == Some(&json!("bad"));
                Validation::deferred(async move { bad.then(|| json!("Bad")) })
            })
        } else {
            FieldConfig::new()
        };
        h.register(i, config);
    }
    h
}

fn apply(h: &Harness, op: &Op) {
    let form = &h.form;
    match op {
        Op::Change(i, value) => form.change(FIELDS[*i], value.clone()),
        Op::Focus(i) => form.focus(FIELDS[*i]),
        Op::Blur(i) => form.blur(FIELDS[*i]),
        Op::Submit => {
            let _ = form.submit();
        }
        Op::Reset => form.reset(),
        Op::Batch(steps) => form.batch(|| {
            for step in steps {
                match step {
                    Step::Change(i, value) => form.change(FIELDS[*i], value.clone()),
                    Step::Subscribe => h.subscribe(),
                    Step::Register(i) => h.register(*i, FieldConfig::new()),
                }
            }
        }),
        Op::Drain => {
            form.run_until_stalled();
        }
    }
}

fn is_empty_tree(tree: Option<&Value>) -> bool {
    match tree {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Never panics
// 2. Minimality
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn deliveries_are_minimal(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let h = harness();
        for op in &ops {
            apply(&h, op);
        }
        h.form.run_until_stalled();

        for log in h.form_logs.borrow().iter() {
            let log = log.borrow();
            prop_assert!(!log.is_empty());
            for pair in log.windows(2) {
                prop_assert_ne!(&pair[0], &pair[1]);
            }
        }
        for (_, log) in h.field_logs.borrow().iter() {
            let log = log.borrow();
            prop_assert!(!log.is_empty());
            for pair in log.windows(2) {
                prop_assert_ne!(&pair[0], &pair[1]);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. pristine iff every registered field equals its initial value
// 4. valid iff every error tree is empty
// 7. active bookkeeping
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn derived_state_is_consistent(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let h = harness();
        for op in &ops {
            apply(&h, op);

            let state = h.form.get_state();
            let fields: Vec<FieldState> = FIELDS
                .iter()
                .filter_map(|name| h.form.get_field_state(name))
                .collect();
            prop_assert_eq!(fields.len(), FIELDS.len());

            let all_pristine = fields.iter().all(|f| f.value == f.initial);
            prop_assert_eq!(state.pristine, Some(all_pristine));
            prop_assert_eq!(state.dirty, Some(!all_pristine));

            let clean = state.error == Some(Value::Null)
                && state.submit_error == Some(Value::Null)
                && is_empty_tree(state.errors.as_ref())
                && is_empty_tree(state.submit_errors.as_ref());
            prop_assert_eq!(state.valid, Some(clean));
            prop_assert_eq!(state.invalid, Some(!clean));

            if let Some(Some(name)) = &state.active {
                let field = fields.iter().find(|f| &f.name == name);
                prop_assert_eq!(field.and_then(|f| f.active), Some(true));
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Draining deferred work clears `validating`
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn draining_settles_validation(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let h = harness();
        for op in &ops {
            apply(&h, op);
        }
        prop_assert_eq!(h.form.run_until_stalled(), 0);
        prop_assert_eq!(h.form.pending_tasks(), 0);
        prop_assert_eq!(h.form.get_state().validating, Some(false));

        let bad = h.form.get_field_state("b.c").and_then(|f| f.value) == Some(json!("bad"));
        let error = h.form.get_field_state("b.c").and_then(|f| f.error);
        prop_assert_eq!(error, Some(if bad { json!("Bad") } else { Value::Null }));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Reset restores initial values and clears submission state
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn reset_restores_initial(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let h = harness();
        for op in &ops {
            apply(&h, op);
        }
        h.form.reset();

        let state = h.form.get_state();
        prop_assert_eq!(state.values, state.initial_values.clone());
        prop_assert_eq!(state.pristine, Some(true));
        prop_assert_eq!(state.submit_failed, Some(false));
        prop_assert_eq!(state.submit_succeeded, Some(false));
        prop_assert_eq!(state.dirty_since_last_submit, Some(false));
        for name in FIELDS {
            let field = h.form.get_field_state(name);
            prop_assert_eq!(field.as_ref().and_then(|f| f.touched), Some(false));
            prop_assert_eq!(field.as_ref().and_then(|f| f.visited), Some(false));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 8. Every observer ends up holding the current masked state
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn observers_hold_current_state(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let h = harness();
        for op in &ops {
            apply(&h, op);
        }
        h.form.run_until_stalled();

        let expected = h.form.get_state().filtered(FORM_MASK);
        for log in h.form_logs.borrow().iter() {
            let log = log.borrow();
            prop_assert_eq!(log.last(), Some(&expected));
        }
        for (i, log) in h.field_logs.borrow().iter() {
            let expected = h.form.get_field_state(FIELDS[*i]).map(|s| s.filtered(FIELD_MASK));
            prop_assert_eq!(log.borrow().last().cloned(), expected);
        }
    }
}
