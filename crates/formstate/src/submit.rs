#![forbid(unsafe_code)]

//! Completion handle for callback-style submission.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::form::FormInner;

/// Passed to a [`SubmitHandler::Callback`](crate::SubmitHandler::Callback)
/// handler; call [`complete`](Self::complete) exactly once with the
/// submission errors (or `None` on success).
///
/// May be completed before the handler returns, in which case
/// [`Form::submit`](crate::Form::submit) returns `None`, or later from any
/// code running on the form's thread. Dropping it uncompleted resolves the
/// submit future to `None` and leaves the form `submitting`.
pub struct SubmitCallback {
    form: Weak<FormInner>,
    done: async_channel::Sender<Option<Value>>,
    completed: Rc<Cell<bool>>,
}

impl SubmitCallback {
    pub(crate) fn new(
        form: Weak<FormInner>,
        done: async_channel::Sender<Option<Value>>,
        completed: Rc<Cell<bool>>,
    ) -> Self {
        Self {
            form,
            done,
            completed,
        }
    }

    /// Finish the submission.
    pub fn complete(self, errors: Option<Value>) {
        self.completed.set(true);
        if let Some(form) = self.form.upgrade() {
            form.complete_submit(errors.clone());
        }
        // Nobody is waiting when the handler completed synchronously.
        let _ = self.done.try_send(errors);
    }
}

impl Drop for SubmitCallback {
    fn drop(&mut self) {
        if !self.completed.get() {
            tracing::warn!(message = "submit.callback_dropped");
        }
    }
}

impl fmt::Debug for SubmitCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitCallback")
            .field("completed", &self.completed.get())
            .field("attached", &(self.form.strong_count() > 0))
            .finish()
    }
}
