#![forbid(unsafe_code)]

//! Form and field configuration.
//!
//! [`FormConfig`] carries the behavior a form needs (submission handler,
//! record-level validator, debug hook) plus the data-only [`FormOptions`].
//! `FormOptions` is `serde`-loadable so hosts can keep defaults in a JSON
//! document:
//!
//! ```ignore
//! let options = FormOptions::from_json(r#"{ "initialValues": { "name": "erikras" }, "validateOnBlur": true }"#)?;
//! let form = Form::new(FormConfig::new().options(options).on_submit(SubmitHandler::sync(|_| None)))?;
//! ```
//!
//! # Failure Modes
//!
//! - Missing submit handler: [`Form::new`](crate::Form::new) returns
//!   [`FormError::MissingSubmitHandler`].
//! - Unknown or mistyped option keys: [`FormOptions::from_json`] returns
//!   [`FormError::InvalidOptions`].

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::state::{FieldState, FormState};
use crate::submit::SubmitCallback;
use crate::validation::Validation;

/// Record-level validator: receives a copy of all values.
pub type RecordValidator = Rc<dyn Fn(&Value) -> Validation>;

/// Field-level validator: receives the field value (absent as `None`) and all
/// values.
pub type FieldValidator = Rc<dyn Fn(Option<&Value>, &Value) -> Validation>;

/// Called after every internal recompute with the full form state and every
/// field's full state.
pub type DebugHook = Rc<dyn Fn(&FormState, &BTreeMap<String, FieldState>)>;

/// Future returned by an asynchronous submission.
pub type SubmitFuture = LocalBoxFuture<'static, Option<Value>>;

/// The three submission calling conventions.
///
/// Each receives the current values. A returned error tree that is non-empty
/// (including one holding only [`FORM_ERROR`](crate::FORM_ERROR)) marks the
/// submission as failed; `None` or `{}` marks it as succeeded.
#[derive(Clone)]
pub enum SubmitHandler {
    /// Completes before returning.
    Sync(Rc<dyn Fn(&Value) -> Option<Value>>),
    /// Completes by calling [`SubmitCallback::complete`], now or later.
    Callback(Rc<dyn Fn(&Value, SubmitCallback)>),
    /// Completes when the returned future resolves.
    Async(Rc<dyn Fn(&Value) -> SubmitFuture>),
}

impl SubmitHandler {
    pub fn sync(handler: impl Fn(&Value) -> Option<Value> + 'static) -> Self {
        Self::Sync(Rc::new(handler))
    }

    pub fn callback(handler: impl Fn(&Value, SubmitCallback) + 'static) -> Self {
        Self::Callback(Rc::new(handler))
    }

    pub fn future(handler: impl Fn(&Value) -> SubmitFuture + 'static) -> Self {
        Self::Async(Rc::new(handler))
    }

    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::Sync(_) => "sync",
            Self::Callback(_) => "callback",
            Self::Async(_) => "async",
        }
    }
}

impl fmt::Debug for SubmitHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubmitHandler").field(&self.mode()).finish()
    }
}

/// Data-only form options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FormOptions {
    pub initial_values: Option<Value>,
    /// Validate on blur instead of on every change.
    pub validate_on_blur: bool,
}

impl FormOptions {
    /// Parse options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Everything needed to build a [`Form`](crate::Form).
#[derive(Clone, Default)]
pub struct FormConfig {
    pub(crate) on_submit: Option<SubmitHandler>,
    pub(crate) validate: Option<RecordValidator>,
    pub(crate) options: FormOptions,
    pub(crate) debug: Option<DebugHook>,
}

impl FormConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_submit(mut self, handler: SubmitHandler) -> Self {
        self.on_submit = Some(handler);
        self
    }

    #[must_use]
    pub fn validate(mut self, validator: impl Fn(&Value) -> Validation + 'static) -> Self {
        self.validate = Some(Rc::new(validator));
        self
    }

    #[must_use]
    pub fn initial_values(mut self, values: Value) -> Self {
        self.options.initial_values = Some(values);
        self
    }

    #[must_use]
    pub fn validate_on_blur(mut self, enabled: bool) -> Self {
        self.options.validate_on_blur = enabled;
        self
    }

    /// Replace all data options at once.
    #[must_use]
    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn debug(
        mut self,
        hook: impl Fn(&FormState, &BTreeMap<String, FieldState>) + 'static,
    ) -> Self {
        self.debug = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for FormConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormConfig")
            .field("on_submit", &self.on_submit)
            .field("validate", &self.validate.is_some())
            .field("options", &self.options)
            .field("debug", &self.debug.is_some())
            .finish()
    }
}

/// Per-registration field options.
#[derive(Clone, Default)]
pub struct FieldConfig {
    pub(crate) validate: Option<FieldValidator>,
    pub(crate) validate_fields: Option<Vec<String>>,
}

impl FieldConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn validate(
        mut self,
        validator: impl Fn(Option<&Value>, &Value) -> Validation + 'static,
    ) -> Self {
        self.validate = Some(Rc::new(validator));
        self
    }

    /// Fields whose validators re-run when this field changes. The field
    /// itself always revalidates. Unset means every field revalidates.
    #[must_use]
    pub fn validate_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validate_fields = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("validate", &self.validate.is_some())
            .field("validate_fields", &self.validate_fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormError;
    use serde_json::json;

    #[test]
    fn options_parse_camel_case() {
        let options =
            FormOptions::from_json(r#"{ "initialValues": { "a": 1 }, "validateOnBlur": true }"#)
                .expect("valid options");
        assert_eq!(options.initial_values, Some(json!({ "a": 1 })));
        assert!(options.validate_on_blur);
    }

    #[test]
    fn options_default_when_empty() {
        let options = FormOptions::from_json("{}").expect("valid options");
        assert_eq!(options, FormOptions::default());
    }

    #[test]
    fn options_reject_unknown_keys() {
        let err = FormOptions::from_json(r#"{ "validateOnChange": true }"#)
            .expect_err("unknown key must fail");
        assert!(matches!(err, FormError::InvalidOptions(_)));
        assert!(err.to_string().starts_with("invalid form options"));
    }

    #[test]
    fn builder_sets_options() {
        let config = FormConfig::new()
            .initial_values(json!({ "x": true }))
            .validate_on_blur(true)
            .on_submit(SubmitHandler::sync(|_| None));
        assert!(config.options.validate_on_blur);
        assert_eq!(config.options.initial_values, Some(json!({ "x": true })));
        let debug = format!("{config:?}");
        assert!(debug.contains("sync"));
    }

    #[test]
    fn field_config_collects_names() {
        let config = FieldConfig::new().validate_fields(["a", "b"]);
        assert_eq!(
            config.validate_fields,
            Some(vec!["a".to_owned(), "b".to_owned()])
        );
        assert!(config.validate.is_none());
    }
}
