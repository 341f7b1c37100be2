#![forbid(unsafe_code)]

//! Framework-agnostic reactive form state.
//!
//! A [`Form`] tracks the values, validity and interaction history of named
//! fields and tells observers about changes. Each observer names the keys it
//! cares about with a mask and is invoked only when one of those keys
//! actually changed.
//!
//! ```
//! use formstate::{FieldConfig, FieldSubscription, Form, FormConfig, SubmitHandler, Validation};
//! use serde_json::json;
//!
//! let form = Form::new(
//!     FormConfig::new()
//!         .validate(|values| match values.get("username") {
//!             Some(_) => Validation::ok(),
//!             None => Validation::error(json!({ "username": "Required" })),
//!         })
//!         .on_submit(SubmitHandler::sync(|_| None)),
//! )?;
//! let username = form.register_field(
//!     "username",
//!     |state| println!("username error: {:?}", state.error),
//!     FieldSubscription::ERROR,
//!     FieldConfig::new(),
//! );
//! form.change("username", json!("erikras"));
//! assert!(form.submit().is_none());
//! assert_eq!(form.get_state().submit_succeeded, Some(true));
//! username.unsubscribe();
//! # Ok::<(), formstate::FormError>(())
//! ```

pub mod config;
pub mod error;
mod form;
mod notify;
mod pending;
mod state;
mod submit;
pub mod subscription;
pub mod validation;

pub use config::{
    DebugHook, FieldConfig, FieldValidator, FormConfig, FormOptions, RecordValidator,
    SubmitFuture, SubmitHandler,
};
pub use error::{FormError, Result};
pub use form::{Form, Mutator};
pub use state::{FieldHandle, FieldState, FormState};
pub use submit::SubmitCallback;
pub use subscription::{
    FieldSubscription, FormSubscription, Unsubscribe, field_subscription_items,
    form_subscription_items,
};
pub use validation::Validation;

/// Error-tree key holding the whole-form error. Brackets are path
/// separators, so no field name can address it.
pub const FORM_ERROR: &str = "[[form-error]]";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
