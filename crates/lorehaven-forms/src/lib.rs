//! Declarative forms and the validation engine behind them.
//!
//! A [`FormSchema`] describes what a renderer shows; a [`TypedSchema`] describes
//! what a submission must look like. [`validate`] turns raw JSON into a
//! normalized value or a list of field errors and never fails on user input.
//!
//! ```
//! use lorehaven_forms::{catalog, validate};
//! use serde_json::json;
//!
//! let otp = catalog::get(catalog::OTP).unwrap();
//! assert!(validate(&otp.schema, &json!({ "code": "123456" })).is_ok());
//! assert!(validate(&otp.schema, &json!({ "code": "12a456" })).is_err());
//! ```

pub mod catalog;
pub mod error;
pub mod field;
pub mod form;
pub mod rule;
pub mod validate;

pub use error::{Constraint, FieldError, SchemaError, ValidationErrors};
pub use field::{FieldDescriptor, FieldKind};
pub use form::FormSchema;
pub use rule::{EnumRule, NumberRule, Rule, StringRule, TypedSchema};
pub use validate::{Validated, validate};
