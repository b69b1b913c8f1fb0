//! Path-aware validation for extracted document data.
//!
//! The crate is built around one trait and one engine:
//!
//! - [`Validator<T>`] checks a value and returns every [`ValidationIssue`] it
//!   finds. Composite validators delegate to nested ones and re-address their
//!   issues, so a failure deep inside a structure is reported at its full path
//!   (`lineItems[2].unitPrice`, `retry.maxIntervalMs`) with the nested
//!   validator's code, offending value and metadata intact.
//! - [`ValidationEngine<T>`] runs a validator either as a `Result`
//!   ([`validate`](ValidationEngine::validate)) or as an assertion
//!   ([`assert_valid`](ValidationEngine::assert_valid)).
//!
//! [`schema`] provides JSON validators (`ObjectSchema`, `ArraySchema`, leaf
//! rules) that also describe themselves as JSON Schema, and [`normalize`] the
//! amount/currency/date canonicalization they apply before checking.
//!
//! ```rust
//! use serde_json::json;
//! use validation::{codes, CurrencyRule, NumberRule, ObjectSchema, StringRule, ValidationEngine};
//!
//! let check = ObjectSchema::new("check")
//!     .required("checkNumber", StringRule::non_empty())
//!     .required("payee", StringRule::non_empty())
//!     .required("amount", NumberRule::new().min(0.0))
//!     .optional("currency", CurrencyRule::new());
//! let engine = ValidationEngine::new(check);
//!
//! let ok = engine
//!     .normalize_and_validate(json!({
//!         "checkNumber": 12345,
//!         "payee": "John Smith",
//!         "amount": "$1,234.56",
//!         "currency": "usd"
//!     }))
//!     .unwrap();
//! assert_eq!(ok["amount"], json!(1234.56));
//! assert_eq!(ok["currency"], "USD");
//!
//! let err = engine.validate(json!({ "payee": "", "amount": -5 })).unwrap_err();
//! let codes_found: Vec<&str> = err.issues().iter().map(|i| i.code()).collect();
//! assert_eq!(codes_found, vec![codes::REQUIRED, codes::TOO_SHORT, codes::TOO_SMALL]);
//! ```

mod error;
mod issue;
pub mod normalize;
mod path;
pub mod schema;
mod validator;

pub use error::ValidationError;
pub use issue::{codes, ValidationIssue, VALIDATOR_METADATA_KEY};
pub use path::{format_path, PathSegment};
pub use schema::{
    ArraySchema, BooleanRule, CurrencyRule, NumberRule, ObjectSchema, OneOf, StringFormat,
    StringRule, TimestampRule,
};
pub use validator::{Issues, ValidationEngine, Validator};
