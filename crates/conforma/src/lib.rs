//! # conforma
//!
//! Filter, reshape and validate loosely-typed documents in one pass.
//!
//! A [`Conforma`] pipeline owns one JSON document. Named filters clean its
//! fields, the document can be reduced to a template shape, and named
//! validators check every field concurrently. A failed run reports every
//! failure at once in a single [`StructuralError`].
//!
//! ## Quick Start
//!
//! ```
//! use conforma::prelude::*;
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let mut form = Conforma::new();
//! form.set_data(json!({"name": "  Alice ", "age": "42abc", "email": "nope"}))
//!     .filter("name", "trim")?
//!     .filter("age", "int")?
//!     .validate("age", ["required", "number"])?
//!     .validate("email", "email")?;
//!
//! let err = form.execute().await.unwrap_err();
//! assert_eq!(err.len(), 1);
//! assert_eq!(err.field("email").unwrap().message, "email.invalid.format");
//! assert_eq!(form.get_value("age"), Some(&json!(42)));
//! # Ok::<(), ConfigError>(())
//! # }).unwrap();
//! ```
//!
//! ## Extending
//!
//! Filters and validators are looked up by name in a [`Registry`]. Build one
//! from [`Registry::builtin`], register your own functions, and hand it to
//! [`Conforma::with_registry`]. Closures can also be passed directly as
//! [`FilterStep::inline`] and [`ValidatorSpec::inline`].
//!
//! ## Features
//!
//! - `dns` (default): system DNS resolver for the `emailMx` validator.
//!   Without it `emailMx` needs a resolver injected with
//!   [`Registry::with_mx_resolver`].

// StructuralError is returned by value from every pipeline run; boxing it
// would only move the allocation.
#![allow(clippy::result_large_err)]

pub mod config;
pub mod error;
pub mod filter;
pub mod merge;
pub mod path;
pub mod pipeline;
pub mod prelude;
pub mod registry;
pub mod temporal;
pub mod validator;
pub mod value;

pub use config::PipelineConfig;
pub use error::{ConfigError, Failure, StructuralError, ValidationError, ValidatorFault};
pub use filter::{FilterChain, FilterRegistry, FilterStep, FilterSteps, PathList};
pub use pipeline::{Conform, Conforma};
pub use registry::Registry;
pub use validator::{
    Check, CheckFuture, Outcome, ValidatorChain, ValidatorFn, ValidatorRegistry, ValidatorSpec,
    ValidatorSpecs, async_validator, mounted, sync_validator,
};
