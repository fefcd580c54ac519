//! Prelude module for convenient imports.
//!
//! `use conforma::prelude::*;` brings in the pipeline, its argument types and
//! the error types a caller matches on.

// ============================================================================
// PIPELINE
// ============================================================================

pub use crate::config::PipelineConfig;
pub use crate::pipeline::{Conform, Conforma};
pub use crate::registry::Registry;

// ============================================================================
// STEPS & SPECS
// ============================================================================

pub use crate::filter::{FilterStep, FilterSteps, PathList};
pub use crate::validator::{
    Check, Outcome, ValidatorSpec, ValidatorSpecs, async_validator, mounted, sync_validator,
};

// ============================================================================
// ERRORS
// ============================================================================

pub use crate::error::{ConfigError, Failure, StructuralError, ValidationError, ValidatorFault};
