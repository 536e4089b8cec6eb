//! Reckon Script - RON loader and schema definitions
//!
//! Loads value graphs from RON documents:
//! - Constants and formulas
//! - Resources with their delta/base/mult/flat formulas
//! - Conditions, optionally with persisted "met" state
//! - Registry configuration

mod error;
mod loader;
mod schema;

pub use error::{Error, Result};
pub use loader::{Definitions, Loader};
pub use schema::{ConditionDef, ResourceDef, ValueDef};
