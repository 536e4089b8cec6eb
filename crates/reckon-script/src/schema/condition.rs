//! Condition definition schema

use crate::error::{Error, Result};
use reckon_core::{all_of, any_of, ConditionCallback, ValueId, ValueRegistry};
use serde::{Deserialize, Serialize};

/// Definition of a latching condition
///
/// The formula is either given directly in `expression`, or assembled from
/// the `all` or `any` lists of sub-formulas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDef {
    pub id: String,
    #[serde(default)]
    pub expression: Option<String>,
    /// Met when every listed formula is met
    #[serde(default)]
    pub all: Vec<String>,
    /// Met when any listed formula is met
    #[serde(default)]
    pub any: Vec<String>,
    /// Saved state: the condition was already met
    #[serde(default)]
    pub met: bool,
    #[serde(default)]
    pub description: String,
}

impl ConditionDef {
    /// Create a condition from a formula
    pub fn new(id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expression: Some(expression.into()),
            all: Vec::new(),
            any: Vec::new(),
            met: false,
            description: String::new(),
        }
    }

    /// The formula this condition registers with
    pub fn formula(&self) -> Result<String> {
        match (&self.expression, self.all.is_empty(), self.any.is_empty()) {
            (Some(expression), true, true) => Ok(expression.clone()),
            (None, false, true) => Ok(all_of(self.all.as_slice())),
            (None, true, false) => Ok(any_of(self.any.as_slice())),
            (None, true, true) => Err(Error::invalid(
                &self.id,
                "needs an expression, `all` or `any`",
            )),
            _ => Err(Error::invalid(
                &self.id,
                "only one of expression, `all` and `any` may be given",
            )),
        }
    }

    /// Register this condition with an optional callback
    pub fn register(
        &self,
        registry: &mut ValueRegistry,
        on_met: Option<ConditionCallback>,
    ) -> Result<ValueId> {
        let formula = self.formula()?;
        Ok(registry.register_condition(&self.id, &formula, self.met, on_met)?)
    }
}
