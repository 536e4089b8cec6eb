//! Constant and formula definition schema

use crate::error::{Error, Result};
use reckon_core::{ValueId, ValueRegistry};
use serde::{Deserialize, Serialize};

/// A plain value: either a constant number or a formula
///
/// Exactly one of `expression` and `value` must be given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDef {
    /// Identifier other formulas use to read this value
    pub id: String,
    /// Formula text
    #[serde(default)]
    pub expression: Option<String>,
    /// Constant number
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub description: String,
}

impl ValueDef {
    /// Create a constant definition
    pub fn constant(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            expression: None,
            value: Some(value),
            description: String::new(),
        }
    }

    /// Create a formula definition
    pub fn formula(id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expression: Some(expression.into()),
            value: None,
            description: String::new(),
        }
    }

    /// Check that exactly one of `expression` and `value` is set
    pub fn validate(&self) -> Result<()> {
        match (&self.expression, self.value) {
            (Some(_), Some(_)) => Err(Error::invalid(
                &self.id,
                "has both an expression and a value",
            )),
            (None, None) => Err(Error::invalid(
                &self.id,
                "needs either an expression or a value",
            )),
            _ => Ok(()),
        }
    }

    /// Register this value
    pub fn register(&self, registry: &mut ValueRegistry) -> Result<ValueId> {
        self.validate()?;
        match (&self.expression, self.value) {
            (Some(expression), _) => Ok(registry.register_formula(&self.id, expression)?),
            (None, Some(value)) => Ok(registry.register_constant(&self.id, value)),
            (None, None) => Err(Error::invalid(&self.id, "nothing to register")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_def_ron() {
        let ron_str = r#"
        (
            id: "upgrade_cost",
            expression: Some("(level * 2) ^ 2 / 2"),
            description: "Gold needed for the next level",
        )
        "#;

        let def: ValueDef = ron::from_str(ron_str).unwrap();
        assert_eq!(def.id, "upgrade_cost");
        assert_eq!(def.expression.as_deref(), Some("(level * 2) ^ 2 / 2"));
        assert_eq!(def.value, None);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut def = ValueDef::constant("level", 1.0);
        assert!(def.validate().is_ok());

        def.expression = Some("2".to_string());
        assert!(matches!(
            def.validate(),
            Err(Error::InvalidDefinition { .. })
        ));

        def.expression = None;
        def.value = None;
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_register() {
        let mut registry = ValueRegistry::new();
        ValueDef::constant("level", 4.0)
            .register(&mut registry)
            .unwrap();
        ValueDef::formula("double", "level * 2")
            .register(&mut registry)
            .unwrap();
        assert_eq!(registry.get("double").unwrap().as_f64(), 8.0);
    }
}
