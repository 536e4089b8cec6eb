//! Resource definition schema

use crate::error::Result;
use reckon_core::{ResourceFormulas, ValueId, ValueRegistry};
use serde::{Deserialize, Serialize};

/// Definition of an accumulating resource (e.g., gold, wood)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    /// Unique identifier for this resource
    pub id: String,
    /// Change per unit of time
    #[serde(default = "default_zero")]
    pub delta: String,
    #[serde(default = "default_zero")]
    pub base: String,
    #[serde(default = "default_one")]
    pub mult: String,
    #[serde(default = "default_zero")]
    pub flat: String,
    /// Accumulated amount to start from
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub description: String,
}

fn default_zero() -> String {
    "0".to_string()
}

fn default_one() -> String {
    "1".to_string()
}

impl ResourceDef {
    /// Create a resource definition with default formulas
    pub fn new(id: impl Into<String>) -> Self {
        let formulas = ResourceFormulas::default();
        Self {
            id: id.into(),
            delta: formulas.delta,
            base: formulas.base,
            mult: formulas.mult,
            flat: formulas.flat,
            amount: 0.0,
            description: String::new(),
        }
    }

    /// The four formulas as the registry takes them
    pub fn formulas(&self) -> ResourceFormulas {
        ResourceFormulas {
            delta: self.delta.clone(),
            base: self.base.clone(),
            mult: self.mult.clone(),
            flat: self.flat.clone(),
        }
    }

    /// Register this resource and apply its starting amount
    pub fn register(&self, registry: &mut ValueRegistry) -> Result<ValueId> {
        let vid = registry.register_resource(&self.id, self.formulas())?;
        if self.amount != 0.0 {
            registry.set(&self.id, self.amount)?;
        }
        Ok(vid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_def_ron() {
        let ron_str = r#"
        (
            id: "gold",
            delta: "miners * 2",
            flat: "5",
            amount: 10.0,
        )
        "#;

        let def: ResourceDef = ron::from_str(ron_str).unwrap();
        assert_eq!(def.id, "gold");
        assert_eq!(def.delta, "miners * 2");
        assert_eq!(def.base, "0");
        assert_eq!(def.mult, "1");
        assert_eq!(def.flat, "5");
        assert_eq!(def.amount, 10.0);
    }

    #[test]
    fn test_register_with_amount() {
        let mut def = ResourceDef::new("wood");
        def.delta = "1".to_string();
        def.amount = 3.0;

        let mut registry = ValueRegistry::new();
        def.register(&mut registry).unwrap();
        assert_eq!(registry.get("wood").unwrap().as_f64(), 3.0);

        registry.tick(2.0).unwrap();
        assert_eq!(registry.get("wood").unwrap().as_f64(), 5.0);
    }
}
