//! RON definition loader

use crate::error::{Error, Result};
use crate::schema::{ConditionDef, ResourceDef, ValueDef};
use reckon_core::{ConditionCallback, RegistryConfig, ValueRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Loaded value graph definitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Definitions {
    /// Registry configuration, if the document carries one
    pub config: Option<RegistryConfig>,
    /// Constants and formulas
    pub values: Vec<ValueDef>,
    pub resources: Vec<ResourceDef>,
    pub conditions: Vec<ConditionDef>,
}

impl Definitions {
    /// Create empty definitions
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value definition
    pub fn get_value(&self, id: &str) -> Option<&ValueDef> {
        self.values.iter().find(|d| d.id == id)
    }

    /// Get a resource definition
    pub fn get_resource(&self, id: &str) -> Option<&ResourceDef> {
        self.resources.iter().find(|d| d.id == id)
    }

    /// Get a condition definition
    pub fn get_condition(&self, id: &str) -> Option<&ConditionDef> {
        self.conditions.iter().find(|d| d.id == id)
    }

    /// Total number of definitions
    pub fn len(&self) -> usize {
        self.values.len() + self.resources.len() + self.conditions.len()
    }

    /// Check if there are no definitions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register everything into `registry`, conditions without callbacks
    pub fn apply(&self, registry: &mut ValueRegistry) -> Result<()> {
        self.apply_with(registry, |_| None)
    }

    /// Register everything into `registry`
    ///
    /// Values go first, then resources, then conditions. `callbacks` is asked
    /// once per condition for the callback to attach.
    pub fn apply_with<F>(&self, registry: &mut ValueRegistry, mut callbacks: F) -> Result<()>
    where
        F: FnMut(&ConditionDef) -> Option<ConditionCallback>,
    {
        debug!(
            "Applying {} values, {} resources, {} conditions",
            self.values.len(),
            self.resources.len(),
            self.conditions.len()
        );
        for def in &self.values {
            def.register(registry)?;
        }
        for def in &self.resources {
            def.register(registry)?;
        }
        for def in &self.conditions {
            def.register(registry, callbacks(def))?;
        }
        Ok(())
    }

    /// Create a registry from the document's config and apply everything
    pub fn build_registry(&self) -> Result<ValueRegistry> {
        self.build_registry_with(|_| None)
    }

    /// Like [`Definitions::build_registry`], attaching condition callbacks
    pub fn build_registry_with<F>(&self, callbacks: F) -> Result<ValueRegistry>
    where
        F: FnMut(&ConditionDef) -> Option<ConditionCallback>,
    {
        let config = self.config.clone().unwrap_or_default();
        let mut registry = ValueRegistry::with_config(config);
        self.apply_with(&mut registry, callbacks)?;
        Ok(registry)
    }
}

/// Loader for RON definition documents
pub struct Loader {
    defs: Definitions,
    ids: HashSet<String>,
}

impl Loader {
    /// Create a new loader
    pub fn new() -> Self {
        Self {
            defs: Definitions::new(),
            ids: HashSet::new(),
        }
    }

    /// Load a single RON file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        debug!("Loading definitions from {}", path.display());
        self.load_str(&content)
    }

    /// Load a definitions document from a RON string
    ///
    /// Ids must be unique across every section and every loaded document.
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        let doc: Definitions = ron::from_str(content)?;

        if let Some(config) = doc.config {
            if self.defs.config.is_some() {
                return Err(Error::DuplicateDefinition("config".to_string()));
            }
            self.defs.config = Some(config);
        }
        for value in doc.values {
            self.claim(&value.id)?;
            self.defs.values.push(value);
        }
        for resource in doc.resources {
            self.claim(&resource.id)?;
            self.defs.resources.push(resource);
        }
        for condition in doc.conditions {
            self.claim(&condition.id)?;
            self.defs.conditions.push(condition);
        }
        Ok(())
    }

    /// Load all RON files from a directory
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Not a directory: {:?}", path),
            )));
        }

        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        // Stable registration order regardless of the file system
        entries.sort();

        for file_path in entries {
            if file_path.extension().is_some_and(|e| e == "ron") {
                self.load_file(&file_path)?;
            } else if file_path.is_dir() {
                self.load_directory(&file_path)?;
            }
        }

        Ok(())
    }

    fn claim(&mut self, id: &str) -> Result<()> {
        if !self.ids.insert(id.to_string()) {
            return Err(Error::DuplicateDefinition(id.to_string()));
        }
        Ok(())
    }

    /// Finish loading and return the definitions
    pub fn finish(self) -> Definitions {
        self.defs
    }

    /// Get the current definitions (for inspection during loading)
    pub fn defs(&self) -> &Definitions {
        &self.defs
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    const ECONOMY: &str = r#"
    (
        config: Some((default_dt: 0.5)),
        values: [
            (id: "level", value: Some(3.0)),
            (id: "upgrade_cost", expression: Some("(level * 2) ^ 2 / 2")),
        ],
        resources: [
            (id: "gold", delta: "level * 2"),
            (id: "wood", delta: "1", base: "2", mult: "3", flat: "1"),
        ],
        conditions: [
            (id: "can_upgrade", expression: Some("gold >= upgrade_cost")),
        ],
    )
    "#;

    #[test]
    fn test_load_str() {
        let mut loader = Loader::new();
        loader.load_str(ECONOMY).unwrap();

        let defs = loader.finish();
        assert_eq!(defs.len(), 5);
        assert!(defs.get_value("level").is_some());
        assert!(defs.get_resource("wood").is_some());
        assert!(defs.get_condition("can_upgrade").is_some());
        assert_eq!(
            defs.config.as_ref().map(RegistryConfig::default_dt),
            Some(0.5)
        );
    }

    #[test]
    fn test_sections_are_optional() {
        let mut loader = Loader::new();
        loader
            .load_str(r#"(values: [(id: "x", value: Some(1.0))])"#)
            .unwrap();
        assert_eq!(loader.defs().len(), 1);
        assert!(loader.defs().config.is_none());
    }

    #[test]
    fn test_duplicate_ids_across_sections() {
        let mut loader = Loader::new();
        loader
            .load_str(r#"(values: [(id: "gold", value: Some(1.0))])"#)
            .unwrap();
        let err = loader
            .load_str(r#"(resources: [(id: "gold")])"#)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDefinition(id) if id == "gold"));
    }

    #[test]
    fn test_duplicate_config() {
        let mut loader = Loader::new();
        loader.load_str("(config: Some((default_dt: 1.0)))").unwrap();
        assert!(matches!(
            loader.load_str("(config: Some((reject_cycles: false)))"),
            Err(Error::DuplicateDefinition(_))
        ));
    }

    #[test]
    fn test_invalid_ron() {
        let mut loader = Loader::new();
        assert!(matches!(
            loader.load_str("(values: [(id: )])"),
            Err(Error::Ron(_))
        ));
    }

    #[test]
    fn test_build_registry() {
        let mut loader = Loader::new();
        loader.load_str(ECONOMY).unwrap();
        let defs = loader.finish();

        let mut registry = defs.build_registry().unwrap();
        assert_eq!(registry.config().default_dt(), 0.5);
        assert_eq!(registry.get("upgrade_cost").unwrap().as_f64(), 18.0);
        assert_eq!(registry.get("wood").unwrap().as_f64(), 7.0);

        // 6 gold per unit of time, 0.5 per step
        for _ in 0..5 {
            registry.step().unwrap();
        }
        assert_eq!(registry.get("gold").unwrap().as_f64(), 15.0);
        assert_eq!(registry.get("can_upgrade").unwrap().as_f64(), 0.0);
        registry.step().unwrap();
        assert_eq!(registry.get("can_upgrade").unwrap().as_f64(), 1.0);
    }

    #[test]
    fn test_build_registry_with_callbacks() {
        let mut loader = Loader::new();
        loader.load_str(ECONOMY).unwrap();
        let defs = loader.finish();

        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let mut registry = defs
            .build_registry_with(|def| {
                if def.id != "can_upgrade" {
                    return None;
                }
                let flag = Rc::clone(&flag);
                let callback: ConditionCallback = Box::new(move |reg: &mut ValueRegistry| {
                    flag.set(true);
                    reg.set("level", 4).unwrap();
                });
                Some(callback)
            })
            .unwrap();

        registry.set("gold", 100).unwrap();
        assert_eq!(registry.get("can_upgrade").unwrap().as_f64(), 1.0);
        assert!(fired.get());
        assert_eq!(registry.get("upgrade_cost").unwrap().as_f64(), 32.0);
    }

    #[test]
    fn test_core_errors_surface() {
        let defs = Definitions {
            values: vec![ValueDef::formula("bad", "1 +")],
            ..Definitions::default()
        };
        assert!(matches!(
            defs.build_registry(),
            Err(Error::Core(reckon_core::Error::Parse { .. }))
        ));
    }
}
