//! The value registry: owner of the dependency graph
//!
//! Values are addressed by string identifiers. Internally every identifier
//! that is registered or merely referenced by a formula is interned to a
//! [`ValueId`], so forward references get their edges recorded before the
//! referenced value exists.
//!
//! Reads are pull-based: a read recomputes a value only when it is dirty or
//! was never computed. Writes never recompute; they mark the written value's
//! transitive dependents dirty.

use crate::parser::compile;
use crate::value::{Compute, ConditionCallback, Settled};
use crate::{
    Clock, CompiledExpr, Error, EvalContext, Number, RegistryConfig, Result, Value, ValueId,
    ValueKind,
};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, trace};

/// The four formulas that make up a resource
///
/// Defaults are `0` for everything except `mult`, which is `1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceFormulas {
    /// Change per unit of time, applied by ticks
    pub delta: String,
    /// Baseline before the multiplier
    pub base: String,
    /// Multiplier on the baseline
    pub mult: String,
    /// Flat bonus after the multiplier
    pub flat: String,
}

impl Default for ResourceFormulas {
    fn default() -> Self {
        Self {
            delta: "0".to_string(),
            base: "0".to_string(),
            mult: "1".to_string(),
            flat: "0".to_string(),
        }
    }
}

impl ResourceFormulas {
    /// Set the delta formula
    pub fn delta(mut self, expression: impl Into<String>) -> Self {
        self.delta = expression.into();
        self
    }

    /// Set the base formula
    pub fn base(mut self, expression: impl Into<String>) -> Self {
        self.base = expression.into();
        self
    }

    /// Set the multiplier formula
    pub fn mult(mut self, expression: impl Into<String>) -> Self {
        self.mult = expression.into();
        self
    }

    /// Set the flat bonus formula
    pub fn flat(mut self, expression: impl Into<String>) -> Self {
        self.flat = expression.into();
        self
    }
}

/// Counters describing the work the registry has done
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Formula, condition and resource computations
    pub evaluations: u64,
    /// Values marked dirty by propagation
    pub invalidations: u64,
    /// Ticks applied
    pub ticks: u64,
    /// Conditions that crossed their threshold
    pub conditions_fired: u64,
}

/// Handles of the auxiliary formulas a resource reads
#[derive(Debug, Clone, Copy)]
struct ResourceLinks {
    delta: ValueId,
    calculated: ValueId,
}

/// One interned identifier
#[derive(Debug)]
struct Node {
    name: String,
    /// `None` until registered, and again after removal
    value: Option<Value>,
    /// Values this one reads
    dependencies: IndexSet<ValueId>,
    /// Values that read this one
    dependents: IndexSet<ValueId>,
    /// Set while this value is being computed
    evaluating: bool,
}

/// Registry of values and their dependency edges
pub struct ValueRegistry {
    names: IndexMap<String, ValueId>,
    nodes: Vec<Node>,
    /// Resources in registration order, which is tick order
    resources: IndexMap<ValueId, ResourceLinks>,
    /// Condition callbacks waiting for the outermost read to finish
    pending_callbacks: VecDeque<(ValueId, ConditionCallback)>,
    /// Nesting depth of public reads
    read_depth: usize,
    draining: bool,
    config: RegistryConfig,
    clock: Clock,
    stats: RegistryStats,
}

impl ValueRegistry {
    /// Create an empty registry with the default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            names: IndexMap::new(),
            nodes: Vec::new(),
            resources: IndexMap::new(),
            pending_callbacks: VecDeque::new(),
            read_depth: 0,
            draining: false,
            config,
            clock: Clock::new(),
            stats: RegistryStats::default(),
        }
    }

    // === Registration ===

    /// Register a settable constant
    ///
    /// Does nothing if `id` is already registered.
    pub fn register_constant(&mut self, id: &str, value: impl Into<Number>) -> ValueId {
        if let Some(existing) = self.handle(id) {
            debug!("Value {} already added", id);
            return existing;
        }
        let vid = self.intern(id);
        self.nodes[vid.index()].value = Some(Value::constant(value));
        debug!("Adding constant {}", id);
        vid
    }

    /// Register a formula
    ///
    /// Does nothing if `id` is already registered; the expression is then not
    /// parsed at all.
    pub fn register_formula(&mut self, id: &str, expression: &str) -> Result<ValueId> {
        if let Some(existing) = self.handle(id) {
            debug!("Value {} already added", id);
            return Ok(existing);
        }
        let compiled = compile(expression)?;
        self.register_compiled(id, compiled)
    }

    /// Register a formula from an already compiled expression
    ///
    /// Same idempotence as [`ValueRegistry::register_formula`].
    pub fn register_compiled(&mut self, id: &str, compiled: CompiledExpr) -> Result<ValueId> {
        if let Some(existing) = self.handle(id) {
            debug!("Value {} already added", id);
            return Ok(existing);
        }
        let vid = self.intern(id);
        let deps = self.intern_all(compiled.dependencies());
        self.check_cycle(vid, &deps)?;
        debug!(
            "Adding formula {} with dependencies {}",
            id,
            join(compiled.dependencies())
        );
        self.link(vid, &deps);
        self.nodes[vid.index()].value = Some(Value::formula(compiled));
        Ok(vid)
    }

    /// Register a condition
    ///
    /// Unlike formulas, a condition replaces whatever is registered under `id`
    /// so that persisted "met" state can be reapplied. Values that read `id`
    /// are invalidated when a replacement happens.
    pub fn register_condition(
        &mut self,
        id: &str,
        expression: &str,
        initially_met: bool,
        on_met: Option<ConditionCallback>,
    ) -> Result<ValueId> {
        let compiled = compile(expression)?;
        let vid = self.intern(id);
        let deps = self.intern_all(compiled.dependencies());
        self.check_cycle(vid, &deps)?;

        let replaced = self.nodes[vid.index()].value.is_some();
        if replaced {
            debug!("Replacing {} with a condition", id);
            self.unlink(vid);
            self.resources.shift_remove(&vid);
        }
        debug!(
            "Adding condition {} with dependencies {}",
            id,
            join(compiled.dependencies())
        );
        self.link(vid, &deps);
        self.nodes[vid.index()].value = Some(Value::condition(compiled, initially_met, on_met));
        if replaced {
            self.propagate(vid);
        }
        Ok(vid)
    }

    /// Register a resource and its auxiliary formulas
    ///
    /// Declares `{id}_delta`, `{id}_base`, `{id}_mult`, `{id}_flat`, and
    /// `{id}_calculated = {id}_base * {id}_mult + {id}_flat`, then the resource
    /// itself, which reads `{id}_calculated` and adds its accumulated amount.
    /// All four expressions are parsed before anything is registered, and a
    /// failed registration leaves the registry unchanged.
    pub fn register_resource(&mut self, id: &str, formulas: ResourceFormulas) -> Result<ValueId> {
        debug!("Adding resource {}", id);
        let parts = [
            ("delta", compile(&formulas.delta)?),
            ("base", compile(&formulas.base)?),
            ("mult", compile(&formulas.mult)?),
            ("flat", compile(&formulas.flat)?),
        ];

        let mut added = Vec::new();
        let result = self.register_resource_parts(id, parts, &mut added);
        if result.is_err() {
            for vid in added.into_iter().rev() {
                self.discard(vid);
            }
        }
        result
    }

    fn register_resource_parts(
        &mut self,
        id: &str,
        parts: [(&str, CompiledExpr); 4],
        added: &mut Vec<ValueId>,
    ) -> Result<ValueId> {
        for (suffix, compiled) in parts {
            let name = format!("{}_{}", id, suffix);
            let is_new = !self.contains(&name);
            let vid = self.register_compiled(&name, compiled)?;
            if is_new {
                added.push(vid);
            }
        }
        let calculated_name = format!("{}_calculated", id);
        let is_new = !self.contains(&calculated_name);
        let calculated =
            self.register_formula(&calculated_name, &format!("{id}_base * {id}_mult + {id}_flat"))?;
        if is_new {
            added.push(calculated);
        }

        if let Some(existing) = self.handle(id) {
            debug!("Value {} already added", id);
            return Ok(existing);
        }

        let vid = self.intern(id);
        let delta = self.intern(&format!("{}_delta", id));
        // The resource reads `_calculated` directly, not through an expression,
        // so this edge has to be added by hand.
        self.check_cycle(vid, &[calculated])?;
        self.link(vid, &[calculated]);
        self.nodes[vid.index()].value = Some(Value::resource());
        self.resources.insert(vid, ResourceLinks { delta, calculated });
        Ok(vid)
    }

    /// Remove a value that nothing depends on
    ///
    /// Fails with [`Error::HasDependents`] while any other value reads `id`.
    pub fn remove(&mut self, id: &str) -> Result<()> {
        let vid = self
            .handle(id)
            .ok_or_else(|| Error::ValueNotFound(id.to_string()))?;
        // Resources read their delta on every tick without a graph edge
        let dependents: Vec<String> = self.nodes[vid.index()]
            .dependents
            .iter()
            .copied()
            .chain(
                self.resources
                    .iter()
                    .filter(|(_, links)| links.delta == vid)
                    .map(|(resource, _)| *resource),
            )
            .map(|d| self.nodes[d.index()].name.clone())
            .collect();
        if !dependents.is_empty() {
            debug!(
                "Cannot remove {} because other values depend on it: {}",
                id,
                dependents.join(", ")
            );
            return Err(Error::HasDependents {
                id: id.to_string(),
                dependents,
            });
        }

        self.unlink(vid);
        self.resources.shift_remove(&vid);
        self.nodes[vid.index()].value = None;
        debug!("Removed {}", id);
        Ok(())
    }

    // === Reads and writes ===

    /// Current number for `id`, recomputing only what is stale
    pub fn get(&mut self, id: &str) -> Result<Number> {
        let vid = self
            .handle(id)
            .ok_or_else(|| Error::ValueNotFound(id.to_string()))?;
        self.get_by_id(vid)
    }

    /// Current number for a handle
    pub fn get_by_id(&mut self, vid: ValueId) -> Result<Number> {
        self.read_depth += 1;
        let result = self.read(vid);
        self.read_depth -= 1;
        if self.read_depth == 0 {
            self.run_callbacks();
        }
        result
    }

    /// Set a constant's value or a resource's accumulated amount
    pub fn set(&mut self, id: &str, value: impl Into<Number>) -> Result<()> {
        let vid = self
            .handle(id)
            .ok_or_else(|| Error::ValueNotFound(id.to_string()))?;
        let value = value.into();
        let slot = self.value_mut(vid)?;
        slot.set(value).map_err(|kind| Error::NotSettable {
            id: id.to_string(),
            kind,
        })?;
        trace!("Set {} to {}", id, value);
        self.propagate(vid);
        Ok(())
    }

    /// Mark `id` and everything that reads it as stale
    pub fn invalidate(&mut self, id: &str) -> Result<()> {
        let vid = self
            .handle(id)
            .ok_or_else(|| Error::ValueNotFound(id.to_string()))?;
        self.value_mut(vid)?.mark_dirty();
        self.propagate(vid);
        Ok(())
    }

    /// Advance every resource by `dt`
    ///
    /// Each resource adds `{id}_delta * dt` to its amount. Resources whose
    /// delta is exactly zero are skipped without invalidating anything.
    pub fn tick(&mut self, dt: impl Into<Number>) -> Result<()> {
        let dt = dt.into();
        let resources: Vec<(ValueId, ResourceLinks)> =
            self.resources.iter().map(|(k, v)| (*k, *v)).collect();

        // Read every delta before touching any amount, so a failed read
        // leaves the tick unapplied.
        let mut deltas = Vec::with_capacity(resources.len());
        for (vid, links) in resources {
            let delta = self.get_by_id(links.delta)?;
            if !delta.is_zero() {
                deltas.push((vid, delta));
            }
        }

        for (vid, delta) in deltas {
            // A condition callback may have removed this resource
            if !self.resources.contains_key(&vid) {
                continue;
            }
            if let Some(value) = self.nodes[vid.index()].value.as_mut() {
                value.accumulate(delta * dt);
            }
            self.propagate(vid);
        }

        self.clock.advance(dt.as_f64());
        self.stats.ticks += 1;
        trace!("Tick {} (dt {})", self.clock.tick, dt);
        Ok(())
    }

    /// Tick by the configured default time step
    pub fn step(&mut self) -> Result<()> {
        self.tick(self.config.default_dt())
    }

    // === Introspection ===

    /// Whether `id` is registered
    pub fn contains(&self, id: &str) -> bool {
        self.handle(id).is_some()
    }

    /// Handle of a registered value
    pub fn handle(&self, id: &str) -> Option<ValueId> {
        self.names
            .get(id)
            .copied()
            .filter(|vid| self.nodes[vid.index()].value.is_some())
    }

    /// Identifier behind a handle
    pub fn name(&self, vid: ValueId) -> Option<&str> {
        self.nodes.get(vid.index()).map(|n| n.name.as_str())
    }

    /// Registered value, for inspection
    pub fn value(&self, id: &str) -> Option<&Value> {
        let vid = self.handle(id)?;
        self.nodes[vid.index()].value.as_ref()
    }

    /// Kind of a registered value
    pub fn kind(&self, id: &str) -> Option<ValueKind> {
        self.value(id).map(Value::kind)
    }

    /// Whether a condition has been met; `None` for anything else
    pub fn is_met(&self, id: &str) -> Option<bool> {
        self.value(id).and_then(Value::is_met)
    }

    /// Whether a value will recompute on its next read
    pub fn is_dirty(&self, id: &str) -> Option<bool> {
        self.value(id).map(|v| !v.is_fresh())
    }

    /// Last computed number, without recomputing
    pub fn peek(&self, id: &str) -> Option<Number> {
        self.value(id).and_then(Value::cached)
    }

    /// Identifiers `id` reads
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.edges(id, |n| &n.dependencies)
    }

    /// Identifiers that read `id`
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.edges(id, |n| &n.dependents)
    }

    fn edges(&self, id: &str, select: fn(&Node) -> &IndexSet<ValueId>) -> Vec<&str> {
        match self.names.get(id) {
            Some(vid) => select(&self.nodes[vid.index()])
                .iter()
                .map(|d| self.nodes[d.index()].name.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Registered identifiers in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.value.is_some())
            .map(|n| n.name.as_str())
    }

    /// Number of registered values
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.value.is_some()).count()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Work counters
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    /// Registry clock
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// One `id -> dependent, dependent` line per identifier that is read by
    /// something
    pub fn dependency_lines(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| !n.dependents.is_empty())
            .map(|n| {
                let dependents: Vec<&str> = n
                    .dependents
                    .iter()
                    .map(|d| self.nodes[d.index()].name.as_str())
                    .collect();
                format!("{} -> {}", n.name, dependents.join(", "))
            })
            .collect()
    }

    /// Log the dependency graph at debug level
    pub fn log_dependencies(&self) {
        for line in self.dependency_lines() {
            debug!("{}", line);
        }
    }

    // === Internals ===

    fn intern(&mut self, name: &str) -> ValueId {
        if let Some(vid) = self.names.get(name) {
            return *vid;
        }
        let vid = ValueId::new(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: name.to_string(),
            value: None,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
            evaluating: false,
        });
        self.names.insert(name.to_string(), vid);
        vid
    }

    fn intern_all(&mut self, names: &IndexSet<String>) -> Vec<ValueId> {
        names.iter().map(|name| self.intern(name)).collect()
    }

    fn value_mut(&mut self, vid: ValueId) -> Result<&mut Value> {
        let node = &mut self.nodes[vid.index()];
        match node.value.as_mut() {
            Some(value) => Ok(value),
            None => Err(Error::ValueNotFound(node.name.clone())),
        }
    }

    /// Refuse edges `dep -> reader` that would close a cycle
    ///
    /// A cycle appears when `reader` already reaches one of `deps` by walking
    /// dependents, or reads itself.
    fn check_cycle(&self, reader: ValueId, deps: &[ValueId]) -> Result<()> {
        if !self.config.reject_cycles() {
            return Ok(());
        }
        let targets: IndexSet<ValueId> = deps.iter().copied().collect();
        let mut visited = IndexSet::new();
        let mut stack = vec![reader];
        while let Some(current) = stack.pop() {
            if targets.contains(&current) {
                return Err(Error::CycleDetected {
                    id: self.nodes[reader.index()].name.clone(),
                    through: self.nodes[current.index()].name.clone(),
                });
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(self.nodes[current.index()].dependents.iter().copied());
        }
        Ok(())
    }

    /// Drop a value registered by a failed composite registration
    fn discard(&mut self, vid: ValueId) {
        self.unlink(vid);
        self.nodes[vid.index()].value = None;
    }

    fn link(&mut self, reader: ValueId, deps: &[ValueId]) {
        for dep in deps {
            self.nodes[reader.index()].dependencies.insert(*dep);
            self.nodes[dep.index()].dependents.insert(reader);
        }
    }

    /// Drop every edge from `reader` to the values it reads
    fn unlink(&mut self, reader: ValueId) {
        let deps = std::mem::take(&mut self.nodes[reader.index()].dependencies);
        for dep in deps {
            self.nodes[dep.index()].dependents.shift_remove(&reader);
        }
    }

    /// Mark every transitive dependent of `origin` dirty
    fn propagate(&mut self, origin: ValueId) {
        let mut visited = IndexSet::new();
        let mut stack: Vec<ValueId> = self.nodes[origin.index()]
            .dependents
            .iter()
            .copied()
            .collect();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let node = &mut self.nodes[current.index()];
            if let Some(value) = node.value.as_mut() {
                value.mark_dirty();
                self.stats.invalidations += 1;
                trace!("Invalidated {}", node.name);
            }
            stack.extend(node.dependents.iter().copied());
        }
    }

    /// Read without running callbacks; used for nested lookups
    fn read(&mut self, vid: ValueId) -> Result<Number> {
        let node = self
            .nodes
            .get(vid.index())
            .ok_or_else(|| Error::ValueNotFound(vid.to_string()))?;
        let value = node
            .value
            .as_ref()
            .ok_or_else(|| Error::ValueNotFound(node.name.clone()))?;
        if value.is_fresh() {
            if let Some(cached) = value.cached() {
                return Ok(cached);
            }
        }
        if node.evaluating {
            return Err(Error::EvaluationCycle(node.name.clone()));
        }

        let plan = value.plan();
        self.nodes[vid.index()].evaluating = true;
        let computed = match plan {
            Compute::Ready(n) => Ok(n),
            Compute::Eval(expr) => {
                trace!("Recomputing {}", self.nodes[vid.index()].name);
                self.stats.evaluations += 1;
                expr.eval(self)
            }
            Compute::Accumulate(amount) => {
                self.stats.evaluations += 1;
                match self.resources.get(&vid).copied() {
                    Some(links) => self.read(links.calculated).map(|base| base + amount),
                    None => Err(Error::ValueNotFound(format!(
                        "{}_calculated",
                        self.nodes[vid.index()].name
                    ))),
                }
            }
        };
        self.nodes[vid.index()].evaluating = false;
        let computed = computed?;

        let settled = match self.nodes[vid.index()].value.as_mut() {
            Some(value) => value.settle(computed),
            None => return Ok(computed),
        };
        self.after_settle(vid, settled)
    }

    fn after_settle(&mut self, vid: ValueId, settled: Settled) -> Result<Number> {
        if settled.fired {
            self.stats.conditions_fired += 1;
            info!("Condition {} met", self.nodes[vid.index()].name);
            // Dependents may have cached the pre-latch number
            self.propagate(vid);
            if let Some(callback) = settled.callback {
                self.pending_callbacks.push_back((vid, callback));
            }
        }
        Ok(settled.value)
    }

    fn run_callbacks(&mut self) {
        if self.draining {
            return;
        }
        self.draining = true;
        while let Some((vid, callback)) = self.pending_callbacks.pop_front() {
            debug!("Running callback for {}", self.nodes[vid.index()].name);
            callback(self);
        }
        self.draining = false;
    }
}

impl EvalContext for ValueRegistry {
    fn lookup(&mut self, name: &str) -> Result<Number> {
        let vid = self
            .handle(name)
            .ok_or_else(|| Error::ValueNotFound(name.to_string()))?;
        self.read(vid)
    }
}

impl Default for ValueRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueRegistry")
            .field("values", &self.len())
            .field("resources", &self.resources.len())
            .field("clock", &self.clock)
            .field("stats", &self.stats)
            .finish()
    }
}

fn join(names: &IndexSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
