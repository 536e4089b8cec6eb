//! Values of the reactive graph
//!
//! A [`Value`] owns its kind-specific state plus a memoized number and a dirty
//! flag. It never reaches into the registry itself: the registry asks it for a
//! [`Compute`] plan, evaluates that plan against itself, and hands the result
//! back through [`Value::settle`].
//!
//! Lifecycle: uninitialized (no cache) -> cached -> dirty -> cached -> ...
//! Invalidation only flips the flag; recomputation waits for the next read.

use crate::{CompiledExpr, Number, ValueRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// One-shot callback run when a condition is first met
pub type ConditionCallback = Box<dyn FnOnce(&mut ValueRegistry)>;

/// The variants a value can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Settable scalar
    Constant,
    /// Memoized pure function of other values
    Formula,
    /// Accumulator advanced by ticks
    Resource,
    /// Formula that latches at 1 once it reaches 1
    Condition,
}

impl ValueKind {
    /// Whether `set` is allowed on this kind
    pub fn is_settable(&self) -> bool {
        matches!(self, ValueKind::Constant | ValueKind::Resource)
    }

    /// Lowercase name used in messages
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Constant => "constant",
            ValueKind::Formula => "formula",
            ValueKind::Resource => "resource",
            ValueKind::Condition => "condition",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum Source {
    Constant(Number),
    Formula(Rc<CompiledExpr>),
    Resource {
        amount: Number,
    },
    Condition {
        expr: Rc<CompiledExpr>,
        met: bool,
        on_met: Option<ConditionCallback>,
    },
}

/// What the registry has to evaluate to refresh a value
pub(crate) enum Compute {
    /// Already known
    Ready(Number),
    /// Evaluate an expression
    Eval(Rc<CompiledExpr>),
    /// Read the resource's `_calculated` value and add the accumulated amount
    Accumulate(Number),
}

/// Outcome of storing a freshly computed number
pub(crate) struct Settled {
    pub value: Number,
    /// A condition crossed its threshold on this computation
    pub fired: bool,
    pub callback: Option<ConditionCallback>,
}

/// A node of the value graph
pub struct Value {
    source: Source,
    cached: Option<Number>,
    dirty: bool,
}

impl Value {
    /// Create a constant
    pub fn constant(value: impl Into<Number>) -> Self {
        Self::with_source(Source::Constant(value.into()))
    }

    /// Create a formula over a compiled expression
    pub fn formula(expr: CompiledExpr) -> Self {
        Self::with_source(Source::Formula(Rc::new(expr)))
    }

    /// Create a resource with an empty accumulator
    pub fn resource() -> Self {
        Self::with_source(Source::Resource {
            amount: Number::ZERO,
        })
    }

    /// Create a condition, possibly already met from saved state
    pub fn condition(expr: CompiledExpr, met: bool, on_met: Option<ConditionCallback>) -> Self {
        let mut value = Self::with_source(Source::Condition {
            expr: Rc::new(expr),
            met,
            on_met,
        });
        if met {
            value.cached = Some(Number::ONE);
        }
        value
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            cached: None,
            dirty: false,
        }
    }

    /// Which variant this is
    pub fn kind(&self) -> ValueKind {
        match self.source {
            Source::Constant(_) => ValueKind::Constant,
            Source::Formula(_) => ValueKind::Formula,
            Source::Resource { .. } => ValueKind::Resource,
            Source::Condition { .. } => ValueKind::Condition,
        }
    }

    /// The cached number can be returned without recomputation
    pub fn is_fresh(&self) -> bool {
        if self.is_met() == Some(true) {
            return true;
        }
        !self.dirty && self.cached.is_some()
    }

    /// Dirty flag as seen by readers; a met condition is never dirty
    pub fn is_dirty(&self) -> bool {
        self.dirty && self.is_met() != Some(true)
    }

    /// Last computed number, if any
    pub fn cached(&self) -> Option<Number> {
        self.cached
    }

    /// Flag for recomputation on next read
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether a condition has been met; `None` for other kinds
    pub fn is_met(&self) -> Option<bool> {
        match &self.source {
            Source::Condition { met, .. } => Some(*met),
            _ => None,
        }
    }

    /// Compiled expression of a formula or condition
    pub fn expression(&self) -> Option<&CompiledExpr> {
        match &self.source {
            Source::Formula(expr) | Source::Condition { expr, .. } => Some(expr),
            _ => None,
        }
    }

    /// Accumulated amount of a resource
    pub fn amount(&self) -> Option<Number> {
        match &self.source {
            Source::Resource { amount } => Some(*amount),
            _ => None,
        }
    }

    /// Replace a constant's value or a resource's amount
    ///
    /// Returns the kind as the error for values that cannot be set.
    pub fn set(&mut self, value: Number) -> std::result::Result<(), ValueKind> {
        let kind = self.kind();
        match &mut self.source {
            Source::Constant(current) => *current = value,
            Source::Resource { amount } => *amount = value,
            _ => return Err(kind),
        }
        self.dirty = true;
        Ok(())
    }

    /// Add to a resource's amount; no-op for other kinds
    pub(crate) fn accumulate(&mut self, delta: Number) {
        if let Source::Resource { amount } = &mut self.source {
            *amount += delta;
            self.dirty = true;
        }
    }

    pub(crate) fn plan(&self) -> Compute {
        match &self.source {
            Source::Constant(n) => Compute::Ready(*n),
            Source::Formula(expr) => Compute::Eval(Rc::clone(expr)),
            Source::Resource { amount } => Compute::Accumulate(*amount),
            Source::Condition { met: true, .. } => Compute::Ready(Number::ONE),
            Source::Condition { expr, .. } => Compute::Eval(Rc::clone(expr)),
        }
    }

    /// Store a computed number and clear the dirty flag
    pub(crate) fn settle(&mut self, computed: Number) -> Settled {
        let mut settled = Settled {
            value: computed,
            fired: false,
            callback: None,
        };
        if let Source::Condition { met, on_met, .. } = &mut self.source {
            if *met {
                settled.value = Number::ONE;
            } else if computed.is_truthy() {
                *met = true;
                settled.value = Number::ONE;
                settled.fired = true;
                settled.callback = on_met.take();
            }
        }
        self.cached = Some(settled.value);
        self.dirty = false;
        settled
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Value");
        s.field("kind", &self.kind());
        match &self.source {
            Source::Constant(n) => {
                s.field("value", n);
            }
            Source::Formula(expr) => {
                s.field("expression", &expr.source());
            }
            Source::Resource { amount } => {
                s.field("amount", amount);
            }
            Source::Condition { expr, met, on_met } => {
                s.field("expression", &expr.source())
                    .field("met", met)
                    .field("has_callback", &on_met.is_some());
            }
        }
        s.field("cached", &self.cached)
            .field("dirty", &self.dirty)
            .finish()
    }
}
