//! Reckon Core - Formula language and reactive value registry
//!
//! This crate provides:
//! - A small formula language (`+ - * / ^`, comparisons, `min`, `max`,
//!   `and`, `or`) compiled once into an expression tree
//! - Named values (`Constant`, `Formula`, `Resource`, `Condition`) kept in a
//!   [`ValueRegistry`] that tracks which value reads which
//! - Lazy, pull-based recomputation: writes only mark dependents dirty, reads
//!   recompute what is stale and memoize the result
//! - Tick-driven resources that accumulate `delta * dt`
//!
//! ## Example
//!
//! ```
//! use reckon_core::{ResourceFormulas, ValueRegistry};
//!
//! let mut registry = ValueRegistry::new();
//! registry.register_constant("level", 3);
//! registry
//!     .register_formula("upgrade_cost", "(level * 2) ^ 2 / 2")
//!     .unwrap();
//! assert_eq!(registry.get("upgrade_cost").unwrap().as_f64(), 18.0);
//!
//! registry
//!     .register_resource("gold", ResourceFormulas::default().delta("level"))
//!     .unwrap();
//! registry.tick(2.0).unwrap();
//! assert_eq!(registry.get("gold").unwrap().as_f64(), 6.0);
//! ```
//!
//! The registry is single-threaded. Condition callbacks receive the registry
//! mutably and run after the read that fired them has finished.

mod config;
mod error;
pub mod expr;
mod identity;
pub mod lexer;
mod number;
pub mod parser;
mod registry;
pub mod time;
mod value;

pub use config::RegistryConfig;
pub use error::{Error, Result};
pub use expr::{BinaryOp, Bindings, EvalContext, Expr, Func};
pub use identity::ValueId;
pub use lexer::{tokenize, Token, TokenKind};
pub use number::Number;
pub use parser::{all_of, any_of, compile, CompiledExpr, ParseError, ALWAYS_FALSE, ALWAYS_TRUE};
pub use registry::{RegistryStats, ResourceFormulas, ValueRegistry};
pub use time::{Clock, Tick};
pub use value::{ConditionCallback, Value, ValueKind};
