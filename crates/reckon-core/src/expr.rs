//! Expression tree and evaluator
//!
//! Expressions are compiled once from formula text (see [`crate::compile`])
//! and evaluated many times against an [`EvalContext`], usually the
//! [`crate::ValueRegistry`] that owns them.

use crate::{Number, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators of the formula language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl BinaryOp {
    /// Binding strength; higher binds tighter
    ///
    /// Every level folds left-to-right, `^` included.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Eq | BinaryOp::Ne => 1,
            BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => 2,
            BinaryOp::Add | BinaryOp::Sub => 3,
            BinaryOp::Mul | BinaryOp::Div => 4,
            BinaryOp::Pow => 5,
        }
    }

    /// Source symbol of this operator
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        }
    }

    /// Look up an operator by its source symbol
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "^" => BinaryOp::Pow,
            ">" => BinaryOp::Gt,
            "<" => BinaryOp::Lt,
            ">=" => BinaryOp::Ge,
            "<=" => BinaryOp::Le,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            _ => return None,
        };
        Some(op)
    }

    /// Apply this operator; comparisons yield 1 or 0
    pub fn apply(&self, lhs: Number, rhs: Number) -> Number {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Pow => lhs.pow(rhs),
            BinaryOp::Gt => Number::from_bool(lhs > rhs),
            BinaryOp::Lt => Number::from_bool(lhs < rhs),
            BinaryOp::Ge => Number::from_bool(lhs >= rhs),
            BinaryOp::Le => Number::from_bool(lhs <= rhs),
            BinaryOp::Eq => Number::from_bool(lhs == rhs),
            BinaryOp::Ne => Number::from_bool(lhs != rhs),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Built-in variadic functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Func {
    /// Smallest argument
    Min,
    /// Largest argument
    Max,
    /// 1 if every argument is at least 1, else 0
    And,
    /// 1 if any argument is at least 1, else 0
    Or,
}

impl Func {
    /// Look up a function by name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "min" => Some(Func::Min),
            "max" => Some(Func::Max),
            "and" => Some(Func::And),
            "or" => Some(Func::Or),
            _ => None,
        }
    }

    /// Name as written in formulas
    pub fn name(&self) -> &'static str {
        match self {
            Func::Min => "min",
            Func::Max => "max",
            Func::And => "and",
            Func::Or => "or",
        }
    }

    /// Apply this function to already evaluated arguments
    ///
    /// The parser guarantees at least one argument.
    pub fn apply(&self, args: &[Number]) -> Number {
        match self {
            Func::Min => fold(args, Number::min),
            Func::Max => fold(args, Number::max),
            Func::And => Number::from_bool(args.iter().all(Number::is_truthy)),
            Func::Or => Number::from_bool(args.iter().any(Number::is_truthy)),
        }
    }
}

fn fold(args: &[Number], f: fn(Number, Number) -> Number) -> Number {
    let mut iter = args.iter().copied();
    match iter.next() {
        Some(first) => iter.fold(first, f),
        None => Number(f64::NAN),
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A compiled expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A numeric literal
    Literal(Number),
    /// Read another value by identifier
    Ident(String),
    /// Apply a binary operator
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Call a built-in function
    Call(Func, Vec<Expr>),
}

/// Source of identifier values during evaluation
pub trait EvalContext {
    /// Resolve an identifier to its current number
    fn lookup(&mut self, name: &str) -> Result<Number>;
}

/// Fixed identifier bindings, for evaluating expressions outside a registry
pub type Bindings = IndexMap<String, Number>;

impl EvalContext for Bindings {
    fn lookup(&mut self, name: &str) -> Result<Number> {
        self.get(name)
            .copied()
            .ok_or_else(|| crate::Error::ValueNotFound(name.to_string()))
    }
}

impl Expr {
    /// Evaluate this expression in the given context
    pub fn eval(&self, ctx: &mut dyn EvalContext) -> Result<Number> {
        match self {
            Expr::Literal(n) => Ok(*n),
            Expr::Ident(name) => ctx.lookup(name),
            Expr::Binary(op, lhs, rhs) => {
                let l = lhs.eval(ctx)?;
                let r = rhs.eval(ctx)?;
                Ok(op.apply(l, r))
            }
            Expr::Call(func, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(ctx)?);
                }
                Ok(func.apply(&values))
            }
        }
    }

    /// Collect every identifier this expression reads
    pub fn dependencies(&self) -> IndexSet<String> {
        let mut deps = IndexSet::new();
        self.collect_dependencies(&mut deps);
        deps
    }

    fn collect_dependencies(&self, deps: &mut IndexSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ident(name) => {
                deps.insert(name.clone());
            }
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_dependencies(deps);
                rhs.collect_dependencies(deps);
            }
            Expr::Call(_, args) => {
                for arg in args {
                    arg.collect_dependencies(deps);
                }
            }
        }
    }

    /// Create a literal expression
    pub fn lit(value: impl Into<Number>) -> Self {
        Expr::Literal(value.into())
    }

    /// Create an identifier expression
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    /// Create a binary expression
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

impl fmt::Display for Expr {
    /// Fully parenthesized rendering, mostly for logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(n) => write!(f, "{}", n),
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op, rhs),
            Expr::Call(func, args) => {
                write!(f, "{}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn bindings(pairs: &[(&str, f64)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Number(*v)))
            .collect()
    }

    #[test]
    fn test_literal() {
        let mut ctx = Bindings::new();
        assert_eq!(Expr::lit(42).eval(&mut ctx).unwrap(), Number(42.0));
    }

    #[test]
    fn test_arithmetic() {
        let mut ctx = Bindings::new();

        let expr = Expr::binary(BinaryOp::Add, Expr::lit(10.0), Expr::lit(5.0));
        assert_eq!(expr.eval(&mut ctx).unwrap(), Number(15.0));

        let expr = Expr::binary(BinaryOp::Pow, Expr::lit(2.0), Expr::lit(10.0));
        assert_eq!(expr.eval(&mut ctx).unwrap(), Number(1024.0));
    }

    #[test]
    fn test_comparison_yields_one_or_zero() {
        let mut ctx = Bindings::new();

        let expr = Expr::binary(BinaryOp::Gt, Expr::lit(10.0), Expr::lit(5.0));
        assert_eq!(expr.eval(&mut ctx).unwrap(), Number::ONE);

        let expr = Expr::binary(BinaryOp::Ne, Expr::lit(5.0), Expr::lit(5.0));
        assert_eq!(expr.eval(&mut ctx).unwrap(), Number::ZERO);
    }

    #[test]
    fn test_functions() {
        assert_eq!(Func::Min.apply(&[Number(5.0), Number(2.0), Number(8.0)]), Number(2.0));
        assert_eq!(Func::Max.apply(&[Number(5.0), Number(2.0), Number(8.0)]), Number(8.0));
        assert_eq!(Func::And.apply(&[Number(1.0), Number(3.0)]), Number::ONE);
        assert_eq!(Func::And.apply(&[Number(1.0), Number(0.5)]), Number::ZERO);
        assert_eq!(Func::Or.apply(&[Number(0.0), Number(2.0)]), Number::ONE);
        assert_eq!(Func::Or.apply(&[Number(0.0), Number(0.9)]), Number::ZERO);
    }

    #[test]
    fn test_ident_lookup() {
        let mut ctx = bindings(&[("level", 3.0)]);
        let expr = Expr::binary(BinaryOp::Mul, Expr::ident("level"), Expr::lit(5.0));
        assert_eq!(expr.eval(&mut ctx).unwrap(), Number(15.0));

        let missing = Expr::ident("stability");
        assert!(matches!(
            missing.eval(&mut ctx),
            Err(Error::ValueNotFound(name)) if name == "stability"
        ));
    }

    #[test]
    fn test_dependencies_skip_literals() {
        let expr = Expr::Call(
            Func::Max,
            vec![
                Expr::ident("a"),
                Expr::lit(1.0),
                Expr::binary(BinaryOp::Add, Expr::ident("b"), Expr::ident("a")),
            ],
        );
        let deps: Vec<_> = expr.dependencies().into_iter().collect();
        assert_eq!(deps, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_display() {
        let expr = Expr::Call(
            Func::Min,
            vec![Expr::binary(BinaryOp::Pow, Expr::ident("x"), Expr::lit(2.0)), Expr::lit(100.0)],
        );
        assert_eq!(expr.to_string(), "min((x ^ 2), 100)");
    }
}
