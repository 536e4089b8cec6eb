//! Formula compiler
//!
//! Operator-precedence (shunting-yard) parsing over the token stream with an
//! operand stack, an operator stack, and a side stack of open function calls.
//! Malformed input fails fast with a [`ParseError`].

use crate::expr::{BinaryOp, Expr, Func};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::{Error, EvalContext, Number, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Formula that is always true
pub const ALWAYS_TRUE: &str = "1";
/// Formula that is always false
pub const ALWAYS_FALSE: &str = "0";

/// Reasons a formula fails to compile
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expression is empty")]
    Empty,

    #[error("operator `{op}` at offset {offset} is missing an operand")]
    MissingOperand { op: BinaryOp, offset: usize },

    #[error("missing operator before offset {offset}")]
    MissingOperator { offset: usize },

    #[error("unmatched `)` at offset {offset}")]
    UnmatchedCloseParen { offset: usize },

    #[error("`(` at offset {offset} is never closed")]
    UnclosedParen { offset: usize },

    #[error("empty parentheses at offset {offset}")]
    EmptyGroup { offset: usize },

    #[error("function `{func}` at offset {offset} must be followed by `(`")]
    ExpectedCallParen { func: Func, offset: usize },

    #[error("`,` at offset {offset} is not inside a function call")]
    CommaOutsideCall { offset: usize },

    #[error("empty argument in call to `{func}` at offset {offset}")]
    EmptyArgument { func: Func, offset: usize },
}

/// A parsed formula plus the identifiers it reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledExpr {
    source: String,
    root: Expr,
    dependencies: IndexSet<String>,
}

impl CompiledExpr {
    /// Original formula text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Root of the expression tree
    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Identifiers read by this formula, in first-occurrence order
    pub fn dependencies(&self) -> &IndexSet<String> {
        &self.dependencies
    }

    /// Evaluate against a context
    pub fn eval(&self, ctx: &mut dyn EvalContext) -> Result<Number> {
        self.root.eval(ctx)
    }
}

impl fmt::Display for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compile formula text
pub fn compile(source: &str) -> Result<CompiledExpr> {
    let root = Parser::default().run(&tokenize(source)).map_err(|e| Error::Parse {
        expression: source.to_string(),
        source: e,
    })?;
    let dependencies = root.dependencies();
    Ok(CompiledExpr {
        source: source.to_string(),
        root,
        dependencies,
    })
}

/// Combine condition formulas with `and(...)`
pub fn all_of<S: AsRef<str>>(parts: &[S]) -> String {
    combine(Func::And, parts, ALWAYS_TRUE)
}

/// Combine condition formulas with `or(...)`
pub fn any_of<S: AsRef<str>>(parts: &[S]) -> String {
    combine(Func::Or, parts, ALWAYS_FALSE)
}

fn combine<S: AsRef<str>>(func: Func, parts: &[S], empty: &str) -> String {
    match parts {
        [] => empty.to_string(),
        [single] => single.as_ref().to_string(),
        _ => {
            let joined: Vec<&str> = parts.iter().map(AsRef::as_ref).collect();
            format!("{}({})", func, joined.join(", "))
        }
    }
}

/// An open parenthesis on the operator stack
#[derive(Debug, Clone, Copy)]
enum Paren {
    /// Grouping parenthesis, with the operand stack height when it opened
    Group { offset: usize, height: usize },
    /// Opening parenthesis of a function call; the frame lives in `calls`
    Call,
}

/// Entries of the operator stack
#[derive(Debug, Clone, Copy)]
enum Pending {
    Op(BinaryOp, usize),
    Paren(Paren),
}

/// An open function call
#[derive(Debug)]
struct CallFrame {
    func: Func,
    offset: usize,
    args: usize,
    /// Operand stack height when the call opened
    base: usize,
    /// Operand stack height where the current argument starts
    arg_base: usize,
}

type ParseResult<T> = std::result::Result<T, ParseError>;

#[derive(Default)]
struct Parser {
    operands: Vec<Expr>,
    operators: Vec<Pending>,
    calls: Vec<CallFrame>,
}

impl Parser {
    fn run(mut self, tokens: &[Token]) -> ParseResult<Expr> {
        let mut pending_func: Option<(Func, usize)> = None;

        for token in tokens {
            if let Some((func, offset)) = pending_func.take() {
                if token.kind != TokenKind::LParen {
                    return Err(ParseError::ExpectedCallParen { func, offset });
                }
                let height = self.operands.len();
                self.calls.push(CallFrame {
                    func,
                    offset,
                    args: 0,
                    base: height,
                    arg_base: height,
                });
                self.operators.push(Pending::Paren(Paren::Call));
                continue;
            }

            match &token.kind {
                TokenKind::Number(n) => self.operands.push(Expr::Literal(*n)),
                TokenKind::Ident(name) => self.operands.push(Expr::Ident(name.clone())),
                TokenKind::Function(func) => pending_func = Some((*func, token.offset)),
                TokenKind::LParen => self.operators.push(Pending::Paren(Paren::Group {
                    offset: token.offset,
                    height: self.operands.len(),
                })),
                TokenKind::RParen => self.close_paren(token.offset)?,
                TokenKind::Comma => self.comma(token.offset)?,
                TokenKind::Operator(op) => {
                    while let Some(&Pending::Op(top, top_offset)) = self.operators.last() {
                        if top.precedence() < op.precedence() {
                            break;
                        }
                        self.operators.pop();
                        self.reduce(top, top_offset)?;
                    }
                    self.operators.push(Pending::Op(*op, token.offset));
                }
            }
        }

        if let Some((func, offset)) = pending_func {
            return Err(ParseError::ExpectedCallParen { func, offset });
        }

        while let Some(pending) = self.operators.pop() {
            match pending {
                Pending::Op(op, offset) => self.reduce(op, offset)?,
                Pending::Paren(Paren::Group { offset, .. }) => {
                    return Err(ParseError::UnclosedParen { offset });
                }
                Pending::Paren(Paren::Call) => {
                    let offset = self.calls.last().map(|c| c.offset).unwrap_or_default();
                    return Err(ParseError::UnclosedParen { offset });
                }
            }
        }

        let mut operands = self.operands.into_iter();
        let root = operands.next().ok_or(ParseError::Empty)?;
        if operands.next().is_some() {
            let offset = tokens.last().map(|t| t.offset).unwrap_or_default();
            return Err(ParseError::MissingOperator { offset });
        }
        Ok(root)
    }

    /// Operand stack height owned by the innermost open parenthesis
    fn floor(&self) -> usize {
        for pending in self.operators.iter().rev() {
            match pending {
                Pending::Op(..) => continue,
                Pending::Paren(Paren::Group { height, .. }) => return *height,
                Pending::Paren(Paren::Call) => {
                    return self.calls.last().map(|c| c.arg_base).unwrap_or(0);
                }
            }
        }
        0
    }

    /// Pop two operands and push the combined node
    fn reduce(&mut self, op: BinaryOp, offset: usize) -> ParseResult<()> {
        if self.operands.len() < self.floor() + 2 {
            return Err(ParseError::MissingOperand { op, offset });
        }
        let rhs = self.operands.pop().ok_or(ParseError::MissingOperand { op, offset })?;
        let lhs = self.operands.pop().ok_or(ParseError::MissingOperand { op, offset })?;
        self.operands.push(Expr::binary(op, lhs, rhs));
        Ok(())
    }

    /// Reduce operators back to the innermost open parenthesis and pop it
    fn unwind_to_paren(&mut self) -> ParseResult<Option<Paren>> {
        while let Some(pending) = self.operators.pop() {
            match pending {
                Pending::Op(op, offset) => self.reduce(op, offset)?,
                Pending::Paren(paren) => return Ok(Some(paren)),
            }
        }
        Ok(None)
    }

    fn close_paren(&mut self, offset: usize) -> ParseResult<()> {
        match self.unwind_to_paren()? {
            None => Err(ParseError::UnmatchedCloseParen { offset }),
            Some(Paren::Group { offset: open, height }) => {
                let len = self.operands.len();
                if len == height {
                    Err(ParseError::EmptyGroup { offset: open })
                } else if len > height + 1 {
                    Err(ParseError::MissingOperator { offset })
                } else {
                    Ok(())
                }
            }
            Some(Paren::Call) => {
                let frame = self
                    .calls
                    .pop()
                    .ok_or(ParseError::UnmatchedCloseParen { offset })?;
                self.finish_argument(&frame, offset)?;
                let args = self.operands.split_off(frame.base);
                self.operands.push(Expr::Call(frame.func, args));
                Ok(())
            }
        }
    }

    fn comma(&mut self, offset: usize) -> ParseResult<()> {
        match self.unwind_to_paren()? {
            Some(Paren::Call) => {
                // The call stays open
                self.operators.push(Pending::Paren(Paren::Call));
                let height = self.operands.len();
                let frame = self
                    .calls
                    .last_mut()
                    .ok_or(ParseError::CommaOutsideCall { offset })?;
                if height <= frame.arg_base {
                    return Err(ParseError::EmptyArgument {
                        func: frame.func,
                        offset,
                    });
                }
                if height > frame.arg_base + 1 {
                    return Err(ParseError::MissingOperator { offset });
                }
                frame.args += 1;
                frame.arg_base = height;
                Ok(())
            }
            _ => Err(ParseError::CommaOutsideCall { offset }),
        }
    }

    /// The last argument of a closing call must be exactly one operand
    fn finish_argument(&self, frame: &CallFrame, offset: usize) -> ParseResult<()> {
        let height = self.operands.len();
        if height <= frame.arg_base {
            return Err(ParseError::EmptyArgument {
                func: frame.func,
                offset: if frame.args == 0 { frame.offset } else { offset },
            });
        }
        if height > frame.arg_base + 1 {
            return Err(ParseError::MissingOperator { offset });
        }
        Ok(())
    }
}
